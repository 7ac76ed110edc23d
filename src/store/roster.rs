//! Just enough roster setup to drive the engine: schools, terms, classes, class-terms,
//! subjects offered, students and enrollment.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::calc::CalcError;
use crate::db::now_rfc3339;

fn require_exists(conn: &Connection, table: &'static str, what: &'static str, id: &str) -> Result<(), CalcError> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found = conn
        .query_row(&sql, [id], |_| Ok(()))
        .optional()?
        .is_some();
    if found {
        Ok(())
    } else {
        Err(CalcError::not_found(what, id))
    }
}

fn non_empty(field: &str, value: &str) -> Result<String, CalcError> {
    let t = value.trim();
    if t.is_empty() {
        return Err(CalcError::bad_params(format!("{} must not be empty", field)));
    }
    Ok(t.to_string())
}

pub fn create_school(conn: &Connection, name: &str) -> Result<String, CalcError> {
    let name = non_empty("name", name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO schools(id, name) VALUES(?, ?)", (&id, &name))?;
    Ok(id)
}

pub fn create_term(conn: &Connection, school_id: &str, name: &str) -> Result<String, CalcError> {
    require_exists(conn, "schools", "school", school_id)?;
    let name = non_empty("name", name)?;
    let id = Uuid::new_v4().to_string();
    let next_sort: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM terms WHERE school_id = ?",
        [school_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO terms(id, school_id, name, sort_order) VALUES(?, ?, ?, ?)",
        (&id, school_id, &name, next_sort),
    )?;
    Ok(id)
}

pub fn create_class(conn: &Connection, school_id: &str, name: &str) -> Result<String, CalcError> {
    require_exists(conn, "schools", "school", school_id)?;
    let name = non_empty("name", name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, school_id, name) VALUES(?, ?, ?)",
        (&id, school_id, &name),
    )?;
    Ok(id)
}

pub fn create_class_term(conn: &Connection, class_id: &str, term_id: &str) -> Result<String, CalcError> {
    require_exists(conn, "classes", "class", class_id)?;
    require_exists(conn, "terms", "term", term_id)?;
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM class_terms WHERE class_id = ? AND term_id = ?",
            (class_id, term_id),
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO class_terms(id, class_id, term_id) VALUES(?, ?, ?)",
        (&id, class_id, term_id),
    )?;
    Ok(id)
}

pub fn create_subject(conn: &Connection, school_id: &str, name: &str, code: Option<&str>) -> Result<String, CalcError> {
    require_exists(conn, "schools", "school", school_id)?;
    let name = non_empty("name", name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO subjects(id, school_id, name, code) VALUES(?, ?, ?, ?)",
        (&id, school_id, &name, code),
    )?;
    Ok(id)
}

pub fn add_subject(
    conn: &Connection,
    class_term_id: &str,
    subject_id: &str,
    teacher_name: Option<&str>,
) -> Result<(), CalcError> {
    require_exists(conn, "class_terms", "class-term", class_term_id)?;
    require_exists(conn, "subjects", "subject", subject_id)?;
    let next_sort: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM class_term_subjects WHERE class_term_id = ?",
        [class_term_id],
        |r| r.get(0),
    )?;
    conn.execute(
        "INSERT INTO class_term_subjects(class_term_id, subject_id, sort_order, teacher_name)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(class_term_id, subject_id) DO UPDATE SET
           teacher_name = COALESCE(excluded.teacher_name, class_term_subjects.teacher_name)",
        (class_term_id, subject_id, next_sort, teacher_name),
    )?;
    Ok(())
}

pub fn assign_teacher(
    conn: &Connection,
    class_term_id: &str,
    subject_id: &str,
    teacher_name: &str,
) -> Result<(), CalcError> {
    let teacher_name = non_empty("teacherName", teacher_name)?;
    let changed = conn.execute(
        "UPDATE class_term_subjects SET teacher_name = ? WHERE class_term_id = ? AND subject_id = ?",
        (&teacher_name, class_term_id, subject_id),
    )?;
    if changed == 0 {
        return Err(CalcError::not_found("subject offering", subject_id));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewStudent<'a> {
    pub school_id: &'a str,
    pub last_name: &'a str,
    pub first_name: &'a str,
    pub student_no: Option<&'a str>,
}

pub fn create_student(conn: &Connection, s: &NewStudent<'_>) -> Result<String, CalcError> {
    require_exists(conn, "schools", "school", s.school_id)?;
    let last = non_empty("lastName", s.last_name)?;
    let first = non_empty("firstName", s.first_name)?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, school_id, last_name, first_name, student_no) VALUES(?, ?, ?, ?, ?)",
        (&id, s.school_id, &last, &first, s.student_no),
    )?;
    Ok(id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollOutcome {
    pub enrolled: usize,
    pub already_enrolled: usize,
}

pub fn enroll(conn: &Connection, class_term_id: &str, student_ids: &[String]) -> Result<EnrollOutcome, CalcError> {
    require_exists(conn, "class_terms", "class-term", class_term_id)?;
    for sid in student_ids {
        require_exists(conn, "students", "student", sid)?;
    }
    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();
    let mut enrolled = 0usize;
    for sid in student_ids {
        enrolled += tx.execute(
            "INSERT OR IGNORE INTO class_term_students(class_term_id, student_id, status, enrolled_at)
             VALUES(?, ?, 'active', ?)",
            (class_term_id, sid, &now),
        )?;
    }
    tx.commit()?;
    Ok(EnrollOutcome {
        enrolled,
        already_enrolled: student_ids.len() - enrolled,
    })
}
