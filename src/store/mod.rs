//! SQLite-backed collaborator: loads the rows the engine computes over and persists
//! the few things it is allowed to write (assessments, transitions, roster setup).
//! Multi-row writes run in one transaction and roll back on the first failure.

pub mod assessments;
pub mod grading;
pub mod roster;
pub mod transitions;

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::calc::{CalcError, StudentInfo, SubjectInfo};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTermInfo {
    pub id: String,
    pub class_id: String,
    pub class_name: String,
    pub term_id: String,
    pub term_name: String,
    pub school_id: String,
}

pub fn load_class_term(conn: &Connection, class_term_id: &str) -> Result<ClassTermInfo, CalcError> {
    conn.query_row(
        "SELECT ct.id, c.id, c.name, t.id, t.name, c.school_id
         FROM class_terms ct
         JOIN classes c ON c.id = ct.class_id
         JOIN terms t ON t.id = ct.term_id
         WHERE ct.id = ?",
        [class_term_id],
        |r| {
            Ok(ClassTermInfo {
                id: r.get(0)?,
                class_id: r.get(1)?,
                class_name: r.get(2)?,
                term_id: r.get(3)?,
                term_name: r.get(4)?,
                school_id: r.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| CalcError::not_found("class-term", class_term_id))
}

/// Every student ever enrolled in the class-term, including those already moved on, so
/// historical results keep their positions.
pub fn load_students(conn: &Connection, class_term_id: &str) -> Result<Vec<StudentInfo>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.last_name, s.first_name, cts.status
         FROM class_term_students cts
         JOIN students s ON s.id = cts.student_id
         WHERE cts.class_term_id = ?
         ORDER BY s.last_name COLLATE NOCASE, s.first_name COLLATE NOCASE, s.id",
    )?;
    let rows = stmt
        .query_map([class_term_id], |r| {
            let last: String = r.get(1)?;
            let first: String = r.get(2)?;
            Ok(StudentInfo {
                id: r.get(0)?,
                display_name: format!("{}, {}", last, first),
                enrollment_status: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_subjects(conn: &Connection, class_term_id: &str) -> Result<Vec<SubjectInfo>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.code
         FROM class_term_subjects cts
         JOIN subjects s ON s.id = cts.subject_id
         WHERE cts.class_term_id = ?
         ORDER BY cts.sort_order, s.name",
    )?;
    let rows = stmt
        .query_map([class_term_id], |r| {
            Ok(SubjectInfo {
                id: r.get(0)?,
                name: r.get(1)?,
                code: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOffering {
    pub subject: SubjectInfo,
    pub teacher_name: Option<String>,
}

pub fn load_offering(
    conn: &Connection,
    class_term_id: &str,
    subject_id: &str,
) -> Result<SubjectOffering, CalcError> {
    conn.query_row(
        "SELECT s.id, s.name, s.code, cts.teacher_name
         FROM class_term_subjects cts
         JOIN subjects s ON s.id = cts.subject_id
         WHERE cts.class_term_id = ? AND cts.subject_id = ?",
        (class_term_id, subject_id),
        |r| {
            Ok(SubjectOffering {
                subject: SubjectInfo {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    code: r.get(2)?,
                },
                teacher_name: r.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| CalcError::not_found("subject offering", subject_id))
}
