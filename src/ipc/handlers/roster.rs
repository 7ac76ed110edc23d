use crate::calc::CalcError;
use crate::ipc::helpers::{db_conn, optional_str, required_str, respond, string_list};
use crate::ipc::types::{AppState, Request};
use crate::store::roster::{self, NewStudent};
use serde_json::{json, Value};

fn schools_create(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let name = required_str(req, "name")?;
    let id = roster::create_school(conn, &name)?;
    Ok(json!({ "schoolId": id }))
}

fn terms_create(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let school_id = required_str(req, "schoolId")?;
    let name = required_str(req, "name")?;
    let id = roster::create_term(conn, &school_id, &name)?;
    Ok(json!({ "termId": id }))
}

fn classes_create(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let school_id = required_str(req, "schoolId")?;
    let name = required_str(req, "name")?;
    let id = roster::create_class(conn, &school_id, &name)?;
    Ok(json!({ "classId": id }))
}

fn class_terms_create(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_id = required_str(req, "classId")?;
    let term_id = required_str(req, "termId")?;
    let id = roster::create_class_term(conn, &class_id, &term_id)?;
    Ok(json!({ "classTermId": id }))
}

fn subjects_create(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let school_id = required_str(req, "schoolId")?;
    let name = required_str(req, "name")?;
    let code = optional_str(req, "code")?;
    let id = roster::create_subject(conn, &school_id, &name, code.as_deref())?;
    Ok(json!({ "subjectId": id }))
}

fn class_terms_add_subject(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term_id = required_str(req, "classTermId")?;
    let subject_id = required_str(req, "subjectId")?;
    let teacher_name = optional_str(req, "teacherName")?;
    roster::add_subject(conn, &class_term_id, &subject_id, teacher_name.as_deref())?;
    Ok(json!({ "ok": true }))
}

fn class_terms_assign_teacher(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term_id = required_str(req, "classTermId")?;
    let subject_id = required_str(req, "subjectId")?;
    let teacher_name = required_str(req, "teacherName")?;
    roster::assign_teacher(conn, &class_term_id, &subject_id, &teacher_name)?;
    Ok(json!({ "ok": true }))
}

fn students_create(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let school_id = required_str(req, "schoolId")?;
    let last_name = required_str(req, "lastName")?;
    let first_name = required_str(req, "firstName")?;
    let student_no = optional_str(req, "studentNo")?;
    let id = roster::create_student(
        conn,
        &NewStudent {
            school_id: &school_id,
            last_name: &last_name,
            first_name: &first_name,
            student_no: student_no.as_deref(),
        },
    )?;
    Ok(json!({ "studentId": id }))
}

fn class_terms_enroll(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term_id = required_str(req, "classTermId")?;
    let student_ids = string_list(req, "studentIds")?;
    let outcome = roster::enroll(conn, &class_term_id, &student_ids)?;
    Ok(serde_json::to_value(outcome)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "schools.create" => schools_create(state, req),
        "terms.create" => terms_create(state, req),
        "classes.create" => classes_create(state, req),
        "classTerms.create" => class_terms_create(state, req),
        "subjects.create" => subjects_create(state, req),
        "classTerms.addSubject" => class_terms_add_subject(state, req),
        "classTerms.assignTeacher" => class_terms_assign_teacher(state, req),
        "students.create" => students_create(state, req),
        "classTerms.enroll" => class_terms_enroll(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
