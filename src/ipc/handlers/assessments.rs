use crate::calc::aggregate::completion_statistics;
use crate::calc::{AssessmentRecord, CalcError, GradingSystem, StudentInfo};
use crate::ipc::handlers::setup::require_teacher_assignment;
use crate::ipc::helpers::{class_term_param, db_conn, required_str, respond, typed_param};
use crate::ipc::types::{AppState, Request};
use crate::store::assessments::{load_assessments, publish_assessments, save_assessments, AssessmentInput};
use crate::store::grading::{load_grading_system, require_grading_system};
use crate::store::{load_offering, load_students, ClassTermInfo, SubjectOffering};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Everything the score-entry surfaces need for one class-term subject.
pub struct SubjectSheet {
    pub offering: SubjectOffering,
    pub students: Vec<StudentInfo>,
    pub assessments: Vec<AssessmentRecord>,
    pub grading: Option<GradingSystem>,
}

pub fn load_subject_sheet(
    conn: &Connection,
    class_term: &ClassTermInfo,
    subject_id: &str,
) -> Result<SubjectSheet, CalcError> {
    let offering = load_offering(conn, &class_term.id, subject_id)?;
    let students = load_students(conn, &class_term.id)?;
    let assessments = load_assessments(conn, class_term, Some(subject_id))?;
    let grading = load_grading_system(conn, &class_term.school_id)?;
    Ok(SubjectSheet {
        offering,
        students,
        assessments,
        grading,
    })
}

fn assessments_fetch(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term = class_term_param(conn, req)?;
    let subject_id = required_str(req, "subjectId")?;
    let sheet = load_subject_sheet(conn, &class_term, &subject_id)?;

    let by_student: HashMap<&str, &AssessmentRecord> = sheet
        .assessments
        .iter()
        .map(|a| (a.student_id.as_str(), a))
        .collect();
    // Students who already moved on no longer count against completion.
    let statistics = completion_statistics(
        sheet
            .students
            .iter()
            .filter(|s| s.is_active())
            .map(|s| by_student.get(s.id.as_str()).map(|a| a.completion())),
    );

    Ok(json!({
        "students": sheet.students,
        "assessments": sheet.assessments,
        "statistics": statistics,
        "classInfo": {
            "classTerm": class_term,
            "subject": sheet.offering.subject,
            "teacherName": sheet.offering.teacher_name,
        },
        "gradingSystem": sheet.grading,
    }))
}

fn assessments_save(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term = class_term_param(conn, req)?;
    let subject_id = required_str(req, "subjectId")?;
    let rows: Vec<AssessmentInput> = typed_param(req, "rows")?;
    let grading = load_grading_system(conn, &class_term.school_id)?;
    let require_teacher = require_teacher_assignment(conn)?;

    let outcome = save_assessments(
        conn,
        &class_term,
        &subject_id,
        &rows,
        grading.as_ref(),
        require_teacher,
    )?;
    Ok(json!({
        "success": true,
        "data": outcome.data,
        "teacherInfo": outcome.teacher_name.map(|name| json!({ "teacherName": name })),
    }))
}

fn assessments_publish(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term = class_term_param(conn, req)?;
    let subject_id = required_str(req, "subjectId")?;
    let grading = require_grading_system(conn, &class_term.school_id)?;
    let published = publish_assessments(conn, &class_term, &subject_id, &grading)?;
    Ok(json!({ "published": published }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assessments.fetch" => assessments_fetch(state, req),
        "assessments.save" => assessments_save(state, req),
        "assessments.publish" => assessments_publish(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
