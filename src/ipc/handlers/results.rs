use crate::calc::results::{compile_class_results, dashboard};
use crate::calc::{CalcError, ClassResults};
use crate::ipc::handlers::setup::top_count;
use crate::ipc::helpers::{class_term_param, db_conn, required_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::store::assessments::load_assessments;
use crate::store::grading::require_grading_system;
use crate::store::{load_students, load_subjects, ClassTermInfo};
use rusqlite::Connection;
use serde_json::{json, Value};

/// Every results surface goes through here so they all rank the same way.
pub fn compile_for_class_term(conn: &Connection, class_term: &ClassTermInfo) -> Result<ClassResults, CalcError> {
    let grading = require_grading_system(conn, &class_term.school_id)?;
    let students = load_students(conn, &class_term.id)?;
    let subjects = load_subjects(conn, &class_term.id)?;
    let assessments = load_assessments(conn, class_term, None)?;
    let results = compile_class_results(&students, &subjects, &assessments, &grading);
    tracing::debug!(
        class_term_id = %class_term.id,
        students = results.rows.len(),
        ranked = results.ranked_count(),
        digest = %results.digest,
        "class results compiled"
    );
    Ok(results)
}

fn results_class_term(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term = class_term_param(conn, req)?;
    let results = compile_for_class_term(conn, &class_term)?;
    Ok(json!({
        "classInfo": class_term,
        "passMark": results.pass_mark,
        "subjects": results.subjects,
        "rows": results.rows,
        "digest": results.digest,
    }))
}

fn results_report_card(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term = class_term_param(conn, req)?;
    let student_id = required_str(req, "studentId")?;
    let results = compile_for_class_term(conn, &class_term)?;
    let Some(row) = results.row(&student_id) else {
        return Err(CalcError::not_found("student", student_id));
    };

    let subjects: Vec<Value> = results
        .subjects
        .iter()
        .map(|s| {
            let cell = row.subjects.get(&s.id);
            json!({
                "subjectId": s.id,
                "name": s.name,
                "code": s.code,
                "components": cell.and_then(|c| c.components),
                "score": cell.and_then(|c| c.score),
                "grade": cell.and_then(|c| c.grade.clone()),
                "remark": cell.and_then(|c| c.remark.clone()),
                "status": cell.and_then(|c| c.status),
            })
        })
        .collect();

    Ok(json!({
        "classInfo": class_term,
        "student": {
            "studentId": row.student_id,
            "displayName": row.display_name,
            "enrollmentStatus": row.enrollment_status,
        },
        "subjects": subjects,
        "totalScore": row.total_score,
        "averageScore": row.average_score,
        "scoredSubjects": row.scored_subjects,
        "grade": row.grade,
        "position": row.position,
        "positionLabel": row.position_label,
        "classSize": results.ranked_count(),
        "passMark": results.pass_mark,
        "digest": results.digest,
    }))
}

fn results_dashboard(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term = class_term_param(conn, req)?;
    let results = compile_for_class_term(conn, &class_term)?;
    let top = top_count(conn)?;
    Ok(json!({
        "classInfo": class_term,
        "dashboard": dashboard(&results, top),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "results.classTerm" => results_class_term(state, req),
        "results.reportCard" => results_report_card(state, req),
        "results.dashboard" => results_dashboard(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
