use crate::calc::transition::{candidate_statistics, transition_candidates, TransitionCandidate, TransitionType};
use crate::calc::CalcError;
use crate::ipc::handlers::results::compile_for_class_term;
use crate::ipc::handlers::setup::transition_setup;
use crate::ipc::helpers::{db_conn, optional_str, required_str, respond, string_list};
use crate::ipc::types::{AppState, Request};
use crate::store::transitions::{execute_transitions, list_transitions, TransitionRequest};
use crate::store::{load_class_term, ClassTermInfo};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::HashSet;

/// Candidates are the students still active in the class-term; positions come from the whole class.
fn active_candidates(
    conn: &Connection,
    class_term: &ClassTermInfo,
) -> Result<(Vec<TransitionCandidate>, f64), CalcError> {
    let setup = transition_setup(conn)?;
    let results = compile_for_class_term(conn, class_term)?;
    let candidates = transition_candidates(&results, setup.policy)
        .into_iter()
        .filter(|c| c.enrollment_status == "active")
        .collect();
    Ok((candidates, results.pass_mark))
}

fn transitions_evaluate(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let from_id = required_str(req, "fromClassTermId")?;
    let class_term = load_class_term(conn, &from_id)?;
    let setup = transition_setup(conn)?;
    let (candidates, pass_mark) = active_candidates(conn, &class_term)?;
    let statistics = candidate_statistics(&candidates, pass_mark);
    Ok(json!({
        "students": candidates,
        "statistics": statistics,
        "classInfo": class_term,
        "policy": setup.policy,
    }))
}

fn transitions_execute(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let from_id = required_str(req, "fromClassTermId")?;
    let from = load_class_term(conn, &from_id)?;
    let raw_type = required_str(req, "transitionType")?;
    let Some(transition_type) = TransitionType::parse(&raw_type) else {
        return Err(CalcError::bad_params(
            "transitionType must be one of: PROMOTION, TRANSFER, WITHDRAWAL",
        ));
    };
    let request = TransitionRequest {
        to_class_term_id: optional_str(req, "toClassTermId")?,
        student_ids: string_list(req, "studentIds")?,
        transition_type,
        notes: optional_str(req, "notes")?,
    };

    let setup = transition_setup(conn)?;
    let (candidates, _) = active_candidates(conn, &from)?;
    if transition_type == TransitionType::Promotion && !setup.allow_ineligible_promotion {
        let selected: HashSet<&str> = request.student_ids.iter().map(|s| s.as_str()).collect();
        let blocked: Vec<&str> = candidates
            .iter()
            .filter(|c| selected.contains(c.student_id.as_str()) && !c.is_eligible)
            .map(|c| c.student_id.as_str())
            .collect();
        if !blocked.is_empty() {
            return Err(CalcError::Validation {
                message: format!("{} selected student(s) are not eligible for promotion", blocked.len()),
                details: json!({ "ineligibleStudentIds": blocked }),
            });
        }
    }

    let outcome = execute_transitions(conn, &from, &request, &candidates)?;
    Ok(json!({
        "success": true,
        "message": outcome.message,
        "batchId": outcome.batch_id,
        "moved": outcome.moved,
    }))
}

fn transitions_history(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term_id = required_str(req, "classTermId")?;
    load_class_term(conn, &class_term_id)?;
    let records = list_transitions(conn, &class_term_id)?;
    Ok(json!({ "records": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "transitions.evaluate" => transitions_evaluate(state, req),
        "transitions.execute" => transitions_execute(state, req),
        "transitions.history" => transitions_history(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
