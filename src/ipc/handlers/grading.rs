use crate::calc::grading::DEFAULT_PASS_MARK;
use crate::calc::{CalcError, GradingLevel};
use crate::ipc::helpers::{db_conn, optional_str, required_str, respond, typed_param};
use crate::ipc::types::{AppState, Request};
use crate::store::grading::{load_grading_system, save_grading_system};
use serde_json::{json, Value};

/// `gradingSystem: null` when the school has none; callers treat that as "cannot grade".
fn grading_system_get(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let school_id = required_str(req, "schoolId")?;
    let system = load_grading_system(conn, &school_id)?;
    Ok(json!({ "gradingSystem": system }))
}

fn grading_system_set(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let school_id = required_str(req, "schoolId")?;
    let name = optional_str(req, "name")?.unwrap_or_else(|| "Default".to_string());
    let pass_mark = match req.params.get("passMark") {
        None | Some(Value::Null) => DEFAULT_PASS_MARK,
        Some(v) => v
            .as_f64()
            .ok_or_else(|| CalcError::bad_params("passMark must be a number"))?,
    };
    let levels: Vec<GradingLevel> = typed_param(req, "levels")?;
    let system = save_grading_system(conn, &school_id, &name, pass_mark, levels)?;
    tracing::info!(school_id = %school_id, levels = system.levels.len(), "grading system replaced");
    Ok(json!({ "gradingSystem": system }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "gradingSystem.get" => grading_system_get(state, req),
        "gradingSystem.set" => grading_system_set(state, req),
        _ => return None,
    };
    Some(respond(req, result))
}
