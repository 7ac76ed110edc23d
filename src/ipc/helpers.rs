use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{calc_err, ok};
use super::types::{AppState, Request};
use crate::calc::CalcError;
use crate::store::{load_class_term, ClassTermInfo};

pub fn db_conn(state: &AppState) -> Result<&Connection, CalcError> {
    state.db.as_ref().ok_or(CalcError::NoWorkspace)
}

pub fn required_str(req: &Request, key: &str) -> Result<String, CalcError> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CalcError::bad_params(format!("missing {}", key)))
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, CalcError> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
        Some(_) => Err(CalcError::bad_params(format!("{} must be a string", key))),
    }
}

pub fn string_list(req: &Request, key: &str) -> Result<Vec<String>, CalcError> {
    let Some(items) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(CalcError::bad_params(format!("{} must be an array", key)));
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| CalcError::bad_params(format!("{} must contain only strings", key)))
        })
        .collect()
}

/// Typed view of one param; serde's message becomes the `bad_params` message.
pub fn typed_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, CalcError> {
    let raw = req
        .params
        .get(key)
        .cloned()
        .ok_or_else(|| CalcError::bad_params(format!("missing {}", key)))?;
    serde_json::from_value(raw).map_err(|e| CalcError::bad_params(format!("invalid {}: {}", key, e)))
}

pub fn respond(req: &Request, result: Result<Value, CalcError>) -> Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => calc_err(&req.id, &e),
    }
}

/// Loads `classTermId`; a `termId` param, when present, must name the class-term's own term.
pub fn class_term_param(conn: &Connection, req: &Request) -> Result<ClassTermInfo, CalcError> {
    let class_term_id = required_str(req, "classTermId")?;
    let class_term = load_class_term(conn, &class_term_id)?;
    if let Some(term_id) = optional_str(req, "termId")? {
        if term_id != class_term.term_id {
            return Err(CalcError::bad_params(format!(
                "termId {} does not belong to class-term {}",
                term_id, class_term.id
            )));
        }
    }
    Ok(class_term)
}
