use crate::calc::transition::TransitionPolicy;
use crate::calc::CalcError;
use crate::db;
use crate::ipc::helpers::{db_conn, respond};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Transitions,
    Assessments,
    Results,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Transitions, Self::Assessments, Self::Results];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "transitions" => Some(Self::Transitions),
            "assessments" => Some(Self::Assessments),
            "results" => Some(Self::Results),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Transitions => "transitions",
            Self::Assessments => "assessments",
            Self::Results => "results",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Transitions => "setup.transitions",
            Self::Assessments => "setup.assessments",
            Self::Results => "setup.results",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Transitions => json!({
            "minPassRate": null,
            "allowIneligiblePromotion": true
        }),
        SetupSection::Assessments => json!({
            "requireTeacherAssignment": false
        }),
        SetupSection::Results => json!({
            "topCount": 5
        }),
    }
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_nullable_percent(v: &Value, key: &str) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let n = v.as_f64().ok_or_else(|| format!("{} must be a number or null", key))?;
    if !(0.0..=100.0).contains(&n) {
        return Err(format!("{} must be in 0..=100", key));
    }
    Ok(json!(n))
}

fn merge_section_patch(section: SetupSection, current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        let value = match (section, k.as_str()) {
            (SetupSection::Transitions, "minPassRate") => parse_nullable_percent(v, k)?,
            (SetupSection::Transitions, "allowIneligiblePromotion") => Value::Bool(parse_bool(v, k)?),
            (SetupSection::Assessments, "requireTeacherAssignment") => Value::Bool(parse_bool(v, k)?),
            (SetupSection::Results, "topCount") => Value::from(parse_i64_range(v, k, 1, 50)?),
            _ => return Err(format!("unknown {} field: {}", section.name(), k)),
        };
        obj.insert(k.clone(), value);
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> Result<Value, CalcError> {
    let mut current = default_section(section);
    let Some(saved) = db::settings_get_json(conn, section.key())? else {
        return Ok(current);
    };
    let Some(saved_obj) = saved.as_object() else {
        return Err(CalcError::SetupInvalid {
            section: section.name(),
            message: "expected an object".to_string(),
        });
    };
    merge_section_patch(section, &mut current, saved_obj).map_err(|message| CalcError::SetupInvalid {
        section: section.name(),
        message,
    })?;
    Ok(current)
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionSetup {
    pub policy: TransitionPolicy,
    pub allow_ineligible_promotion: bool,
}

pub fn transition_setup(conn: &Connection) -> Result<TransitionSetup, CalcError> {
    let v = load_section(conn, SetupSection::Transitions)?;
    Ok(TransitionSetup {
        policy: TransitionPolicy {
            min_pass_rate: v.get("minPassRate").and_then(|x| x.as_f64()),
        },
        allow_ineligible_promotion: v
            .get("allowIneligiblePromotion")
            .and_then(|x| x.as_bool())
            .unwrap_or(true),
    })
}

pub fn require_teacher_assignment(conn: &Connection) -> Result<bool, CalcError> {
    let v = load_section(conn, SetupSection::Assessments)?;
    Ok(v.get("requireTeacherAssignment")
        .and_then(|x| x.as_bool())
        .unwrap_or(false))
}

pub fn top_count(conn: &Connection) -> Result<usize, CalcError> {
    let v = load_section(conn, SetupSection::Results)?;
    Ok(v.get("topCount").and_then(|x| x.as_u64()).unwrap_or(5) as usize)
}

fn setup_get(state: &AppState) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let mut out = Map::new();
    for section in SetupSection::ALL {
        out.insert(section.name().to_string(), load_section(conn, section)?);
    }
    Ok(Value::Object(out))
}

fn setup_update(state: &AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return Err(CalcError::bad_params("missing section"));
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return Err(CalcError::bad_params("unknown section"));
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(CalcError::bad_params("patch must be an object"));
    };

    let mut current = load_section(conn, section)?;
    merge_section_patch(section, &mut current, patch_obj).map_err(CalcError::bad_params)?;
    db::settings_set_json(conn, section.key(), &current)?;
    Ok(json!({ "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(respond(req, setup_get(state))),
        "setup.update" => Some(respond(req, setup_update(state, req))),
        _ => None,
    }
}
