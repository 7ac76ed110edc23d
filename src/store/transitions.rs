use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::ClassTermInfo;
use crate::calc::transition::{TransitionCandidate, TransitionType};
use crate::calc::CalcError;
use crate::db::now_rfc3339;

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub to_class_term_id: Option<String>,
    pub student_ids: Vec<String>,
    pub transition_type: TransitionType,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub batch_id: String,
    pub moved: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub id: String,
    pub batch_id: String,
    pub student_id: String,
    pub display_name: String,
    pub from_class_term_id: String,
    pub to_class_term_id: Option<String>,
    pub transition_type: String,
    pub notes: Option<String>,
    pub average_score: f64,
    pub was_eligible: bool,
    pub created_at: String,
}

fn enrollment_status(
    conn: &Connection,
    class_term_id: &str,
    student_id: &str,
) -> Result<Option<String>, CalcError> {
    Ok(conn
        .query_row(
            "SELECT status FROM class_term_students WHERE class_term_id = ? AND student_id = ?",
            (class_term_id, student_id),
            |r| r.get(0),
        )
        .optional()?)
}

fn class_term_exists(conn: &Connection, id: &str) -> Result<bool, CalcError> {
    Ok(conn
        .query_row("SELECT 1 FROM class_terms WHERE id = ?", [id], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Moves the whole batch or nothing. `candidates` supplies the average/eligibility snapshot
/// stored with each record; it does not gate the move.
pub fn execute_transitions(
    conn: &Connection,
    from: &ClassTermInfo,
    req: &TransitionRequest,
    candidates: &[TransitionCandidate],
) -> Result<TransitionOutcome, CalcError> {
    if req.student_ids.is_empty() {
        return Err(CalcError::bad_params("studentIds must contain at least one student"));
    }
    let mut seen: HashSet<&str> = HashSet::new();
    for id in &req.student_ids {
        if !seen.insert(id.as_str()) {
            return Err(CalcError::bad_params(format!("duplicate student id: {}", id)));
        }
    }

    let destination = if req.transition_type.needs_destination() {
        let Some(to) = req.to_class_term_id.as_deref() else {
            return Err(CalcError::NoDestination {
                to_class_term_id: None,
            });
        };
        if !class_term_exists(conn, to)? {
            return Err(CalcError::NoDestination {
                to_class_term_id: Some(to.to_string()),
            });
        }
        if to == from.id {
            return Err(CalcError::bad_params(
                "destination class-term must differ from the source",
            ));
        }
        Some(to)
    } else {
        None
    };

    let mut problems: Vec<Value> = Vec::new();
    for sid in &req.student_ids {
        match enrollment_status(conn, &from.id, sid)?.as_deref() {
            Some("active") => {}
            Some(other) => problems.push(json!({
                "studentId": sid,
                "error": format!("student already left the class-term ({})", other),
            })),
            None => problems.push(json!({
                "studentId": sid,
                "error": "student is not enrolled in the source class-term",
            })),
        }
        if let Some(to) = destination {
            if enrollment_status(conn, to, sid)?.is_some() {
                problems.push(json!({
                    "studentId": sid,
                    "error": "student is already enrolled in the destination class-term",
                }));
            }
        }
    }
    if !problems.is_empty() {
        return Err(CalcError::Validation {
            message: format!("{} student(s) cannot be moved", problems.len()),
            details: json!({ "students": problems }),
        });
    }

    let snapshot: HashMap<&str, &TransitionCandidate> = candidates
        .iter()
        .map(|c| (c.student_id.as_str(), c))
        .collect();

    let batch_id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    let tx = conn.unchecked_transaction()?;
    for sid in &req.student_ids {
        tx.execute(
            "UPDATE class_term_students SET status = ? WHERE class_term_id = ? AND student_id = ?",
            (req.transition_type.source_status(), &from.id, sid),
        )?;
        if let Some(to) = destination {
            tx.execute(
                "INSERT INTO class_term_students(class_term_id, student_id, status, enrolled_at)
                 VALUES(?, ?, 'active', ?)",
                (to, sid, &now),
            )?;
        }
        let (average, eligible) = snapshot
            .get(sid.as_str())
            .map(|c| (c.average_score, c.is_eligible))
            .unwrap_or((0.0, false));
        tx.execute(
            "INSERT INTO transition_records(
                id, batch_id, student_id, from_class_term_id, to_class_term_id, transition_type,
                notes, average_score, was_eligible, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &batch_id,
                sid,
                &from.id,
                destination,
                req.transition_type.as_str(),
                &req.notes,
                average,
                eligible as i64,
                &now,
            ),
        )?;
    }
    tx.commit()?;

    let moved = req.student_ids.len();
    tracing::info!(
        from_class_term_id = %from.id,
        to_class_term_id = destination.unwrap_or("-"),
        transition_type = req.transition_type.as_str(),
        moved,
        "transition batch executed"
    );
    Ok(TransitionOutcome {
        batch_id,
        moved,
        message: format!(
            "{} student(s) processed for {}",
            moved,
            req.transition_type.as_str().to_ascii_lowercase()
        ),
    })
}

/// Records where the class-term is either the source or the destination, newest first.
pub fn list_transitions(conn: &Connection, class_term_id: &str) -> Result<Vec<TransitionRecord>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT tr.id, tr.batch_id, tr.student_id, s.last_name, s.first_name,
                tr.from_class_term_id, tr.to_class_term_id, tr.transition_type, tr.notes,
                tr.average_score, tr.was_eligible, tr.created_at
         FROM transition_records tr
         JOIN students s ON s.id = tr.student_id
         WHERE tr.from_class_term_id = ?1 OR tr.to_class_term_id = ?1
         ORDER BY tr.created_at DESC, s.last_name, s.first_name",
    )?;
    let rows = stmt
        .query_map([class_term_id], |r| {
            let last: String = r.get(3)?;
            let first: String = r.get(4)?;
            Ok(TransitionRecord {
                id: r.get(0)?,
                batch_id: r.get(1)?,
                student_id: r.get(2)?,
                display_name: format!("{}, {}", last, first),
                from_class_term_id: r.get(5)?,
                to_class_term_id: r.get(6)?,
                transition_type: r.get(7)?,
                notes: r.get(8)?,
                average_score: r.get(9)?,
                was_eligible: r.get::<_, i64>(10)? != 0,
                created_at: r.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
