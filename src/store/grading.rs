use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

use crate::calc::{CalcError, GradingLevel, GradingSystem};
use crate::db::now_rfc3339;

pub fn load_grading_system(conn: &Connection, school_id: &str) -> Result<Option<GradingSystem>, CalcError> {
    let head: Option<(String, String, f64)> = conn
        .query_row(
            "SELECT id, name, pass_mark FROM grading_systems WHERE school_id = ?",
            [school_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((id, name, pass_mark)) = head else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT grade, min_score, max_score, remark
         FROM grading_levels
         WHERE grading_system_id = ?
         ORDER BY min_score DESC",
    )?;
    let levels = stmt
        .query_map([&id], |r| {
            Ok(GradingLevel {
                grade: r.get(0)?,
                min_score: r.get(1)?,
                max_score: r.get(2)?,
                remark: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(GradingSystem {
        id,
        school_id: school_id.to_string(),
        name,
        pass_mark,
        levels,
    }))
}

/// Results, report cards and transitions refuse to run without a configured system.
pub fn require_grading_system(conn: &Connection, school_id: &str) -> Result<GradingSystem, CalcError> {
    load_grading_system(conn, school_id)?.ok_or_else(|| CalcError::NoGradingSystem {
        school_id: school_id.to_string(),
    })
}

/// Levels must partition 0..=100: each level starts exactly where the one below ends, the
/// lowest starts at 0 and the highest ends at 100. A shared boundary belongs to the upper level.
fn check_levels(levels: &[GradingLevel]) -> Result<(), CalcError> {
    if levels.is_empty() {
        return Err(CalcError::bad_params("levels must not be empty"));
    }
    for (i, l) in levels.iter().enumerate() {
        if l.grade.trim().is_empty() {
            return Err(CalcError::Validation {
                message: "grade must not be empty".to_string(),
                details: json!({ "index": i }),
            });
        }
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(l.min_score) || !in_range(l.max_score) || l.min_score > l.max_score {
            return Err(CalcError::Validation {
                message: "level bounds must satisfy 0 <= minScore <= maxScore <= 100".to_string(),
                details: json!({ "index": i, "grade": l.grade }),
            });
        }
    }
    for pair in levels.windows(2) {
        let (upper, lower) = (&pair[0], &pair[1]);
        if lower.max_score > upper.min_score || upper.min_score == lower.min_score {
            return Err(CalcError::Validation {
                message: "grading levels overlap".to_string(),
                details: json!({ "grades": [upper.grade, lower.grade] }),
            });
        }
        if lower.max_score < upper.min_score {
            return Err(CalcError::Validation {
                message: format!(
                    "grading levels leave a gap: {} must end at {}",
                    lower.grade, upper.min_score
                ),
                details: json!({ "grades": [upper.grade, lower.grade] }),
            });
        }
    }
    if levels[levels.len() - 1].min_score != 0.0 {
        return Err(CalcError::Validation {
            message: "lowest level must start at 0".to_string(),
            details: json!({}),
        });
    }
    if levels[0].max_score != 100.0 {
        return Err(CalcError::Validation {
            message: "highest level must end at 100".to_string(),
            details: json!({}),
        });
    }
    Ok(())
}

/// Replaces the school's system and all its levels in one transaction.
pub fn save_grading_system(
    conn: &Connection,
    school_id: &str,
    name: &str,
    pass_mark: f64,
    levels: Vec<GradingLevel>,
) -> Result<GradingSystem, CalcError> {
    if !pass_mark.is_finite() || !(0.0..=100.0).contains(&pass_mark) {
        return Err(CalcError::bad_params("passMark must be between 0 and 100"));
    }
    let mut system = GradingSystem {
        id: String::new(),
        school_id: school_id.to_string(),
        name: name.to_string(),
        pass_mark,
        levels,
    };
    system.sort_levels();
    check_levels(&system.levels)?;

    let exists: bool = conn
        .query_row("SELECT 1 FROM schools WHERE id = ?", [school_id], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        return Err(CalcError::not_found("school", school_id));
    }

    let tx = conn.unchecked_transaction()?;
    let existing_id: Option<String> = tx
        .query_row(
            "SELECT id FROM grading_systems WHERE school_id = ?",
            [school_id],
            |r| r.get(0),
        )
        .optional()?;
    let id = match existing_id {
        Some(id) => {
            tx.execute(
                "UPDATE grading_systems SET name = ?, pass_mark = ?, updated_at = ? WHERE id = ?",
                (name, pass_mark, now_rfc3339(), &id),
            )?;
            tx.execute("DELETE FROM grading_levels WHERE grading_system_id = ?", [&id])?;
            id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO grading_systems(id, school_id, name, pass_mark, updated_at)
                 VALUES(?, ?, ?, ?, ?)",
                (&id, school_id, name, pass_mark, now_rfc3339()),
            )?;
            id
        }
    };
    for l in &system.levels {
        tx.execute(
            "INSERT INTO grading_levels(id, grading_system_id, grade, min_score, max_score, remark)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &id,
                &l.grade,
                l.min_score,
                l.max_score,
                &l.remark,
            ),
        )?;
    }
    tx.commit()?;

    system.id = id;
    tracing::info!(school_id, levels = system.levels.len(), pass_mark, "grading system saved");
    Ok(system)
}
