use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use uuid::Uuid;

use super::{load_offering, load_students, ClassTermInfo};
use crate::calc::score::{score_subject, validate_score};
use crate::calc::{AssessmentRecord, AttendanceFlags, CalcError, GradingSystem, ScoreComponents, ScoreField};
use crate::db::now_rfc3339;

const SELECT_ASSESSMENT: &str = "SELECT id, student_id, subject_id, term_id, ca1, ca2, ca3, exam,
        is_absent, is_exempt, total_score, grade, remark, is_published, updated_at
     FROM assessments";

pub const SAVE_MAX_ROWS: usize = 2000;

fn map_assessment(r: &Row<'_>) -> rusqlite::Result<AssessmentRecord> {
    Ok(AssessmentRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        subject_id: r.get(2)?,
        term_id: r.get(3)?,
        components: ScoreComponents {
            ca1: r.get(4)?,
            ca2: r.get(5)?,
            ca3: r.get(6)?,
            exam: r.get(7)?,
        },
        flags: AttendanceFlags {
            is_absent: r.get::<_, i64>(8)? != 0,
            is_exempt: r.get::<_, i64>(9)? != 0,
        },
        total_score: r.get(10)?,
        grade: r.get(11)?,
        remark: r.get(12)?,
        is_published: r.get::<_, i64>(13)? != 0,
        updated_at: r.get(14)?,
    })
}

/// Rows are keyed by (student, subject, term), so a class-term reads the term's rows of every
/// student enrolled in it, wherever the row was first recorded. All subjects, or only one.
pub fn load_assessments(
    conn: &Connection,
    class_term: &ClassTermInfo,
    subject_id: Option<&str>,
) -> Result<Vec<AssessmentRecord>, CalcError> {
    let roster = "term_id = ? AND student_id IN (
            SELECT student_id FROM class_term_students WHERE class_term_id = ?)";
    let rows = match subject_id {
        Some(subject_id) => {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE {} AND subject_id = ?",
                SELECT_ASSESSMENT, roster
            ))?;
            let rows = stmt
                .query_map((&class_term.term_id, &class_term.id, subject_id), map_assessment)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} WHERE {}", SELECT_ASSESSMENT, roster))?;
            let rows = stmt
                .query_map((&class_term.term_id, &class_term.id), map_assessment)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

/// One row of a save batch. Without `id` the row is matched on (student, subject, term).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentInput {
    #[serde(default)]
    pub id: Option<String>,
    pub student_id: String,
    #[serde(flatten)]
    pub components: ScoreComponents,
    #[serde(flatten)]
    pub flags: AttendanceFlags,
    #[serde(default)]
    pub expected_updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub data: Vec<AssessmentRecord>,
    pub teacher_name: Option<String>,
}

fn row_problems(index: usize, row: &AssessmentInput) -> Vec<Value> {
    let mut out = Vec::new();
    for field in ScoreField::ALL {
        let check = validate_score(field, row.components.get(field));
        if let Some(error) = check.error {
            out.push(json!({
                "index": index,
                "studentId": row.student_id,
                "field": field.as_str(),
                "error": error,
            }));
        }
    }
    if row.flags.is_absent && row.flags.is_exempt {
        out.push(json!({
            "index": index,
            "studentId": row.student_id,
            "field": "isExempt",
            "error": "A student cannot be both absent and exempt",
        }));
    }
    out
}

/// Checks every row before touching storage; any problem refuses the whole batch.
fn validate_batch(rows: &[AssessmentInput], active: &HashSet<String>) -> Result<(), CalcError> {
    if rows.len() > SAVE_MAX_ROWS {
        return Err(CalcError::bad_params(format!(
            "a save batch may hold at most {} rows",
            SAVE_MAX_ROWS
        )));
    }
    let mut problems: Vec<Value> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, row) in rows.iter().enumerate() {
        problems.extend(row_problems(i, row));
        if !active.contains(&row.student_id) {
            problems.push(json!({
                "index": i,
                "studentId": row.student_id,
                "error": "student is not active in this class-term",
            }));
        }
        if !seen.insert(row.student_id.as_str()) {
            problems.push(json!({
                "index": i,
                "studentId": row.student_id,
                "error": "student appears more than once in the batch",
            }));
        }
    }
    if problems.is_empty() {
        return Ok(());
    }
    Err(CalcError::Validation {
        message: format!("{} problem(s) in save batch", problems.len()),
        details: json!({ "rows": problems }),
    })
}

/// Persists a batch for one subject in one transaction and returns the stored rows in input
/// order. Absent/exempt rows drop their components. Published rows and stale
/// `expectedUpdatedAt` values fail the batch.
pub fn save_assessments(
    conn: &Connection,
    class_term: &ClassTermInfo,
    subject_id: &str,
    rows: &[AssessmentInput],
    grading: Option<&GradingSystem>,
    require_teacher: bool,
) -> Result<SaveOutcome, CalcError> {
    let offering = load_offering(conn, &class_term.id, subject_id)?;
    if require_teacher && offering.teacher_name.is_none() {
        return Err(CalcError::NoTeacherAssignment {
            class_term_id: class_term.id.clone(),
            subject_id: subject_id.to_string(),
        });
    }
    let active: HashSet<String> = load_students(conn, &class_term.id)?
        .into_iter()
        .filter(|s| s.is_active())
        .map(|s| s.id)
        .collect();
    validate_batch(rows, &active)?;

    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();
    let mut data: Vec<AssessmentRecord> = Vec::with_capacity(rows.len());
    for row in rows {
        let existing: Option<AssessmentRecord> = tx
            .query_row(
                &format!(
                    "{} WHERE student_id = ? AND subject_id = ? AND term_id = ?",
                    SELECT_ASSESSMENT
                ),
                (&row.student_id, subject_id, &class_term.term_id),
                map_assessment,
            )
            .optional()?;

        if let Some(id) = &row.id {
            if existing.as_ref().map(|e| &e.id) != Some(id) {
                return Err(CalcError::not_found("assessment", id.clone()));
            }
        }
        if let Some(e) = &existing {
            if e.is_published {
                return Err(CalcError::Published {
                    assessment_id: e.id.clone(),
                });
            }
            if let Some(expected) = &row.expected_updated_at {
                if *expected != e.updated_at {
                    return Err(CalcError::Conflict {
                        assessment_id: e.id.clone(),
                        expected_updated_at: expected.clone(),
                        actual_updated_at: e.updated_at.clone(),
                    });
                }
            }
        }

        let components = if row.flags.excludes_score() {
            ScoreComponents::default()
        } else {
            row.components
        };
        let scored = score_subject(&components, row.flags, grading);

        let id = match &existing {
            Some(e) => {
                tx.execute(
                    "UPDATE assessments
                     SET ca1 = ?, ca2 = ?, ca3 = ?, exam = ?, is_absent = ?, is_exempt = ?,
                         total_score = ?, grade = ?, remark = ?, updated_at = ?
                     WHERE id = ?",
                    (
                        components.ca1,
                        components.ca2,
                        components.ca3,
                        components.exam,
                        row.flags.is_absent as i64,
                        row.flags.is_exempt as i64,
                        scored.total_score,
                        &scored.grade,
                        &scored.remark,
                        &now,
                        &e.id,
                    ),
                )?;
                e.id.clone()
            }
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO assessments(
                        id, student_id, subject_id, term_id, class_term_id, ca1, ca2, ca3, exam,
                        is_absent, is_exempt, total_score, grade, remark, is_published,
                        created_at, updated_at)
                     VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
                    (
                        &id,
                        &row.student_id,
                        subject_id,
                        &class_term.term_id,
                        &class_term.id,
                        components.ca1,
                        components.ca2,
                        components.ca3,
                        components.exam,
                        row.flags.is_absent as i64,
                        row.flags.is_exempt as i64,
                        scored.total_score,
                        &scored.grade,
                        &scored.remark,
                        &now,
                        &now,
                    ),
                )?;
                id
            }
        };

        data.push(AssessmentRecord {
            id,
            student_id: row.student_id.clone(),
            subject_id: subject_id.to_string(),
            term_id: class_term.term_id.clone(),
            components,
            flags: row.flags,
            total_score: scored.total_score,
            grade: scored.grade,
            remark: scored.remark,
            is_published: false,
            updated_at: now.clone(),
        });
    }
    tx.commit()?;

    tracing::info!(
        class_term_id = %class_term.id,
        subject_id,
        rows = data.len(),
        "assessments saved"
    );
    Ok(SaveOutcome {
        data,
        teacher_name: offering.teacher_name,
    })
}

/// Freezes every unpublished row of the subject with values computed now; returns how many
/// rows were published.
pub fn publish_assessments(
    conn: &Connection,
    class_term: &ClassTermInfo,
    subject_id: &str,
    grading: &GradingSystem,
) -> Result<usize, CalcError> {
    load_offering(conn, &class_term.id, subject_id)?;
    let pending: Vec<AssessmentRecord> = load_assessments(conn, class_term, Some(subject_id))?
        .into_iter()
        .filter(|a| !a.is_published)
        .collect();

    let tx = conn.unchecked_transaction()?;
    let now = now_rfc3339();
    for a in &pending {
        let scored = score_subject(&a.components, a.flags, Some(grading));
        tx.execute(
            "UPDATE assessments
             SET total_score = ?, grade = ?, remark = ?, is_published = 1,
                 published_at = ?, updated_at = ?
             WHERE id = ?",
            (
                scored.total_score,
                &scored.grade,
                &scored.remark,
                &now,
                &now,
                &a.id,
            ),
        )?;
    }
    tx.commit()?;

    tracing::info!(
        class_term_id = %class_term.id,
        subject_id,
        published = pending.len(),
        "assessments published"
    );
    Ok(pending.len())
}
