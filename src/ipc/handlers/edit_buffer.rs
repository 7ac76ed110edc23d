use crate::calc::{CalcError, ScoreField};
use crate::edit_buffer::{reduce, BufferStudent, EditAction, EditChange, SavedRef};
use crate::ipc::handlers::assessments::load_subject_sheet;
use crate::ipc::handlers::setup::require_teacher_assignment;
use crate::ipc::helpers::{db_conn, required_str, respond};
use crate::ipc::types::{AppState, EditSelection, Request};
use crate::store::assessments::{load_assessments, save_assessments, AssessmentInput};
use crate::store::grading::load_grading_system;
use crate::store::load_class_term;
use serde_json::{json, Value};

fn dispatch(state: &mut AppState, action: EditAction) {
    let current = std::mem::take(&mut state.edit_buffer);
    state.edit_buffer = reduce(current, action);
}

fn snapshot(state: &AppState) -> Value {
    json!({
        "selection": state.edit_selection.as_ref().map(|s| json!({
            "classTermId": s.class_term_id,
            "subjectId": s.subject_id,
        })),
        "buffer": state.edit_buffer,
        "canSave": state.edit_buffer.can_save(),
    })
}

fn open_selection(state: &AppState) -> Result<EditSelection, CalcError> {
    state
        .edit_selection
        .clone()
        .ok_or_else(|| CalcError::bad_params("no edit session is open"))
}

fn parse_change(req: &Request) -> Result<EditChange, CalcError> {
    let field = required_str(req, "field")?;
    let value = req.params.get("value").unwrap_or(&Value::Null);
    match field.as_str() {
        "isAbsent" | "isExempt" => {
            let flag = value
                .as_bool()
                .ok_or_else(|| CalcError::bad_params(format!("{} must be boolean", field)))?;
            Ok(if field == "isAbsent" {
                EditChange::Absent(flag)
            } else {
                EditChange::Exempt(flag)
            })
        }
        other => {
            let Some(score_field) = ScoreField::parse(other) else {
                return Err(CalcError::bad_params(
                    "field must be one of: ca1, ca2, ca3, exam, isAbsent, isExempt",
                ));
            };
            let score = match value {
                Value::Null => None,
                v => Some(
                    v.as_f64()
                        .ok_or_else(|| CalcError::bad_params("value must be a number or null"))?,
                ),
            };
            Ok(EditChange::Score(score_field, score))
        }
    }
}

fn edit_open(state: &mut AppState, req: &Request) -> Result<Value, CalcError> {
    let conn = db_conn(state)?;
    let class_term_id = required_str(req, "classTermId")?;
    let subject_id = required_str(req, "subjectId")?;
    let class_term = load_class_term(conn, &class_term_id)?;
    let sheet = load_subject_sheet(conn, &class_term, &subject_id)?;

    let selection = EditSelection {
        class_term_id,
        subject_id,
    };
    if state.edit_selection.as_ref() != Some(&selection) {
        dispatch(state, EditAction::ClearAll);
    }
    let students = sheet
        .students
        .into_iter()
        .filter(|s| s.is_active())
        .map(|s| BufferStudent {
            id: s.id,
            display_name: s.display_name,
        })
        .collect();
    dispatch(
        state,
        EditAction::Init {
            students,
            assessments: sheet.assessments,
            grading: sheet.grading,
        },
    );
    state.edit_selection = Some(selection);
    Ok(snapshot(state))
}

fn edit_update(state: &mut AppState, req: &Request) -> Result<Value, CalcError> {
    open_selection(state)?;
    let student_id = required_str(req, "studentId")?;
    if state.edit_buffer.entry(&student_id).is_none() {
        return Err(CalcError::not_found("buffer entry", student_id));
    }
    let change = parse_change(req)?;
    dispatch(state, EditAction::Update { student_id: student_id.clone(), change });
    Ok(json!({
        "entry": state.edit_buffer.entry(&student_id),
        "hasChanges": state.edit_buffer.has_changes,
        "errorCount": state.edit_buffer.error_count,
        "canSave": state.edit_buffer.can_save(),
    }))
}

fn edit_reset(state: &mut AppState) -> Result<Value, CalcError> {
    let selection = open_selection(state)?;
    let conn = db_conn(state)?;
    let class_term = load_class_term(conn, &selection.class_term_id)?;
    let assessments = load_assessments(conn, &class_term, Some(&selection.subject_id))?;
    dispatch(state, EditAction::Reset { assessments });
    Ok(snapshot(state))
}

/// Sends every dirty entry as one batch. Refused while any entry has an error.
fn edit_save(state: &mut AppState) -> Result<Value, CalcError> {
    let selection = open_selection(state)?;
    if !state.edit_buffer.can_save() {
        let errors: Vec<Value> = state
            .edit_buffer
            .entries
            .iter()
            .filter(|e| e.has_error)
            .map(|e| json!({ "studentId": e.student_id, "error": e.error_message }))
            .collect();
        return Err(CalcError::Validation {
            message: format!("{} entr(ies) have errors", errors.len()),
            details: json!({ "rows": errors }),
        });
    }

    let rows: Vec<AssessmentInput> = state
        .edit_buffer
        .dirty_entries()
        .into_iter()
        .map(|e| AssessmentInput {
            id: e.assessment_id.clone(),
            student_id: e.student_id.clone(),
            components: e.components(),
            flags: e.flags(),
            expected_updated_at: e.updated_at.clone(),
        })
        .collect();
    if rows.is_empty() {
        return Ok(json!({ "success": true, "saved": 0, "buffer": state.edit_buffer }));
    }

    let epoch = state.edit_buffer.epoch;
    let conn = db_conn(state)?;
    let class_term = load_class_term(conn, &selection.class_term_id)?;
    let grading = load_grading_system(conn, &class_term.school_id)?;
    let require_teacher = require_teacher_assignment(conn)?;
    let outcome = save_assessments(
        conn,
        &class_term,
        &selection.subject_id,
        &rows,
        grading.as_ref(),
        require_teacher,
    )?;

    let saved: Vec<SavedRef> = outcome
        .data
        .iter()
        .map(|a| SavedRef {
            student_id: a.student_id.clone(),
            assessment_id: a.id.clone(),
            updated_at: a.updated_at.clone(),
        })
        .collect();
    let count = saved.len();
    dispatch(state, EditAction::MarkSaved { epoch, saved });
    Ok(json!({
        "success": true,
        "saved": count,
        "teacherInfo": outcome.teacher_name.map(|name| json!({ "teacherName": name })),
        "buffer": state.edit_buffer,
    }))
}

fn edit_clear(state: &mut AppState) -> Result<Value, CalcError> {
    dispatch(state, EditAction::ClearAll);
    state.edit_selection = None;
    Ok(snapshot(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "editBuffer.open" => edit_open(state, req),
        "editBuffer.update" => edit_update(state, req),
        "editBuffer.reset" => edit_reset(state),
        "editBuffer.save" => edit_save(state),
        "editBuffer.clear" => edit_clear(state),
        "editBuffer.get" => Ok(snapshot(state)),
        _ => return None,
    };
    Some(respond(req, result))
}
