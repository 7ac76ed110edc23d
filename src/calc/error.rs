use serde_json::{json, Value};
use thiserror::Error;

/// Failures surfaced to callers as `{code, message, details}`. Per-cell score validation is not
/// in here: it is returned as data and only becomes `Validation` when a whole batch is refused.
#[derive(Debug, Error)]
pub enum CalcError {
    #[error("{0}")]
    BadParams(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("{what} not found")]
    NotFound { what: &'static str, id: String },

    #[error("no grading system configured for school {school_id}")]
    NoGradingSystem { school_id: String },

    #[error("no teacher assigned to this subject for the class-term")]
    NoTeacherAssignment {
        class_term_id: String,
        subject_id: String,
    },

    #[error("destination class-term is required and must exist")]
    NoDestination { to_class_term_id: Option<String> },

    #[error("assessment {assessment_id} is published and cannot be modified")]
    Published { assessment_id: String },

    #[error("assessment {assessment_id} was changed since it was loaded")]
    Conflict {
        assessment_id: String,
        expected_updated_at: String,
        actual_updated_at: String,
    },

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("stored settings are malformed: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("stored {section} setup is malformed: {message}")]
    SetupInvalid {
        section: &'static str,
        message: String,
    },
}

impl CalcError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadParams(_) => "bad_params",
            Self::NoWorkspace => "no_workspace",
            Self::NotFound { .. } => "not_found",
            Self::NoGradingSystem { .. } => "no_grading_system",
            Self::NoTeacherAssignment { .. } => "no_teacher_assignment",
            Self::NoDestination { .. } => "no_destination",
            Self::Published { .. } => "assessment_published",
            Self::Conflict { .. } => "conflict",
            Self::Validation { .. } => "validation_failed",
            Self::Db(_) => "db_query_failed",
            Self::Settings(_) | Self::SetupInvalid { .. } => "settings_invalid",
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            Self::NotFound { what, id } => Some(json!({ "entity": what, "id": id })),
            Self::NoGradingSystem { school_id } => Some(json!({ "schoolId": school_id })),
            Self::NoTeacherAssignment {
                class_term_id,
                subject_id,
            } => Some(json!({ "classTermId": class_term_id, "subjectId": subject_id })),
            Self::NoDestination { to_class_term_id } => {
                Some(json!({ "toClassTermId": to_class_term_id }))
            }
            Self::Published { assessment_id } => Some(json!({ "assessmentId": assessment_id })),
            Self::Conflict {
                assessment_id,
                expected_updated_at,
                actual_updated_at,
            } => Some(json!({
                "assessmentId": assessment_id,
                "expectedUpdatedAt": expected_updated_at,
                "actualUpdatedAt": actual_updated_at,
            })),
            Self::Validation { details, .. } => Some(details.clone()),
            Self::SetupInvalid { section, .. } => Some(json!({ "section": section })),
            _ => None,
        }
    }
}
