use serde::{Deserialize, Serialize};

use super::grading::{resolve_grade, GradingSystem};

pub const CA_CEILING: f64 = 10.0;
pub const EXAM_CEILING: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreField {
    Ca1,
    Ca2,
    Ca3,
    Exam,
}

impl ScoreField {
    pub const ALL: [ScoreField; 4] = [ScoreField::Ca1, ScoreField::Ca2, ScoreField::Ca3, ScoreField::Exam];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ca1" => Some(Self::Ca1),
            "ca2" => Some(Self::Ca2),
            "ca3" => Some(Self::Ca3),
            "exam" => Some(Self::Exam),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ca1 => "ca1",
            Self::Ca2 => "ca2",
            Self::Ca3 => "ca3",
            Self::Exam => "exam",
        }
    }

    pub fn ceiling(self) -> f64 {
        match self {
            Self::Exam => EXAM_CEILING,
            _ => CA_CEILING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScoreValidation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    fn invalid(message: String) -> Self {
        Self {
            is_valid: false,
            error: Some(message),
        }
    }
}

/// Null means "not entered yet" and is always accepted.
pub fn validate_score(field: ScoreField, value: Option<f64>) -> ScoreValidation {
    let Some(v) = value else {
        return ScoreValidation::valid();
    };
    if !v.is_finite() || v < 0.0 {
        return ScoreValidation::invalid("Score must be a positive number".to_string());
    }
    let ceiling = field.ceiling();
    if v > ceiling {
        return ScoreValidation::invalid(format!("Score cannot exceed {}", ceiling));
    }
    ScoreValidation::valid()
}

/// Raw CA/exam inputs for one student-subject-term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub ca1: Option<f64>,
    pub ca2: Option<f64>,
    pub ca3: Option<f64>,
    pub exam: Option<f64>,
}

impl ScoreComponents {
    pub fn get(&self, field: ScoreField) -> Option<f64> {
        match field {
            ScoreField::Ca1 => self.ca1,
            ScoreField::Ca2 => self.ca2,
            ScoreField::Ca3 => self.ca3,
            ScoreField::Exam => self.exam,
        }
    }

    fn values(&self) -> [Option<f64>; 4] {
        [self.ca1, self.ca2, self.ca3, self.exam]
    }

    pub fn all_empty(&self) -> bool {
        self.values().iter().all(Option::is_none)
    }

    pub fn all_filled(&self) -> bool {
        self.values().iter().all(Option::is_some)
    }

    /// First failing field, if any.
    pub fn first_invalid(&self) -> Option<(ScoreField, String)> {
        ScoreField::ALL.iter().find_map(|f| {
            let check = validate_score(*f, self.get(*f));
            check.error.map(|e| (*f, e))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttendanceFlags {
    pub is_absent: bool,
    pub is_exempt: bool,
}

impl AttendanceFlags {
    pub fn excludes_score(&self) -> bool {
        self.is_absent || self.is_exempt
    }
}

/// Absent/exempt and not-started subjects carry no total. Once any component is entered,
/// the missing ones count as zero.
pub fn subject_total(components: &ScoreComponents, flags: AttendanceFlags) -> Option<f64> {
    if flags.excludes_score() || components.all_empty() {
        return None;
    }
    Some(components.values().iter().map(|v| v.unwrap_or(0.0)).sum())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub total_score: Option<f64>,
    pub grade: Option<String>,
    pub remark: Option<String>,
}

pub fn score_subject(
    components: &ScoreComponents,
    flags: AttendanceFlags,
    grading: Option<&GradingSystem>,
) -> SubjectScore {
    match subject_total(components, flags) {
        Some(total) => {
            let band = resolve_grade(total, grading);
            SubjectScore {
                total_score: Some(total),
                grade: Some(band.grade),
                remark: band.remark,
            }
        }
        None => SubjectScore {
            total_score: None,
            grade: None,
            remark: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Absent,
    Exempt,
    NotStarted,
    Complete,
    Partial,
}

pub fn classify_completion(components: &ScoreComponents, flags: AttendanceFlags) -> CompletionStatus {
    if flags.is_absent {
        CompletionStatus::Absent
    } else if flags.is_exempt {
        CompletionStatus::Exempt
    } else if components.all_empty() {
        CompletionStatus::NotStarted
    } else if components.all_filled() {
        CompletionStatus::Complete
    } else {
        CompletionStatus::Partial
    }
}
