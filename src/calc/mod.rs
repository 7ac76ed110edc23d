//! Scoring, grading, ranking and promotion eligibility.
//!
//! Everything here is pure: callers load rows, hand them in, and get derived values back.
//! Score entry previews, class results, report cards, dashboards and transitions all go
//! through the same functions so their numbers cannot drift apart.

pub mod aggregate;
pub mod error;
pub mod grading;
pub mod rank;
pub mod results;
pub mod score;
pub mod transition;

pub use error::CalcError;
pub use grading::{GradingLevel, GradingSystem};
pub use results::{AssessmentRecord, ClassResults, StudentInfo, SubjectInfo};
pub use score::{AttendanceFlags, ScoreComponents, ScoreField};
