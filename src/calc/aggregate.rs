use serde::Serialize;

use super::grading::{resolve_grade, GradingSystem};
use super::score::CompletionStatus;

/// One decimal, halves rounded up: `floor(10x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAggregate {
    pub total_score: f64,
    pub average_score: f64,
    pub scored_subjects: usize,
    pub grade: Option<String>,
}

/// Subjects without a total (not started, absent, exempt) are excluded from both the sum and
/// the divisor. A student with nothing scored averages 0 and carries no grade.
pub fn aggregate_student<I>(subject_totals: I, grading: Option<&GradingSystem>) -> StudentAggregate
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut total = 0.0_f64;
    let mut count = 0_usize;
    for t in subject_totals.into_iter().flatten() {
        total += t;
        count += 1;
    }
    if count == 0 {
        return StudentAggregate {
            total_score: 0.0,
            average_score: 0.0,
            scored_subjects: 0,
            grade: None,
        };
    }
    let average = total / (count as f64);
    StudentAggregate {
        total_score: total,
        average_score: average,
        scored_subjects: count,
        grade: Some(resolve_grade(average, grading).grade),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStatistics {
    pub total_students: usize,
    pub complete_assessments: usize,
    pub partial_assessments: usize,
    pub absent_students: usize,
    pub exempt_students: usize,
    pub students_without_data: usize,
    pub completion_percentage: f64,
}

/// One entry per enrolled student; `None` means no assessment row exists yet.
pub fn completion_statistics<I>(statuses: I) -> CompletionStatistics
where
    I: IntoIterator<Item = Option<CompletionStatus>>,
{
    let mut stats = CompletionStatistics::default();
    for status in statuses {
        stats.total_students += 1;
        match status {
            Some(CompletionStatus::Complete) => stats.complete_assessments += 1,
            Some(CompletionStatus::Partial) => stats.partial_assessments += 1,
            Some(CompletionStatus::Absent) => stats.absent_students += 1,
            Some(CompletionStatus::Exempt) => stats.exempt_students += 1,
            Some(CompletionStatus::NotStarted) | None => stats.students_without_data += 1,
        }
    }
    if stats.total_students > 0 {
        stats.completion_percentage = round_off_1_decimal(
            100.0 * (stats.complete_assessments as f64) / (stats.total_students as f64),
        );
    }
    stats
}
