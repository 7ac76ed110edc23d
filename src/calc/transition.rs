use serde::{Deserialize, Serialize};

use super::results::ClassResults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionType {
    Promotion,
    Transfer,
    Withdrawal,
}

impl TransitionType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PROMOTION" => Some(Self::Promotion),
            "TRANSFER" => Some(Self::Transfer),
            "WITHDRAWAL" => Some(Self::Withdrawal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Promotion => "PROMOTION",
            Self::Transfer => "TRANSFER",
            Self::Withdrawal => "WITHDRAWAL",
        }
    }

    /// Enrollment status left behind in the source class-term.
    pub fn source_status(self) -> &'static str {
        match self {
            Self::Promotion => "promoted",
            Self::Transfer => "transferred",
            Self::Withdrawal => "withdrawn",
        }
    }

    pub fn needs_destination(self) -> bool {
        !matches!(self, Self::Withdrawal)
    }
}

/// Average-only unless `min_pass_rate` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPolicy {
    pub min_pass_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTally {
    pub subjects_offered: usize,
    pub subjects_passed: usize,
}

impl SubjectTally {
    pub fn pass_rate(&self) -> f64 {
        if self.subjects_offered == 0 {
            return 0.0;
        }
        100.0 * (self.subjects_passed as f64) / (self.subjects_offered as f64)
    }
}

/// Only subjects with a total count as offered; a total at the pass mark is a pass.
pub fn tally_subjects<I>(subject_totals: I, pass_mark: f64) -> SubjectTally
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut tally = SubjectTally::default();
    for total in subject_totals.into_iter().flatten() {
        tally.subjects_offered += 1;
        if total >= pass_mark {
            tally.subjects_passed += 1;
        }
    }
    tally
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub pass_rate: f64,
    pub is_eligible: bool,
}

pub fn evaluate_eligibility(
    average_score: f64,
    tally: SubjectTally,
    pass_mark: f64,
    policy: TransitionPolicy,
) -> Eligibility {
    let pass_rate = tally.pass_rate();
    let meets_average = average_score >= pass_mark;
    let meets_rate = policy
        .min_pass_rate
        .map(|min| pass_rate >= min)
        .unwrap_or(true);
    Eligibility {
        pass_rate,
        is_eligible: meets_average && meets_rate,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCandidate {
    pub student_id: String,
    pub display_name: String,
    pub enrollment_status: String,
    pub average_score: f64,
    pub grade: Option<String>,
    pub position: u32,
    pub position_label: String,
    pub subjects_offered: usize,
    pub subjects_passed: usize,
    pub pass_rate: f64,
    pub is_eligible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateStatistics {
    pub total_students: usize,
    pub eligible_students: usize,
    pub ineligible_students: usize,
    pub pass_mark: f64,
}

/// Candidates in the same order as the compiled results.
pub fn transition_candidates(results: &ClassResults, policy: TransitionPolicy) -> Vec<TransitionCandidate> {
    results
        .rows
        .iter()
        .map(|row| {
            let tally = tally_subjects(row.subjects.values().map(|c| c.score), results.pass_mark);
            let e = evaluate_eligibility(row.average_score, tally, results.pass_mark, policy);
            TransitionCandidate {
                student_id: row.student_id.clone(),
                display_name: row.display_name.clone(),
                enrollment_status: row.enrollment_status.clone(),
                average_score: row.average_score,
                grade: row.grade.clone(),
                position: row.position,
                position_label: row.position_label.clone(),
                subjects_offered: tally.subjects_offered,
                subjects_passed: tally.subjects_passed,
                pass_rate: e.pass_rate,
                is_eligible: e.is_eligible,
            }
        })
        .collect()
}

pub fn candidate_statistics(candidates: &[TransitionCandidate], pass_mark: f64) -> CandidateStatistics {
    let eligible = candidates.iter().filter(|c| c.is_eligible).count();
    CandidateStatistics {
        total_students: candidates.len(),
        eligible_students: eligible,
        ineligible_students: candidates.len() - eligible,
        pass_mark,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_at_pass_mark_is_eligible() {
        let tally = SubjectTally {
            subjects_offered: 3,
            subjects_passed: 1,
        };
        let at = evaluate_eligibility(40.0, tally, 40.0, TransitionPolicy::default());
        assert!(at.is_eligible);
        let below = evaluate_eligibility(39.99, tally, 40.0, TransitionPolicy::default());
        assert!(!below.is_eligible);
    }

    #[test]
    fn pass_rate_is_informational_by_default() {
        let tally = tally_subjects([Some(90.0), Some(10.0), Some(20.0), None], 40.0);
        assert_eq!(tally.subjects_offered, 3);
        assert_eq!(tally.subjects_passed, 1);
        let e = evaluate_eligibility(40.0, tally, 40.0, TransitionPolicy::default());
        assert!(e.is_eligible);
        assert!((e.pass_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn opt_in_pass_rate_policy_gates() {
        let tally = tally_subjects([Some(90.0), Some(10.0)], 40.0);
        let policy = TransitionPolicy {
            min_pass_rate: Some(60.0),
        };
        assert!(!evaluate_eligibility(50.0, tally, 40.0, policy).is_eligible);
        let strong = tally_subjects([Some(90.0), Some(45.0)], 40.0);
        assert!(evaluate_eligibility(67.5, strong, 40.0, policy).is_eligible);
    }

    #[test]
    fn no_subjects_offered_has_zero_rate() {
        let tally = tally_subjects(std::iter::empty(), 40.0);
        assert_eq!(tally.pass_rate(), 0.0);
        assert!(!evaluate_eligibility(0.0, tally, 40.0, TransitionPolicy::default()).is_eligible);
    }

    #[test]
    fn candidates_follow_compiled_results() {
        use crate::calc::grading::GradingSystem;
        use crate::calc::results::{compile_class_results, AssessmentRecord, StudentInfo, SubjectInfo};
        use crate::calc::score::{AttendanceFlags, ScoreComponents};

        let grading = GradingSystem {
            id: "gs".into(),
            school_id: "sch".into(),
            name: "Default".into(),
            pass_mark: 40.0,
            levels: vec![],
        };
        let students: Vec<StudentInfo> = ["s1", "s2"]
            .iter()
            .map(|id| StudentInfo {
                id: id.to_string(),
                display_name: id.to_uppercase(),
                enrollment_status: "active".into(),
            })
            .collect();
        let subjects = vec![SubjectInfo {
            id: "math".into(),
            name: "Math".into(),
            code: None,
        }];
        let exam = |student: &str, v: f64| AssessmentRecord {
            id: format!("a-{}", student),
            student_id: student.into(),
            subject_id: "math".into(),
            term_id: "t1".into(),
            components: ScoreComponents {
                exam: Some(v),
                ..ScoreComponents::default()
            },
            flags: AttendanceFlags::default(),
            total_score: None,
            grade: None,
            remark: None,
            is_published: false,
            updated_at: String::new(),
        };
        let results = compile_class_results(
            &students,
            &subjects,
            &[exam("s1", 40.0), exam("s2", 39.99)],
            &grading,
        );
        let candidates = transition_candidates(&results, TransitionPolicy::default());
        assert_eq!(candidates[0].student_id, "s1");
        assert!(candidates[0].is_eligible);
        assert_eq!(candidates[0].subjects_passed, 1);
        assert!(!candidates[1].is_eligible);

        let stats = candidate_statistics(&candidates, results.pass_mark);
        assert_eq!(stats.eligible_students, 1);
        assert_eq!(stats.ineligible_students, 1);
    }

    #[test]
    fn transition_type_parse() {
        assert_eq!(TransitionType::parse("promotion"), Some(TransitionType::Promotion));
        assert_eq!(TransitionType::parse("WITHDRAWAL"), Some(TransitionType::Withdrawal));
        assert_eq!(TransitionType::parse("graduate"), None);
        assert!(!TransitionType::Withdrawal.needs_destination());
    }
}
