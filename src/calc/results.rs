use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

use super::aggregate::{aggregate_student, round_off_1_decimal};
use super::grading::GradingSystem;
use super::rank::{assign_positions, compare_rank, ordinal, RankKey};
use super::score::{
    classify_completion, score_subject, AttendanceFlags, CompletionStatus, ScoreComponents, SubjectScore,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: String,
    pub display_name: String,
    pub enrollment_status: String,
}

impl StudentInfo {
    /// Still sitting in the class-term; moved and withdrawn students keep their rows but no
    /// longer take new scores.
    pub fn is_active(&self) -> bool {
        self.enrollment_status == "active"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectInfo {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
}

/// A persisted assessment row as the engine sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub id: String,
    pub student_id: String,
    pub subject_id: String,
    pub term_id: String,
    #[serde(flatten)]
    pub components: ScoreComponents,
    #[serde(flatten)]
    pub flags: AttendanceFlags,
    pub total_score: Option<f64>,
    pub grade: Option<String>,
    pub remark: Option<String>,
    pub is_published: bool,
    pub updated_at: String,
}

impl AssessmentRecord {
    /// Published rows keep the values they were frozen with.
    pub fn subject_score(&self, grading: Option<&GradingSystem>) -> SubjectScore {
        if self.is_published {
            return SubjectScore {
                total_score: self.total_score,
                grade: self.grade.clone(),
                remark: self.remark.clone(),
            };
        }
        score_subject(&self.components, self.flags, grading)
    }

    pub fn completion(&self) -> CompletionStatus {
        classify_completion(&self.components, self.flags)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectCell {
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub remark: Option<String>,
    pub status: Option<CompletionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ScoreComponents>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResultRow {
    pub student_id: String,
    pub display_name: String,
    pub enrollment_status: String,
    pub subjects: BTreeMap<String, SubjectCell>,
    pub total_score: f64,
    pub average_score: f64,
    pub scored_subjects: usize,
    pub grade: Option<String>,
    pub position: u32,
    pub position_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResults {
    pub pass_mark: f64,
    pub subjects: Vec<SubjectInfo>,
    pub rows: Vec<StudentResultRow>,
    pub digest: String,
}

impl ClassResults {
    pub fn row(&self, student_id: &str) -> Option<&StudentResultRow> {
        self.rows.iter().find(|r| r.student_id == student_id)
    }

    pub fn ranked_count(&self) -> usize {
        self.rows.iter().filter(|r| r.position > 0).count()
    }
}

/// The one place subject cells, aggregates and positions are produced for a class-term.
/// Rows come back ranked first (by position), then unranked students by name.
pub fn compile_class_results(
    students: &[StudentInfo],
    subjects: &[SubjectInfo],
    assessments: &[AssessmentRecord],
    grading: &GradingSystem,
) -> ClassResults {
    let by_pair: HashMap<(&str, &str), &AssessmentRecord> = assessments
        .iter()
        .map(|a| ((a.student_id.as_str(), a.subject_id.as_str()), a))
        .collect();

    let mut rows: Vec<StudentResultRow> = Vec::with_capacity(students.len());
    for s in students {
        let mut cells: BTreeMap<String, SubjectCell> = BTreeMap::new();
        let mut totals: Vec<Option<f64>> = Vec::with_capacity(subjects.len());
        for subj in subjects {
            let cell = match by_pair.get(&(s.id.as_str(), subj.id.as_str())) {
                Some(a) => {
                    let scored = a.subject_score(Some(grading));
                    SubjectCell {
                        score: scored.total_score,
                        grade: scored.grade,
                        remark: scored.remark,
                        status: Some(a.completion()),
                        components: Some(a.components),
                    }
                }
                None => SubjectCell {
                    score: None,
                    grade: None,
                    remark: None,
                    status: None,
                    components: None,
                },
            };
            totals.push(cell.score);
            cells.insert(subj.id.clone(), cell);
        }

        let agg = aggregate_student(totals, Some(grading));
        rows.push(StudentResultRow {
            student_id: s.id.clone(),
            display_name: s.display_name.clone(),
            enrollment_status: s.enrollment_status.clone(),
            subjects: cells,
            total_score: agg.total_score,
            average_score: agg.average_score,
            scored_subjects: agg.scored_subjects,
            grade: agg.grade,
            position: 0,
            position_label: String::new(),
        });
    }

    let positions = {
        let keys: Vec<RankKey<'_>> = rows.iter().map(rank_key).collect();
        assign_positions(&keys)
    };
    for (row, position) in rows.iter_mut().zip(positions) {
        row.position = position;
        row.position_label = ordinal(position);
    }

    rows.sort_by(|a, b| match (a.position, b.position) {
        (0, 0) => compare_rank(&rank_key(a), &rank_key(b)),
        (0, _) => std::cmp::Ordering::Greater,
        (_, 0) => std::cmp::Ordering::Less,
        (pa, pb) => pa.cmp(&pb),
    });

    let digest = results_digest(&rows);
    ClassResults {
        pass_mark: grading.pass_mark,
        subjects: subjects.to_vec(),
        rows,
        digest,
    }
}

fn rank_key(row: &StudentResultRow) -> RankKey<'_> {
    RankKey {
        student_id: &row.student_id,
        sort_name: &row.display_name,
        average_score: row.average_score,
        total_score: row.total_score,
    }
}

/// SHA-256 over the canonical ranking, so callers can check two surfaces saw the same result.
pub fn results_digest(rows: &[StudentResultRow]) -> String {
    let mut hasher = Sha256::new();
    for r in rows {
        hasher.update(
            format!(
                "{}|{}|{:.6}|{:.6}|{}\n",
                r.student_id,
                r.position,
                r.average_score,
                r.total_score,
                r.grade.as_deref().unwrap_or("")
            )
            .as_bytes(),
        );
        for (subject_id, cell) in &r.subjects {
            let score = cell.score.map(|v| format!("{:.6}", v)).unwrap_or_default();
            hasher.update(format!("  {}={}\n", subject_id, score).as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStudent {
    pub student_id: String,
    pub display_name: String,
    pub average_score: f64,
    pub position: u32,
    pub position_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDashboard {
    pub total_students: usize,
    pub ranked_students: usize,
    pub class_average: f64,
    pub highest_average: f64,
    pub lowest_average: f64,
    pub passing_students: usize,
    pub grade_distribution: BTreeMap<String, usize>,
    pub top_students: Vec<TopStudent>,
    pub digest: String,
}

/// Averages over ranked students only; an empty or fully unranked class yields zeros.
pub fn dashboard(results: &ClassResults, top_count: usize) -> ClassDashboard {
    let ranked: Vec<&StudentResultRow> = results.rows.iter().filter(|r| r.position > 0).collect();
    let (class_average, highest, lowest) = if ranked.is_empty() {
        (0.0, 0.0, 0.0)
    } else {
        let sum: f64 = ranked.iter().map(|r| r.average_score).sum();
        let highest = ranked
            .iter()
            .map(|r| r.average_score)
            .fold(f64::MIN, f64::max);
        let lowest = ranked
            .iter()
            .map(|r| r.average_score)
            .fold(f64::MAX, f64::min);
        (sum / (ranked.len() as f64), highest, lowest)
    };

    let mut grade_distribution: BTreeMap<String, usize> = BTreeMap::new();
    for r in &ranked {
        if let Some(g) = &r.grade {
            *grade_distribution.entry(g.clone()).or_insert(0) += 1;
        }
    }

    ClassDashboard {
        total_students: results.rows.len(),
        ranked_students: ranked.len(),
        class_average: round_off_1_decimal(class_average),
        highest_average: round_off_1_decimal(highest),
        lowest_average: round_off_1_decimal(lowest),
        passing_students: ranked
            .iter()
            .filter(|r| r.average_score >= results.pass_mark)
            .count(),
        grade_distribution,
        top_students: ranked
            .iter()
            .take(top_count)
            .map(|r| TopStudent {
                student_id: r.student_id.clone(),
                display_name: r.display_name.clone(),
                average_score: r.average_score,
                position: r.position,
                position_label: r.position_label.clone(),
            })
            .collect(),
        digest: results.digest.clone(),
    }
}
