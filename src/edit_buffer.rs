//! Optimistic score-entry buffer.
//!
//! One entry per student for the selected class-term/subject. Edits are previewed with the
//! same total/grade formulas the results use, and only dirty entries go back to storage.
//! `reduce` takes the buffer by value and returns the next one; nothing else mutates it.

use serde::Serialize;
use std::collections::HashMap;

use crate::calc::results::AssessmentRecord;
use crate::calc::score::{score_subject, AttendanceFlags, ScoreComponents, ScoreField};
use crate::calc::GradingSystem;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStudent {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEntry {
    pub student_id: String,
    pub display_name: String,
    pub assessment_id: Option<String>,
    pub updated_at: Option<String>,
    pub ca1: f64,
    pub ca2: f64,
    pub ca3: f64,
    pub exam: f64,
    pub is_absent: bool,
    pub is_exempt: bool,
    pub total_score: Option<f64>,
    pub grade: Option<String>,
    pub is_dirty: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

impl EditEntry {
    fn seeded(student: &BufferStudent, persisted: Option<&AssessmentRecord>, grading: Option<&GradingSystem>) -> Self {
        let (components, flags) = persisted
            .map(|a| (a.components, a.flags))
            .unwrap_or_default();
        let scored = persisted.map(|a| a.subject_score(grading));
        Self {
            student_id: student.id.clone(),
            display_name: student.display_name.clone(),
            assessment_id: persisted.map(|a| a.id.clone()),
            updated_at: persisted.map(|a| a.updated_at.clone()),
            ca1: components.ca1.unwrap_or(0.0),
            ca2: components.ca2.unwrap_or(0.0),
            ca3: components.ca3.unwrap_or(0.0),
            exam: components.exam.unwrap_or(0.0),
            is_absent: flags.is_absent,
            is_exempt: flags.is_exempt,
            total_score: scored.as_ref().and_then(|s| s.total_score),
            grade: scored.and_then(|s| s.grade),
            is_dirty: false,
            has_error: false,
            error_message: None,
        }
    }

    pub fn components(&self) -> ScoreComponents {
        ScoreComponents {
            ca1: Some(self.ca1),
            ca2: Some(self.ca2),
            ca3: Some(self.ca3),
            exam: Some(self.exam),
        }
    }

    pub fn flags(&self) -> AttendanceFlags {
        AttendanceFlags {
            is_absent: self.is_absent,
            is_exempt: self.is_exempt,
        }
    }

    fn set_score(&mut self, field: ScoreField, value: f64) {
        match field {
            ScoreField::Ca1 => self.ca1 = value,
            ScoreField::Ca2 => self.ca2 = value,
            ScoreField::Ca3 => self.ca3 = value,
            ScoreField::Exam => self.exam = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditChange {
    /// Cleared inputs are stored as 0 to keep the entry controlled.
    Score(ScoreField, Option<f64>),
    Absent(bool),
    Exempt(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedRef {
    pub student_id: String,
    pub assessment_id: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub enum EditAction {
    Init {
        students: Vec<BufferStudent>,
        assessments: Vec<AssessmentRecord>,
        grading: Option<GradingSystem>,
    },
    Update {
        student_id: String,
        change: EditChange,
    },
    Reset {
        assessments: Vec<AssessmentRecord>,
    },
    /// Dropped unless `epoch` matches the buffer's current epoch.
    MarkSaved { epoch: u64, saved: Vec<SavedRef> },
    ClearAll,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditBuffer {
    pub entries: Vec<EditEntry>,
    pub has_changes: bool,
    pub error_count: usize,
    pub epoch: u64,
    #[serde(skip)]
    index: HashMap<String, usize>,
    #[serde(skip)]
    grading: Option<GradingSystem>,
}

impl EditBuffer {
    pub fn entry(&self, student_id: &str) -> Option<&EditEntry> {
        self.index.get(student_id).map(|&i| &self.entries[i])
    }

    pub fn can_save(&self) -> bool {
        self.error_count == 0
    }

    /// Dirty entries in buffer order; this is the save batch.
    pub fn dirty_entries(&self) -> Vec<&EditEntry> {
        self.entries.iter().filter(|e| e.is_dirty).collect()
    }

    fn recount(&mut self) {
        self.has_changes = self.entries.iter().any(|e| e.is_dirty);
        self.error_count = self.entries.iter().filter(|e| e.has_error).count();
    }
}

fn persisted_by_student(assessments: &[AssessmentRecord]) -> HashMap<&str, &AssessmentRecord> {
    assessments
        .iter()
        .map(|a| (a.student_id.as_str(), a))
        .collect()
}

pub fn reduce(mut state: EditBuffer, action: EditAction) -> EditBuffer {
    match action {
        EditAction::Init {
            students,
            assessments,
            grading,
        } => {
            let persisted = persisted_by_student(&assessments);
            let entries: Vec<EditEntry> = students
                .iter()
                .map(|s| EditEntry::seeded(s, persisted.get(s.id.as_str()).copied(), grading.as_ref()))
                .collect();
            let index = entries
                .iter()
                .enumerate()
                .map(|(i, e)| (e.student_id.clone(), i))
                .collect();
            EditBuffer {
                entries,
                has_changes: false,
                error_count: 0,
                epoch: state.epoch + 1,
                index,
                grading,
            }
        }
        EditAction::Update { student_id, change } => {
            let Some(&i) = state.index.get(&student_id) else {
                return state;
            };
            let grading = state.grading.clone();
            let entry = &mut state.entries[i];
            match change {
                EditChange::Score(field, value) => entry.set_score(field, value.unwrap_or(0.0)),
                EditChange::Absent(v) => {
                    entry.is_absent = v;
                    if v {
                        entry.is_exempt = false;
                    }
                }
                EditChange::Exempt(v) => {
                    entry.is_exempt = v;
                    if v {
                        entry.is_absent = false;
                    }
                }
            }
            entry.is_dirty = true;

            match entry.components().first_invalid() {
                Some((_, message)) => {
                    entry.has_error = true;
                    entry.error_message = Some(message);
                }
                None => {
                    entry.has_error = false;
                    entry.error_message = None;
                    let scored = score_subject(&entry.components(), entry.flags(), grading.as_ref());
                    entry.total_score = scored.total_score;
                    entry.grade = scored.grade;
                }
            }
            state.recount();
            state
        }
        EditAction::Reset { assessments } => {
            let persisted = persisted_by_student(&assessments);
            let grading = state.grading.clone();
            for entry in state.entries.iter_mut() {
                let student = BufferStudent {
                    id: entry.student_id.clone(),
                    display_name: entry.display_name.clone(),
                };
                *entry = EditEntry::seeded(
                    &student,
                    persisted.get(student.id.as_str()).copied(),
                    grading.as_ref(),
                );
            }
            state.recount();
            state
        }
        EditAction::MarkSaved { epoch, saved } => {
            if epoch != state.epoch {
                tracing::debug!(epoch, current = state.epoch, "dropping stale save acknowledgement");
                return state;
            }
            for s in saved {
                let Some(&i) = state.index.get(&s.student_id) else {
                    continue;
                };
                let entry = &mut state.entries[i];
                entry.is_dirty = false;
                entry.assessment_id = Some(s.assessment_id);
                entry.updated_at = Some(s.updated_at);
            }
            state.recount();
            state
        }
        EditAction::ClearAll => EditBuffer {
            epoch: state.epoch + 1,
            ..EditBuffer::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students() -> Vec<BufferStudent> {
        ["s1", "s2", "s3"]
            .iter()
            .map(|id| BufferStudent {
                id: id.to_string(),
                display_name: id.to_uppercase(),
            })
            .collect()
    }

    fn persisted() -> Vec<AssessmentRecord> {
        vec![AssessmentRecord {
            id: "a1".into(),
            student_id: "s1".into(),
            subject_id: "math".into(),
            term_id: "t1".into(),
            components: ScoreComponents {
                ca1: Some(8.0),
                ca2: Some(7.0),
                ca3: None,
                exam: Some(50.0),
            },
            flags: AttendanceFlags::default(),
            total_score: Some(65.0),
            grade: Some("B".into()),
            remark: None,
            is_published: false,
            updated_at: "2026-01-01T00:00:00+00:00".into(),
        }]
    }

    fn init() -> EditBuffer {
        reduce(
            EditBuffer::default(),
            EditAction::Init {
                students: students(),
                assessments: persisted(),
                grading: None,
            },
        )
    }

    fn update(state: EditBuffer, student: &str, change: EditChange) -> EditBuffer {
        reduce(
            state,
            EditAction::Update {
                student_id: student.into(),
                change,
            },
        )
    }

    #[test]
    fn init_seeds_controlled_values() {
        let b = init();
        assert_eq!(b.entries.len(), 3);
        assert_eq!(b.epoch, 1);
        let s1 = b.entry("s1").expect("s1");
        assert_eq!(s1.ca3, 0.0);
        assert_eq!(s1.total_score, Some(65.0));
        assert_eq!(s1.assessment_id.as_deref(), Some("a1"));
        let s2 = b.entry("s2").expect("s2");
        assert_eq!((s2.ca1, s2.exam), (0.0, 0.0));
        assert_eq!(s2.total_score, None);
        assert!(!b.has_changes);
    }

    #[test]
    fn update_recomputes_and_marks_dirty() {
        let b = update(init(), "s2", EditChange::Score(ScoreField::Exam, Some(55.0)));
        let s2 = b.entry("s2").expect("s2");
        assert_eq!(s2.total_score, Some(55.0));
        assert_eq!(s2.grade.as_deref(), Some("C"));
        assert!(s2.is_dirty);
        assert!(b.has_changes);
        assert_eq!(b.dirty_entries().len(), 1);
    }

    #[test]
    fn invalid_value_flags_error_and_keeps_preview() {
        let b = update(init(), "s1", EditChange::Score(ScoreField::Ca1, Some(11.0)));
        let s1 = b.entry("s1").expect("s1");
        assert!(s1.has_error);
        assert!(s1.is_dirty);
        assert_eq!(s1.error_message.as_deref(), Some("Score cannot exceed 10"));
        assert_eq!(s1.total_score, Some(65.0));
        assert_eq!(b.error_count, 1);
        assert!(!b.can_save());

        let fixed = update(b, "s1", EditChange::Score(ScoreField::Ca1, Some(10.0)));
        assert_eq!(fixed.error_count, 0);
        assert_eq!(fixed.entry("s1").and_then(|e| e.total_score), Some(67.0));
    }

    #[test]
    fn same_update_twice_is_idempotent() {
        let once = update(init(), "s2", EditChange::Score(ScoreField::Ca2, Some(6.0)));
        let twice = update(once.clone(), "s2", EditChange::Score(ScoreField::Ca2, Some(6.0)));
        assert_eq!(once.entry("s2"), twice.entry("s2"));
        assert_eq!(once.has_changes, twice.has_changes);
    }

    #[test]
    fn absence_clears_preview_and_exemption() {
        let b = update(init(), "s1", EditChange::Exempt(true));
        let b = update(b, "s1", EditChange::Absent(true));
        let s1 = b.entry("s1").expect("s1");
        assert!(s1.is_absent);
        assert!(!s1.is_exempt);
        assert_eq!(s1.total_score, None);
        assert_eq!(s1.grade, None);
    }

    #[test]
    fn reset_restores_persisted_values() {
        let pristine = init();
        let mut b = pristine.clone();
        b = update(b, "s1", EditChange::Score(ScoreField::Exam, Some(99.0)));
        b = update(b, "s2", EditChange::Absent(true));
        b = update(b, "s3", EditChange::Score(ScoreField::Ca1, Some(4.0)));
        assert!(b.has_changes);
        assert_eq!(b.error_count, 1);

        let reset = reduce(b, EditAction::Reset { assessments: persisted() });
        assert_eq!(reset.entries, pristine.entries);
        assert!(!reset.has_changes);
        assert_eq!(reset.error_count, 0);
    }

    #[test]
    fn mark_saved_applies_only_to_current_epoch() {
        let b = update(init(), "s2", EditChange::Score(ScoreField::Ca1, Some(5.0)));
        let stale = reduce(
            b.clone(),
            EditAction::MarkSaved {
                epoch: b.epoch + 7,
                saved: vec![SavedRef {
                    student_id: "s2".into(),
                    assessment_id: "new".into(),
                    updated_at: "x".into(),
                }],
            },
        );
        assert!(stale.has_changes);

        let saved = reduce(
            b.clone(),
            EditAction::MarkSaved {
                epoch: b.epoch,
                saved: vec![SavedRef {
                    student_id: "s2".into(),
                    assessment_id: "new".into(),
                    updated_at: "x".into(),
                }],
            },
        );
        let s2 = saved.entry("s2").expect("s2");
        assert!(!s2.is_dirty);
        assert_eq!(s2.assessment_id.as_deref(), Some("new"));
        assert_eq!(s2.ca1, 5.0);
        assert!(!saved.has_changes);
    }

    #[test]
    fn clear_all_empties_and_bumps_epoch() {
        let b = update(init(), "s2", EditChange::Score(ScoreField::Ca1, Some(5.0)));
        let cleared = reduce(b, EditAction::ClearAll);
        assert!(cleared.entries.is_empty());
        assert!(!cleared.has_changes);
        assert_eq!(cleared.epoch, 2);
        let ignored = update(cleared, "s2", EditChange::Absent(true));
        assert!(ignored.entries.is_empty());
    }
}
