use serde::{Deserialize, Serialize};

pub const DEFAULT_PASS_MARK: f64 = 40.0;

/// Built-in band used when a school has not configured a grading system.
const DEFAULT_BANDS: [(f64, &str); 5] = [(70.0, "A"), (60.0, "B"), (50.0, "C"), (45.0, "D"), (40.0, "E")];
const DEFAULT_FAIL_GRADE: &str = "F";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingLevel {
    pub grade: String,
    pub min_score: f64,
    pub max_score: f64,
    #[serde(default)]
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingSystem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub school_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_pass_mark")]
    pub pass_mark: f64,
    pub levels: Vec<GradingLevel>,
}

fn default_pass_mark() -> f64 {
    DEFAULT_PASS_MARK
}

impl GradingSystem {
    /// Levels are kept sorted by `min_score` descending; lookups rely on it.
    pub fn sort_levels(&mut self) {
        self.levels.sort_by(|a, b| b.min_score.total_cmp(&a.min_score));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub grade: String,
    pub remark: Option<String>,
}

fn default_band(total: f64) -> GradeBand {
    let grade = DEFAULT_BANDS
        .iter()
        .find(|(min, _)| total >= *min)
        .map(|(_, g)| *g)
        .unwrap_or(DEFAULT_FAIL_GRADE);
    GradeBand {
        grade: grade.to_string(),
        remark: None,
    }
}

/// First level with `min <= total <= max` wins; a total that lands in no level gets the
/// lowest level's grade. Gaps and overlaps in the configured levels are not checked here.
pub fn resolve_grade(total: f64, grading: Option<&GradingSystem>) -> GradeBand {
    let Some(system) = grading.filter(|g| !g.levels.is_empty()) else {
        return default_band(total);
    };
    if let Some(level) = system
        .levels
        .iter()
        .find(|l| l.min_score <= total && total <= l.max_score)
    {
        return GradeBand {
            grade: level.grade.clone(),
            remark: level.remark.clone(),
        };
    }
    // Non-empty checked above.
    let lowest = &system.levels[system.levels.len() - 1];
    GradeBand {
        grade: lowest.grade.clone(),
        remark: lowest.remark.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(grade: &str, min: f64, max: f64, remark: &str) -> GradingLevel {
        GradingLevel {
            grade: grade.to_string(),
            min_score: min,
            max_score: max,
            remark: Some(remark.to_string()),
        }
    }

    fn school_system() -> GradingSystem {
        let mut g = GradingSystem {
            id: "gs".into(),
            school_id: "s".into(),
            name: "WAEC".into(),
            pass_mark: 50.0,
            levels: vec![
                level("F9", 0.0, 44.0, "Fail"),
                level("A1", 75.0, 100.0, "Excellent"),
                level("C4", 45.0, 74.0, "Credit"),
            ],
        };
        g.sort_levels();
        g
    }

    #[test]
    fn default_band_boundaries() {
        let cases = [
            (70.0, "A"),
            (69.0, "B"),
            (60.0, "B"),
            (59.0, "C"),
            (50.0, "C"),
            (49.0, "D"),
            (45.0, "D"),
            (44.0, "E"),
            (40.0, "E"),
            (39.0, "F"),
        ];
        for (total, expected) in cases {
            assert_eq!(resolve_grade(total, None).grade, expected, "total {}", total);
        }
    }

    #[test]
    fn configured_levels_are_scanned_descending() {
        let g = school_system();
        assert_eq!(g.levels[0].grade, "A1");
        let band = resolve_grade(80.0, Some(&g));
        assert_eq!(band.grade, "A1");
        assert_eq!(band.remark.as_deref(), Some("Excellent"));
        assert_eq!(resolve_grade(45.0, Some(&g)).grade, "C4");
        assert_eq!(resolve_grade(0.0, Some(&g)).grade, "F9");
    }

    #[test]
    fn total_in_a_gap_falls_through_to_lowest_level() {
        let g = school_system();
        let band = resolve_grade(44.5, Some(&g));
        assert_eq!(band.grade, "F9");
        assert_eq!(band.remark.as_deref(), Some("Fail"));
    }

    #[test]
    fn empty_levels_use_default_band() {
        let g = GradingSystem {
            id: String::new(),
            school_id: String::new(),
            name: String::new(),
            pass_mark: 40.0,
            levels: vec![],
        };
        assert_eq!(resolve_grade(72.0, Some(&g)).grade, "A");
    }
}
