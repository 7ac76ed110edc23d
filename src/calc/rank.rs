use std::cmp::Ordering;

/// What the ranker needs to know about one student.
#[derive(Debug, Clone, Copy)]
pub struct RankKey<'a> {
    pub student_id: &'a str,
    pub sort_name: &'a str,
    pub average_score: f64,
    pub total_score: f64,
}

/// Average desc, then total desc, then name (case-insensitive, then exact), then student id.
/// Every surface that shows a position goes through this ordering.
pub fn compare_rank(a: &RankKey<'_>, b: &RankKey<'_>) -> Ordering {
    b.average_score
        .total_cmp(&a.average_score)
        .then_with(|| b.total_score.total_cmp(&a.total_score))
        .then_with(|| {
            a.sort_name
                .to_lowercase()
                .cmp(&b.sort_name.to_lowercase())
        })
        .then_with(|| a.sort_name.cmp(b.sort_name))
        .then_with(|| a.student_id.cmp(b.student_id))
}

/// Positions parallel to `keys`. Students averaging 0 are unranked and get 0; the rest are
/// numbered 1..n in `compare_rank` order.
pub fn assign_positions(keys: &[RankKey<'_>]) -> Vec<u32> {
    let mut ranked: Vec<usize> = (0..keys.len())
        .filter(|&i| keys[i].average_score > 0.0)
        .collect();
    ranked.sort_by(|&a, &b| compare_rank(&keys[a], &keys[b]));

    let mut positions = vec![0_u32; keys.len()];
    for (n, idx) in ranked.into_iter().enumerate() {
        positions[idx] = (n as u32) + 1;
    }
    positions
}

/// "1st", "2nd", "11th", "21st"...; unranked (0) renders as "-".
pub fn ordinal(position: u32) -> String {
    if position == 0 {
        return "-".to_string();
    }
    let suffix = match (position % 100, position % 10) {
        (11..=13, _) => "th",
        (_, 1) => "st",
        (_, 2) => "nd",
        (_, 3) => "rd",
        _ => "th",
    };
    format!("{}{}", position, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<'a>(id: &'a str, name: &'a str, avg: f64, total: f64) -> RankKey<'a> {
        RankKey {
            student_id: id,
            sort_name: name,
            average_score: avg,
            total_score: total,
        }
    }

    #[test]
    fn ordinals() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (21, "21st"),
            (22, "22nd"),
            (23, "23rd"),
            (101, "101st"),
            (111, "111th"),
            (0, "-"),
        ];
        for (p, expected) in cases {
            assert_eq!(ordinal(p), expected);
        }
    }

    #[test]
    fn unranked_students_get_zero() {
        let keys = [key("a", "Ade", 0.0, 0.0), key("b", "Bola", 55.0, 110.0)];
        assert_eq!(assign_positions(&keys), vec![0, 1]);
        assert!(assign_positions(&[]).is_empty());
    }

    #[test]
    fn ties_break_on_total_then_name() {
        let keys = [
            key("s3", "Okafor, Chidi", 70.0, 210.0),
            key("s2", "Bello, Amina", 90.0, 270.0),
            key("s1", "Adeyemi, Tunde", 90.0, 270.0),
        ];
        assert_eq!(assign_positions(&keys), vec![3, 2, 1]);

        let by_total = [key("x", "Zed", 90.0, 180.0), key("y", "Abe", 90.0, 90.0)];
        assert_eq!(assign_positions(&by_total), vec![1, 2]);
    }

    #[test]
    fn ranking_is_reproducible() {
        let keys = [
            key("s1", "Same", 90.0, 270.0),
            key("s2", "Same", 90.0, 270.0),
            key("s3", "Other", 70.0, 210.0),
        ];
        let first = assign_positions(&keys);
        for _ in 0..10 {
            assert_eq!(assign_positions(&keys), first);
        }
        assert_eq!(first, vec![1, 2, 3]);

        let reversed = [keys[2], keys[1], keys[0]];
        assert_eq!(assign_positions(&reversed), vec![3, 2, 1]);
    }
}
