//! Summary statistics over the loaded rows.

use serde::Serialize;

use crate::data::OreRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_count: usize,
    /// Mean strength rounded half toward positive infinity.
    pub avg_strength: i64,
}

impl Stats {
    /// Returns `None` for an empty table.
    pub fn compute(rows: &[OreRow]) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }
        let sum: f64 = rows.iter().map(OreRow::strength).sum();
        let mean = sum / rows.len() as f64;
        Some(Self {
            total_count: rows.len(),
            avg_strength: round_half_up(mean),
        })
    }
}

/// Rounds to the nearest integer with halves going toward +inf, so
/// `2.5 -> 3` and `-2.5 -> -2`.
pub fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor as i64 + 1
    } else {
        floor as i64
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rows(strengths: &[serde_json::Value]) -> Vec<OreRow> {
        strengths
            .iter()
            .map(|s| OreRow::from_value(json!({ "Strength": s })))
            .collect()
    }

    #[test]
    fn test_empty_has_no_stats() {
        assert!(Stats::compute(&[]).is_none());
    }

    #[test]
    fn test_average_is_rounded_mean() {
        let stats = Stats::compute(&rows(&[json!(10), json!(20), json!(25)])).unwrap();
        assert_eq!(stats.total_count, 3);
        // 55 / 3 = 18.33
        assert_eq!(stats.avg_strength, 18);
    }

    #[test]
    fn test_missing_strength_counts_as_zero() {
        let data = vec![
            OreRow::from_value(json!({"Strength": 9})),
            OreRow::from_value(json!({"name": "Slag"})),
        ];
        let stats = Stats::compute(&data).unwrap();
        // 9 / 2 = 4.5 rounds up
        assert_eq!(stats.avg_strength, 5);
    }

    #[test]
    fn test_round_half_up_matches_math_round() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-2.51), -3);
        assert_eq!(round_half_up(0.0), 0);
    }
}
