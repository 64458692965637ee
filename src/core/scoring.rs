//! Line-clear scoring.
//!
//! Flat lines->points mapping, independent of level or drop distance.
//! Drop bonuses are an extension point and deliberately not awarded here.

use crate::types::LINE_SCORES;

/// Points for clearing `lines` rows in a single lock (0..=4).
pub fn line_clear_points(lines: usize) -> u32 {
    LINE_SCORES.get(lines).copied().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_table() {
        assert_eq!(line_clear_points(0), 0);
        assert_eq!(line_clear_points(1), 100);
        assert_eq!(line_clear_points(2), 300);
        assert_eq!(line_clear_points(3), 500);
        assert_eq!(line_clear_points(4), 800);
    }

    #[test]
    fn out_of_range_scores_zero() {
        assert_eq!(line_clear_points(5), 0);
    }
}
