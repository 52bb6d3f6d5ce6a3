//! Numeric helpers shared by projection, resizing, and capping.

use std::cmp::Ordering;

/// Returns the index of the smallest value, preferring the lowest index on ties.
pub(crate) fn argmin_first(values: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values.into_iter().enumerate() {
        match best {
            Some((_, current)) if value >= current => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Rounds half-way cases to the nearest even integer, like `numpy.round`.
pub(crate) fn round_half_even(value: f64) -> f64 {
    value.round_ties_even()
}

/// Total order on scores: descending, with NaN after every number.
pub(crate) fn score_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (nan_a, nan_b) => nan_a.cmp(&nan_b),
    }
}

/// Returns the `k`-th largest score (1-based), or `None` when `k` is out of range.
///
/// NaN scores rank below every number.
pub(crate) fn kth_largest(scores: &[f32], k: usize) -> Option<f32> {
    if k == 0 || k > scores.len() {
        return None;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|&a, &b| score_desc(a, b));
    Some(sorted[k - 1])
}

#[cfg(test)]
mod tests {
    use super::{argmin_first, kth_largest, round_half_even, score_desc};

    #[test]
    fn argmin_prefers_first_on_ties() {
        assert_eq!(argmin_first([3.0, 1.0, 1.0, 2.0]), Some(1));
        assert_eq!(argmin_first(std::iter::empty()), None);
    }

    #[test]
    fn round_half_even_matches_bankers_rounding() {
        assert_eq!(round_half_even(0.5), 0.0);
        assert_eq!(round_half_even(1.5), 2.0);
        assert_eq!(round_half_even(2.5), 2.0);
        assert_eq!(round_half_even(-0.5), -0.0);
        assert_eq!(round_half_even(2.6), 3.0);
    }

    #[test]
    fn kth_largest_counts_duplicates() {
        let scores = [0.2, 0.9, 0.5, 0.9];
        assert_eq!(kth_largest(&scores, 1), Some(0.9));
        assert_eq!(kth_largest(&scores, 2), Some(0.9));
        assert_eq!(kth_largest(&scores, 3), Some(0.5));
        assert_eq!(kth_largest(&scores, 5), None);
        assert_eq!(kth_largest(&scores, 0), None);
    }

    #[test]
    fn nan_scores_rank_last() {
        let scores = [f32::NAN, 0.3, f32::NAN, 0.7];
        assert_eq!(kth_largest(&scores, 1), Some(0.7));
        assert_eq!(kth_largest(&scores, 2), Some(0.3));
        assert!(kth_largest(&scores, 3).unwrap().is_nan());
        assert_eq!(score_desc(0.1, f32::NAN), std::cmp::Ordering::Less);
        assert_eq!(score_desc(-0.0, 0.0), std::cmp::Ordering::Equal);
        assert_eq!(score_desc(f32::NAN, f32::NAN), std::cmp::Ordering::Equal);
    }
}
