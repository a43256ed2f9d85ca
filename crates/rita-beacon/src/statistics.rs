//! Quartile-based and scale-robust dispersion statistics shared by the timestamp and
//! data-size sub-scores.

/// Linear-interpolated percentile of an already-sorted slice (the "R-7"/numpy-default method).
///
/// `p` is in `[0, 100]`. Panics if `sorted` is empty; callers are expected to have already
/// checked the minimum-length invariants (`>= 3` non-zero deltas / data points).
fn percentile(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "percentile of empty slice");
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// `(Q1, Q2, Q3)` of an already-sorted slice.
pub fn quartiles(sorted: &[f64]) -> (f64, f64, f64) {
    (percentile(sorted, 25.0), percentile(sorted, 50.0), percentile(sorted, 75.0))
}

pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    percentile(sorted, 50.0)
}

/// Median Absolute Deviation: `median(|x_i - median|)`.
pub fn mad_of_sorted(sorted: &[f64], median: f64) -> f64 {
    let mut deviations: Vec<f64> = sorted.iter().map(|x| (x - median).abs()).collect();
    deviations.sort_by(|a, b| a.total_cmp(b));
    median_of_sorted(&deviations)
}

/// Bowley (quartile) skewness: `(Q3 + Q1 - 2*Q2) / (Q3 - Q1)`.
///
/// Returns `0.0` when the interquartile range is too narrow to be meaningful
/// (`Q3 - Q1 < 10`) or when the median coincides with either quartile — both treated as "no
/// detectable skew".
pub fn bowley_skew(q1: f64, q2: f64, q3: f64) -> f64 {
    if q3 - q1 < 10.0 || q2 == q1 || q2 == q3 {
        return 0.0;
    }
    (q3 + q1 - 2.0 * q2) / (q3 - q1)
}

/// `1 - |Bowley skew|` over an already-sorted slice.
pub fn skew_score(sorted: &[f64]) -> f64 {
    let (q1, q2, q3) = quartiles(sorted);
    1.0 - bowley_skew(q1, q2, q3).abs()
}

/// `(median - MAD) / median` when `median >= 1`; otherwise the indicator-specific `default`.
/// Negative results or `NaN` clamp to `0`.
pub fn mad_score(sorted: &[f64], default_when_median_below_one: f64) -> f64 {
    let median = median_of_sorted(sorted);
    if median < 1.0 {
        return default_when_median_below_one;
    }
    let mad = mad_of_sorted(sorted, median);
    let score = (median - mad) / median;
    if score.is_nan() || score < 0.0 {
        0.0
    } else {
        score
    }
}

/// The statistical score shared by the timestamp and data-size sub-scores: the average of
/// [`skew_score`] and [`mad_score`].
pub fn statistical_score(sorted: &[f64], mad_default: f64) -> f64 {
    (skew_score(sorted) + mad_score(sorted, mad_default)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bowley_skew_is_zero_for_constant_data() {
        // Three identical values have no spread, so skew is undetectable and the score saturates.
        let data = vec![5.0, 5.0, 5.0];
        assert_eq!(skew_score(&data), 1.0);
    }

    #[test]
    fn bowley_skew_zero_when_iqr_too_narrow() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        // Q3 - Q1 here is 2.0, well under the 10-unit floor.
        let (q1, q2, q3) = quartiles(&data);
        assert_eq!(bowley_skew(q1, q2, q3), 0.0);
    }

    #[test]
    fn mad_score_falls_back_below_median_one() {
        let data = vec![0.0, 0.0, 0.0];
        assert_eq!(mad_score(&data, 1.0), 1.0);
        assert_eq!(mad_score(&data, 0.0), 0.0);
    }

    #[test]
    fn mad_score_never_negative() {
        // Highly dispersed data can push (median - MAD) negative; must clamp to 0.
        let data = vec![1.0, 1.0, 1.0, 1.0, 100.0, 100.0, 100.0, 100.0];
        let score = mad_score(&data, 0.0);
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn constant_deltas_score_one() {
        // Perfectly periodic beaconing: every delta between consecutive timestamps is
        // identical, so both the skew and MAD components saturate.
        let deltas = vec![60.0; 20];
        let score = statistical_score(&deltas, 1.0);
        assert_eq!(score, 1.0);
    }
}
