use rita_types::ScoreThresholds;

fn interpolate(value: f64, lo: f64, hi: f64, score_lo: f64, score_hi: f64) -> f64 {
    if hi <= lo {
        // Degenerate (zero-width) bucket: nothing to interpolate across.
        return score_lo;
    }
    score_lo + (score_hi - score_lo) * (value - lo) / (hi - lo)
}

/// Uniform bucketed-severity mapping shared by every indicator.
///
/// `Base == 0` is a legal sentinel; `bucket(0)` then returns exactly `0.2` rather than `0` —
/// this falls out of the interpolation formula itself (`interpolate(0, 0, Low, 0.2, 0.4) ==
/// 0.2`) and is preserved as a contract, not special-cased.
pub fn bucket(value: f64, t: &ScoreThresholds) -> f64 {
    if value < t.base {
        return if t.base > 0.0 { 0.0 } else { 0.2 };
    }
    if value < t.low {
        return interpolate(value, t.base, t.low, 0.2, 0.4).clamp(0.2, 0.4);
    }
    if value < t.med {
        return interpolate(value, t.low, t.med, 0.4, 0.6).clamp(0.4, 0.6);
    }
    if value < t.high {
        return interpolate(value, t.med, t.high, 0.6, 0.8).clamp(0.6, 0.8);
    }
    0.8
}
