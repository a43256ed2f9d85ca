//! Histogram construction and the coefficient-of-variation / bimodal-fit sub-scores, plus the
//! duration sub-score that builds on top of them.

use std::collections::HashMap;

use rita_types::{BeaconConfig, Error, Result};

pub const NUM_BINS: usize = 24;

/// A fixed-width partition of `[dataset_min, dataset_max]` into [`NUM_BINS`] bins, with each
/// observed timestamp assigned to its bin (last bin inclusive on the right).
#[derive(Debug)]
pub struct Histogram {
    pub counts: Vec<u64>,
    pub dataset_min: u32,
    pub dataset_max: u32,
    pub bin_width: f64,
    pub total_bars: usize,
    pub longest_run: usize,
    first_active_bin: Option<usize>,
    last_active_bin: Option<usize>,
}

impl Histogram {
    pub fn build(ts_list: &[u32], dataset_min: u32, dataset_max: u32) -> Result<Self> {
        if dataset_min >= dataset_max {
            return Err(Error::InvalidDatasetTimeRange {
                min_ts: dataset_min,
                max_ts: dataset_max,
            });
        }
        let bin_width = (dataset_max - dataset_min) as f64 / NUM_BINS as f64;
        let mut counts = vec![0u64; NUM_BINS];
        for &ts in ts_list {
            let bin = bin_index(ts, dataset_min, bin_width);
            counts[bin] += 1;
        }

        let total_bars = counts.iter().filter(|&&c| c > 0).count();
        let longest_run = longest_circular_run(&counts);
        let first_active_bin = counts.iter().position(|&c| c > 0);
        let last_active_bin = counts.iter().rposition(|&c| c > 0);

        Ok(Self {
            counts,
            dataset_min,
            dataset_max,
            bin_width,
            total_bars,
            longest_run,
            first_active_bin,
            last_active_bin,
        })
    }

    /// Time-domain bounds of the occupied bin range, used by the coverage sub-score.
    fn active_bounds(&self) -> Option<(f64, f64)> {
        let first = self.first_active_bin?;
        let last = self.last_active_bin?;
        let lo = self.dataset_min as f64 + self.bin_width * first as f64;
        let hi = self.dataset_min as f64 + self.bin_width * (last + 1) as f64;
        Some((lo, hi))
    }

    /// `clamp(1 - CV, 0, 1)` over per-bin counts.
    pub fn cv_score(&self) -> f64 {
        let n = self.counts.len() as f64;
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let mean = total as f64 / n;
        let variance = self
            .counts
            .iter()
            .map(|&c| {
                let d = c as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();
        let cv = std_dev / mean.abs();
        (1.0 - cv).clamp(0.0, 1.0)
    }

    /// Fraction of active bins falling in the top two frequency-count buckets.
    pub fn bimodal_fit_score(&self, cfg: &BeaconConfig) -> f64 {
        let effective_min_hours = cfg.effective_bimodal_min_hours() as usize;
        if self.total_bars < effective_min_hours {
            return 0.0;
        }
        let max_count = match self.counts.iter().max() {
            Some(&m) if m > 0 => m,
            _ => return 0.0,
        };
        let bucket_size = ((max_count as f64) * cfg.hist_mode_sensitivity)
            .ceil()
            .max(1.0) as u64;

        let mut bucket_populations: HashMap<u64, usize> = HashMap::new();
        for &c in self.counts.iter().filter(|&&c| c > 0) {
            let bucket = c / bucket_size;
            *bucket_populations.entry(bucket).or_insert(0) += 1;
        }
        let mut populations: Vec<usize> = bucket_populations.into_values().collect();
        populations.sort_unstable_by(|a, b| b.cmp(a));
        let a = populations.first().copied().unwrap_or(0);
        let b = populations.get(1).copied().unwrap_or(0);

        let denom = (self.total_bars as i64 - cfg.hist_bimodal_outlier_removal as i64).max(1) as f64;
        ((a + b) as f64 / denom).min(1.0)
    }

    /// `max(coefficient-of-variation score, bimodal-fit score)`.
    pub fn hist_score(&self, cfg: &BeaconConfig) -> f64 {
        self.cv_score().max(self.bimodal_fit_score(cfg))
    }

    /// `ceil(1000 * (hist_max - hist_min) / (dataset_max - dataset_min)) / 1000`, clamped to 1.
    pub fn coverage(&self) -> f64 {
        let Some((hist_min, hist_max)) = self.active_bounds() else {
            return 0.0;
        };
        let span = (self.dataset_max - self.dataset_min) as f64;
        if span <= 0.0 {
            return 0.0;
        }
        let raw = (hist_max - hist_min) / span;
        ((raw * 1000.0).ceil() / 1000.0).min(1.0)
    }

    /// `ceil(1000 * longest_run / dur_ideal_consistent_hours) / 1000`, clamped to 1.
    pub fn consistency(&self, dur_ideal_consistent_hours: u32) -> f64 {
        let raw = (self.longest_run as f64 * 1000.0) / dur_ideal_consistent_hours as f64;
        (raw.ceil() / 1000.0).min(1.0)
    }

    /// `0` if `total_bars < dur_min_hours`, else `max(coverage, consistency)`.
    pub fn duration_score(&self, cfg: &BeaconConfig) -> f64 {
        if self.total_bars < cfg.dur_min_hours as usize {
            return 0.0;
        }
        self.coverage().max(self.consistency(cfg.dur_ideal_consistent_hours))
    }
}

fn bin_index(ts: u32, dataset_min: u32, bin_width: f64) -> usize {
    if bin_width <= 0.0 {
        return 0;
    }
    let offset = (ts - dataset_min) as f64 / bin_width;
    // Last bin is inclusive on the right.
    (offset.floor() as usize).min(NUM_BINS - 1)
}

/// Longest run of consecutive non-zero bins, treating the bin array as circular (wrap-around
/// from the last bin to the first counts). Clamped to the bin count when every bin is non-zero.
pub fn longest_circular_run(counts: &[u64]) -> usize {
    let n = counts.len();
    if n == 0 {
        return 0;
    }
    if counts.iter().all(|&c| c > 0) {
        return n;
    }
    let mut best = 0usize;
    let mut current = 0usize;
    for (i, &c) in counts.iter().chain(counts.iter()).enumerate() {
        if i >= 2 * n {
            break;
        }
        if c > 0 {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best.min(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon_config() -> BeaconConfig {
        BeaconConfig {
            weights: rita_types::BeaconWeights {
                ts: 0.25,
                ds: 0.25,
                dur: 0.25,
                hist: 0.25,
            },
            unique_conn_threshold: 5,
            hist_mode_sensitivity: 0.3,
            hist_bimodal_outlier_removal: 0,
            hist_bimodal_min_hours: 11,
            dur_min_hours: 6,
            dur_ideal_consistent_hours: 12,
            score_thresholds: rita_types::ScoreThresholds {
                base: 0.0,
                low: 0.3,
                med: 0.6,
                high: 0.9,
            },
        }
    }

    #[test]
    fn circular_run_wraps_across_boundary() {
        let counts = vec![1, 0, 1, 1];
        assert_eq!(longest_circular_run(&counts), 3);
    }

    #[test]
    fn circular_run_clamped_to_bin_count_when_fully_active() {
        let counts = vec![1, 1, 1, 1];
        assert_eq!(longest_circular_run(&counts), 4);
    }

    #[test]
    fn uniformly_spread_timestamps_give_high_cv_score() {
        // one connection in every one of the 24 bins => counts are all equal => CV == 0
        let span = 24 * 3600;
        let ts_list: Vec<u32> = (0..24).map(|i| i * 3600).collect();
        let hist = Histogram::build(&ts_list, 0, span as u32).unwrap();
        assert_eq!(hist.total_bars, 24);
        assert_eq!(hist.cv_score(), 1.0);
    }

    #[test]
    fn rejects_non_increasing_window() {
        let err = Histogram::build(&[1, 2, 3], 100, 100).unwrap_err();
        assert!(matches!(err, Error::InvalidDatasetTimeRange { .. }));
    }

    #[test]
    fn duration_score_zero_below_min_hours() {
        let ts_list: Vec<u32> = vec![0, 3600];
        let hist = Histogram::build(&ts_list, 0, 24 * 3600).unwrap();
        let cfg = beacon_config();
        assert_eq!(hist.duration_score(&cfg), 0.0);
    }
}
