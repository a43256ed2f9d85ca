use crate::error::{Error, Result};

/// Bucket anchors for the scorer: `Base <= Low <= Med <= High`. `Base == 0` is a
/// legal sentinel that disables the "value below floor scores zero" branch.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoreThresholds {
    pub base: f64,
    pub low: f64,
    pub med: f64,
    pub high: f64,
}

impl ScoreThresholds {
    pub fn validate(&self) -> Result<()> {
        if self.base < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "Base threshold must be >= 0, got {}",
                self.base
            )));
        }
        if !(self.base <= self.low && self.low <= self.med && self.med <= self.high) {
            return Err(Error::InvalidConfig(format!(
                "thresholds must satisfy Base <= Low <= Med <= High, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// Relative weight of each beacon sub-score. Must individually lie in `[0, 1]` and sum to
/// exactly `1`; violating either fails beacon scoring with `InvalidConfig`.
#[derive(Copy, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeaconWeights {
    pub ts: f64,
    pub ds: f64,
    pub dur: f64,
    pub hist: f64,
}

impl BeaconWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("ts", self.ts),
            ("ds", self.ds),
            ("dur", self.dur),
            ("hist", self.hist),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(Error::InvalidConfig(format!(
                    "beacon weight {name} must be in [0, 1], got {w}"
                )));
            }
        }
        let sum = self.ts + self.ds + self.dur + self.hist;
        // Configs are authored as decimals (e.g. 0.25 four times); allow float slop.
        if (sum - 1.0).abs() > 1e-9 {
            return Err(Error::InvalidConfig(format!(
                "beacon weights must sum to 1, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Parameters controlling the beacon analyzer's statistics.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeaconConfig {
    pub weights: BeaconWeights,
    pub unique_conn_threshold: u64,
    pub hist_mode_sensitivity: f64,
    pub hist_bimodal_outlier_removal: u32,
    pub hist_bimodal_min_hours: u32,
    pub dur_min_hours: u32,
    pub dur_ideal_consistent_hours: u32,
    pub score_thresholds: ScoreThresholds,
}

impl BeaconConfig {
    /// `bimodal_min_hours` below 6 is silently coerced to 11: this is preserved as a contract,
    /// not treated as a validation failure.
    pub const BIMODAL_MIN_HOURS_FLOOR: u32 = 6;
    pub const BIMODAL_MIN_HOURS_DEFAULT: u32 = 11;

    pub fn effective_bimodal_min_hours(&self) -> u32 {
        if self.hist_bimodal_min_hours < Self::BIMODAL_MIN_HOURS_FLOOR {
            Self::BIMODAL_MIN_HOURS_DEFAULT
        } else {
            self.hist_bimodal_min_hours
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.score_thresholds.validate()?;
        if self.dur_min_hours < 1 {
            return Err(Error::InvalidConfig(format!(
                "dur_min_hours must be >= 1, got {}",
                self.dur_min_hours
            )));
        }
        if self.dur_ideal_consistent_hours < 1 {
            return Err(Error::InvalidConfig(format!(
                "dur_ideal_consistent_hours must be >= 1, got {}",
                self.dur_ideal_consistent_hours
            )));
        }
        if !(0.0..=1.0).contains(&self.hist_mode_sensitivity) {
            return Err(Error::InvalidConfig(format!(
                "hist_mode_sensitivity must be in [0, 1], got {}",
                self.hist_mode_sensitivity
            )));
        }
        Ok(())
    }
}

/// The per-indicator bucket thresholds, aside from the beacon's own thresholds (which live on
/// [`BeaconConfig`]).
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IndicatorThresholds {
    pub long_connection: ScoreThresholds,
    pub c2_over_dns: ScoreThresholds,
    pub strobe: ScoreThresholds,
    pub threat_intel_data_size: ScoreThresholds,
}

impl IndicatorThresholds {
    pub fn validate(&self) -> Result<()> {
        self.long_connection.validate()?;
        self.c2_over_dns.validate()?;
        self.strobe.validate()?;
        self.threat_intel_data_size.validate()?;
        Ok(())
    }
}

/// Additive/subtractive modifier magnitudes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Modifiers {
    pub rare_signature_score_increase: f64,
    pub mime_type_mismatch_score_increase: f64,
    pub c2_over_dns_direct_conn_score_increase: f64,
    pub prevalence_score_decrease: f64,
    pub first_seen_score_increase: f64,
    pub missing_host_count_score_increase: f64,
    /// Fixed score assigned when `on_threat_intel` is set.
    pub threat_intel_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_weights() -> BeaconWeights {
        BeaconWeights {
            ts: 0.25,
            ds: 0.25,
            dur: 0.25,
            hist: 0.25,
        }
    }

    #[test]
    fn weights_must_sum_to_one() {
        let mut w = valid_weights();
        w.ts = 0.5;
        assert!(w.validate().is_err());
        assert!(valid_weights().validate().is_ok());
    }

    #[test]
    fn thresholds_must_be_monotone() {
        let bad = ScoreThresholds {
            base: 0.0,
            low: 10.0,
            med: 5.0,
            high: 20.0,
        };
        assert!(bad.validate().is_err());

        let good = ScoreThresholds {
            base: 0.0,
            low: 10.0,
            med: 20.0,
            high: 30.0,
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn bimodal_min_hours_coerced_below_floor() {
        let cfg = BeaconConfig {
            weights: valid_weights(),
            unique_conn_threshold: 5,
            hist_mode_sensitivity: 0.3,
            hist_bimodal_outlier_removal: 0,
            hist_bimodal_min_hours: 3,
            dur_min_hours: 1,
            dur_ideal_consistent_hours: 12,
            score_thresholds: ScoreThresholds {
                base: 0.0,
                low: 1.0,
                med: 2.0,
                high: 3.0,
            },
        };
        assert_eq!(
            cfg.effective_bimodal_min_hours(),
            BeaconConfig::BIMODAL_MIN_HOURS_DEFAULT
        );
    }
}
