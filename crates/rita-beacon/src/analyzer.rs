//! The beacon analyzer itself: turns one `AnalysisResult` into a `Beacon` by combining the
//! timestamp/data-size statistical scores with the histogram-derived duration score.
//!
//! Callers are expected to have already filtered out strobes (`AnalysisResult::is_strobe`) and
//! `dns` records, which carry no beacon math inputs.

use rita_types::{AnalysisResult, Beacon, BeaconConfig, Error, Result};

use crate::histogram::Histogram;
use crate::statistics::statistical_score;

/// MAD-score fallback used for timestamp deltas when the median delta is under one second:
/// 1 for timestamps, 0 for data-size.
const TS_MAD_DEFAULT: f64 = 1.0;
const DS_MAD_DEFAULT: f64 = 0.0;

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Scores a single record against the shared `BeaconConfig` and the analysis window bounds
/// `(min_ts, max_ts)`: timestamp and data-size statistical scores, the histogram-derived
/// duration score, then the weighted overall score.
pub fn analyze(record: &AnalysisResult, cfg: &BeaconConfig, min_ts: u32, max_ts: u32) -> Result<Beacon> {
    cfg.weights.validate()?;

    // A. Timestamp score.
    if record.ts_list.len() < 4 {
        return Err(Error::InsufficientTimestamps(record.ts_list.len()));
    }
    let mut deltas: Vec<u32> = record.ts_list.windows(2).map(|w| w[1] - w[0]).collect();
    let non_zero_deltas = deltas.iter().filter(|&&d| d != 0).count();
    if non_zero_deltas < 3 {
        return Err(Error::InsufficientTimestamps(non_zero_deltas));
    }
    deltas.sort_unstable();
    let ts_intervals: Vec<u32> = deltas.into_iter().skip_while(|&d| d == 0).collect();
    let ts_deltas_f64: Vec<f64> = ts_intervals.iter().map(|&d| d as f64).collect();
    let ts_score = statistical_score(&ts_deltas_f64, TS_MAD_DEFAULT);

    // B. Data-size score.
    if record.bytes_list.len() < 3 {
        return Err(Error::InsufficientDataPoints(record.bytes_list.len()));
    }
    let mut ds_sizes = record.bytes_list.clone();
    ds_sizes.sort_by(|a, b| a.total_cmp(b));
    let ds_score = statistical_score(&ds_sizes, DS_MAD_DEFAULT);

    // C/D. Histogram, bimodal/CV, duration.
    let histogram = Histogram::build(&record.ts_list, min_ts, max_ts)?;
    let hist_score = histogram.hist_score(cfg);
    let dur_score = histogram.duration_score(cfg);

    // E. Overall score.
    let w = &cfg.weights;
    let overall_score = round3(w.ts * ts_score + w.ds * ds_score + w.dur * dur_score + w.hist * hist_score);

    let ts_interval_counts = duplicate_counts(&ts_intervals);
    let ds_size_counts = duplicate_counts(&ds_sizes);

    Ok(Beacon {
        beacon_type: record.beacon_type,
        overall_score,
        ts_score: round3(ts_score),
        ds_score: round3(ds_score),
        dur_score: round3(dur_score),
        hist_score: round3(hist_score),
        ts_intervals,
        ts_interval_counts,
        ds_sizes,
        ds_size_counts,
    })
}

/// For a sorted slice, returns one count per entry: how many times that entry's value repeats
/// in the slice. `duplicate_counts(&[1, 1, 3]) == [2, 2, 1]`.
fn duplicate_counts<T: PartialEq>(sorted: &[T]) -> Vec<u64> {
    let mut counts = Vec::with_capacity(sorted.len());
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let run_len = (j - i) as u64;
        counts.extend(std::iter::repeat(run_len).take(j - i));
        i = j;
    }
    counts
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use chrono::{DateTime, Utc};
    use rita_types::{BeaconType, BeaconWeights, Fingerprint, NetworkId, ScoreThresholds};

    use super::*;

    fn beacon_config() -> BeaconConfig {
        BeaconConfig {
            weights: BeaconWeights {
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
            score_thresholds: ScoreThresholds {
                base: 0.0,
                low: 0.3,
                med: 0.6,
                high: 0.9,
            },
        }
    }

    fn base_record(ts_list: Vec<u32>, bytes_list: Vec<f64>, count: u64) -> AnalysisResult {
        AnalysisResult {
            hash: Fingerprint([0u8; 16]),
            src: "10.55.100.111".parse::<IpAddr>().unwrap(),
            src_nuid: NetworkId::PUBLIC,
            fqdn: None,
            dst: Some("165.227.216.194".parse::<IpAddr>().unwrap()),
            dst_nuid: Some(NetworkId::PUBLIC),
            beacon_type: BeaconType::Ip,
            count,
            proxy_count: 0,
            open_count: 0,
            ts_unique: ts_list.len() as u64,
            ts_list,
            bytes_list,
            total_duration: 86_000.0,
            total_bytes: 50_000.0,
            port_proto_service: vec![],
            first_seen_historical: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            last_seen: DateTime::<Utc>::from_timestamp(100_000, 0).unwrap(),
            server_ips: vec![],
            proxy_ips: vec![],
            prevalence_total: 1,
            prevalence: 0.01,
            tld: None,
            subdomain_count: 0,
            on_threat_intel: false,
            has_c2_direct_conns_mod: false,
            missing_host_count: 0,
            src_net: None,
            dst_net: None,
        }
    }

    #[test]
    fn perfectly_periodic_beacon_scores_near_one() {
        // One connection on the hour, every hour, for 24 hours: every sub-score should saturate.
        let ts_list: Vec<u32> = (0..24).map(|i| i * 3600).collect();
        let bytes_list: Vec<f64> = vec![1024.0; 24];
        let record = base_record(ts_list, bytes_list, 24);
        let cfg = beacon_config();

        let beacon = analyze(&record, &cfg, 0, 24 * 3600).unwrap();
        assert_eq!(beacon.ts_score, 1.0);
        assert_eq!(beacon.ds_score, 1.0);
        assert!(beacon.hist_score >= 0.9);
        assert!(beacon.overall_score >= 0.9);
    }

    #[test]
    fn too_few_timestamps_is_rejected() {
        let record = base_record(vec![0, 60, 120], vec![1.0, 2.0, 3.0], 3);
        let cfg = beacon_config();
        let err = analyze(&record, &cfg, 0, 1000).unwrap_err();
        assert!(matches!(err, Error::InsufficientTimestamps(_)));
    }

    #[test]
    fn too_few_data_points_is_rejected() {
        let record = base_record(vec![0, 60, 120, 180], vec![1.0, 2.0], 4);
        let cfg = beacon_config();
        let err = analyze(&record, &cfg, 0, 1000).unwrap_err();
        assert!(matches!(err, Error::InsufficientDataPoints(_)));
    }

    #[test]
    fn bad_weights_reject_with_invalid_config() {
        let record = base_record(vec![0, 60, 120, 180], vec![1.0, 2.0, 3.0], 4);
        let mut cfg = beacon_config();
        cfg.weights.ts = 0.9;
        let err = analyze(&record, &cfg, 0, 1000).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn duplicate_counts_pairs_each_entry_with_its_multiplicity() {
        assert_eq!(duplicate_counts(&[1, 1, 3]), vec![2, 2, 1]);
        assert_eq!(duplicate_counts(&[5, 5, 5, 5]), vec![4, 4, 4, 4]);
        assert_eq!(duplicate_counts::<u32>(&[]), Vec::<u64>::new());
    }

    #[test]
    fn overall_score_stays_within_unit_range() {
        let ts_list: Vec<u32> = vec![0, 50, 3_600, 3_700, 7_300, 50_000, 50_300, 86_000];
        let bytes_list: Vec<f64> = vec![10.0, 500.0, 20.0, 999.0, 12.0, 4.0, 7.0, 33.0];
        let record = base_record(ts_list, bytes_list, 8);
        let cfg = beacon_config();
        let beacon = analyze(&record, &cfg, 0, 86_400).unwrap();
        assert!((0.0..=1.0).contains(&beacon.overall_score));
    }
}
