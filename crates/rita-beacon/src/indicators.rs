//! Indicator derivation: turns one `AnalysisResult` plus its (optional) `Beacon` into the
//! indicator `ThreatMixtape` row. Modifier rows (rare-signature, MIME mismatch) are produced
//! separately by the modifier stage, not here.

use chrono::{DateTime, Utc};
use rita_types::{
    AnalysisResult, Beacon, BeaconConfig, BeaconType, IndicatorThresholds, Modifiers, ThreatMixtape,
};
use uuid::Uuid;

use crate::scorer::bucket;

/// A pair is treated as "freshly seen" for the first-seen modifier when its historical
/// first-seen timestamp falls within this many seconds of its last-seen timestamp.
const FIRST_SEEN_FRESHNESS_SECS: i64 = 86_400;

/// Builds the indicator row for a single record.
///
/// `beacon` is `None` for `dns` records and for records that failed beacon analysis
/// (`InsufficientTimestamps`/`InsufficientDataPoints`) — both cases still produce a row, just
/// without the beacon sub-scores.
pub fn derive(
    record: &AnalysisResult,
    beacon: Option<&Beacon>,
    beacon_cfg: &BeaconConfig,
    thresholds: &IndicatorThresholds,
    modifiers: &Modifiers,
    analyzed_at: DateTime<Utc>,
    import_id: Uuid,
) -> ThreatMixtape {
    let strobe_score = if record.is_strobe() {
        bucket(record.count as f64, &thresholds.strobe)
    } else {
        0.0
    };

    let (beacon_score, ts_score, ds_score, dur_score, hist_score, beacon_threat_score) = match beacon {
        Some(b) if !record.is_strobe() => (
            Some(b.overall_score),
            Some(b.ts_score),
            Some(b.ds_score),
            Some(b.dur_score),
            Some(b.hist_score),
            bucket(b.overall_score, &beacon_cfg.score_thresholds),
        ),
        _ => (None, None, None, None, None, 0.0),
    };

    let long_conn_score = bucket(record.total_duration, &thresholds.long_connection);

    let c2_over_dns_score = if record.beacon_type == BeaconType::Dns {
        bucket(record.subdomain_count as f64, &thresholds.c2_over_dns)
    } else {
        0.0
    };
    let c2_over_dns_direct_conn_score = if record.has_c2_direct_conns_mod {
        modifiers.c2_over_dns_direct_conn_score_increase
    } else {
        0.0
    };

    let threat_intel_score = if record.on_threat_intel {
        modifiers.threat_intel_score
    } else {
        0.0
    };
    let threat_intel_data_size_score = if record.on_threat_intel {
        bucket(record.total_bytes, &thresholds.threat_intel_data_size)
    } else {
        0.0
    };

    let prevalence_score = modifiers.prevalence_score_decrease * (1.0 - record.prevalence).clamp(0.0, 1.0);

    let first_seen_score = {
        let age = (record.last_seen - record.first_seen_historical).num_seconds();
        if (0..FIRST_SEEN_FRESHNESS_SECS).contains(&age) {
            modifiers.first_seen_score_increase
        } else {
            0.0
        }
    };

    let missing_host_header_score = if record.missing_host_count > 0 {
        modifiers.missing_host_count_score_increase
    } else {
        0.0
    };

    ThreatMixtape {
        hash: record.hash,
        src: record.src,
        src_nuid: record.src_nuid,
        dst: record.dst,
        dst_nuid: record.dst_nuid,
        fqdn: record.fqdn.clone(),
        beacon_type: record.beacon_type,

        beacon_score,
        ts_score,
        ds_score,
        dur_score,
        hist_score,
        beacon_threat_score,

        long_conn_score,
        strobe_score,
        c2_over_dns_score,
        c2_over_dns_direct_conn_score,
        threat_intel_score,
        threat_intel_data_size_score,
        prevalence_score,
        first_seen_score,
        missing_host_header_score,

        modifier_name: String::new(),
        modifier_value: String::new(),
        modifier_score: 0.0,

        port_proto_service: record.port_proto_service.clone(),
        server_ips: record.server_ips.clone(),
        proxy_ips: record.proxy_ips.clone(),

        analyzed_at,
        first_seen_historical: record.first_seen_historical,
        import_id,
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;

    use rita_types::{Fingerprint, NetworkId, ScoreThresholds};

    use super::*;

    fn indicator_thresholds() -> IndicatorThresholds {
        let t = ScoreThresholds {
            base: 0.0,
            low: 1000.0,
            med: 5000.0,
            high: 86_400.0,
        };
        IndicatorThresholds {
            long_connection: t,
            c2_over_dns: ScoreThresholds {
                base: 0.0,
                low: 5.0,
                med: 20.0,
                high: 50.0,
            },
            strobe: ScoreThresholds {
                base: 86_400.0,
                low: 100_000.0,
                med: 500_000.0,
                high: 1_000_000.0,
            },
            threat_intel_data_size: ScoreThresholds {
                base: 0.0,
                low: 1_000.0,
                med: 10_000.0,
                high: 100_000.0,
            },
        }
    }

    fn modifiers() -> Modifiers {
        Modifiers {
            rare_signature_score_increase: 0.1,
            mime_type_mismatch_score_increase: 0.1,
            c2_over_dns_direct_conn_score_increase: 0.15,
            prevalence_score_decrease: 0.2,
            first_seen_score_increase: 0.1,
            missing_host_count_score_increase: 0.1,
            threat_intel_score: 0.8,
        }
    }

    fn beacon_cfg() -> BeaconConfig {
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
            score_thresholds: ScoreThresholds {
                base: 0.0,
                low: 0.3,
                med: 0.6,
                high: 0.9,
            },
        }
    }

    fn record() -> AnalysisResult {
        AnalysisResult {
            hash: Fingerprint([1u8; 16]),
            src: "10.0.0.5".parse::<IpAddr>().unwrap(),
            src_nuid: NetworkId::PRIVATE_UNKNOWN_AGENT,
            fqdn: None,
            dst: Some("8.8.8.8".parse::<IpAddr>().unwrap()),
            dst_nuid: Some(NetworkId::PUBLIC),
            beacon_type: BeaconType::Ip,
            count: 100,
            proxy_count: 0,
            open_count: 0,
            ts_unique: 100,
            ts_list: vec![],
            bytes_list: vec![],
            total_duration: 120.0,
            total_bytes: 500.0,
            port_proto_service: vec![],
            first_seen_historical: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            last_seen: DateTime::<Utc>::from_timestamp(100_000, 0).unwrap(),
            server_ips: vec![],
            proxy_ips: vec![],
            prevalence_total: 1,
            prevalence: 0.02,
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
    fn strobe_suppresses_beacon_row() {
        let mut r = record();
        r.count = 90_000;
        let row = derive(
            &r,
            None,
            &beacon_cfg(),
            &indicator_thresholds(),
            &modifiers(),
            Utc::now(),
            Uuid::nil(),
        );
        assert!(row.strobe_score > 0.0);
        assert!(row.beacon_score.is_none());
        assert_eq!(row.beacon_threat_score, 0.0);
    }

    #[test]
    fn threat_intel_applies_fixed_and_data_size_scores() {
        let mut r = record();
        r.on_threat_intel = true;
        r.total_bytes = 5_000.0;
        let row = derive(
            &r,
            None,
            &beacon_cfg(),
            &indicator_thresholds(),
            &modifiers(),
            Utc::now(),
            Uuid::nil(),
        );
        assert_eq!(row.threat_intel_score, 0.8);
        assert!(row.threat_intel_data_size_score > 0.0);
    }

    #[test]
    fn all_scores_stay_in_unit_range() {
        let r = record();
        let row = derive(
            &r,
            None,
            &beacon_cfg(),
            &indicator_thresholds(),
            &modifiers(),
            Utc::now(),
            Uuid::nil(),
        );
        for score in [
            row.long_conn_score,
            row.strobe_score,
            row.c2_over_dns_score,
            row.threat_intel_score,
            row.threat_intel_data_size_score,
            row.prevalence_score,
            row.first_seen_score,
            row.missing_host_header_score,
        ] {
            assert!((0.0..=1.0).contains(&score), "score {score} out of range");
        }
    }
}
