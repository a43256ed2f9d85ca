//! Amalgamator: groups every `ThreatMixtape` row for the current run by pair and folds
//! indicator + modifier rows into one `FinalMixtape` per pair.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rita_types::{FinalMixtape, FinalMixtapeKey, ThreatMixtape};
use uuid::Uuid;

/// Pure fold over every row produced this run, against the in-memory buffer collected during
/// the run rather than re-querying the store.
pub fn amalgamate(rows: &[ThreatMixtape], import_id: Uuid, analyzed_at: DateTime<Utc>) -> Vec<FinalMixtape> {
    let mut groups: BTreeMap<FinalMixtapeKey, Group> = BTreeMap::new();

    for row in rows {
        let key = FinalMixtapeKey {
            src: row.src,
            src_nuid: row.src_nuid.clone(),
            dst: row.dst,
            dst_nuid: row.dst_nuid.clone(),
            fqdn: row.fqdn.clone(),
        };
        groups.entry(key).or_insert_with(|| Group::new(row.hash.clone())).fold(row);
    }

    groups
        .into_iter()
        .map(|(key, group)| group.into_final_mixtape(key, import_id, analyzed_at))
        .collect()
}

struct Group {
    hash: rita_types::Fingerprint,
    beacon_threat_score: f64,
    long_conn_score: f64,
    strobe_score: f64,
    c2_over_dns_score: f64,
    c2_over_dns_direct_conn_score: f64,
    threat_intel_score: f64,
    threat_intel_data_size_score: f64,
    prevalence_score: f64,
    first_seen_score: f64,
    missing_host_header_score: f64,
    total_modifier_score: f64,
    port_proto_service: BTreeSet<rita_types::PortProtoService>,
    server_ips: BTreeSet<std::net::IpAddr>,
    proxy_ips: BTreeSet<std::net::IpAddr>,
}

impl Group {
    fn new(hash: rita_types::Fingerprint) -> Self {
        Self {
            hash,
            beacon_threat_score: 0.0,
            long_conn_score: 0.0,
            strobe_score: 0.0,
            c2_over_dns_score: 0.0,
            c2_over_dns_direct_conn_score: 0.0,
            threat_intel_score: 0.0,
            threat_intel_data_size_score: 0.0,
            prevalence_score: 0.0,
            first_seen_score: 0.0,
            missing_host_header_score: 0.0,
            total_modifier_score: 0.0,
            port_proto_service: BTreeSet::new(),
            server_ips: BTreeSet::new(),
            proxy_ips: BTreeSet::new(),
        }
    }

    fn fold(&mut self, row: &ThreatMixtape) {
        if row.is_modifier_row() {
            self.total_modifier_score += row.modifier_score;
        } else {
            self.beacon_threat_score = self.beacon_threat_score.max(row.beacon_threat_score);
            self.long_conn_score = self.long_conn_score.max(row.long_conn_score);
            self.strobe_score = self.strobe_score.max(row.strobe_score);
            self.c2_over_dns_score = self.c2_over_dns_score.max(row.c2_over_dns_score);
            self.c2_over_dns_direct_conn_score =
                self.c2_over_dns_direct_conn_score.max(row.c2_over_dns_direct_conn_score);
            self.threat_intel_score = self.threat_intel_score.max(row.threat_intel_score);
            self.threat_intel_data_size_score =
                self.threat_intel_data_size_score.max(row.threat_intel_data_size_score);
            self.prevalence_score = self.prevalence_score.max(row.prevalence_score);
            self.first_seen_score = self.first_seen_score.max(row.first_seen_score);
            self.missing_host_header_score = self.missing_host_header_score.max(row.missing_host_header_score);
        }
        self.port_proto_service.extend(row.port_proto_service.iter().cloned());
        self.server_ips.extend(row.server_ips.iter().copied());
        self.proxy_ips.extend(row.proxy_ips.iter().copied());
    }

    /// `base_score` is the strongest single indicator; `final_score` sums every contribution
    /// and is explicitly allowed to exceed `1.0`.
    fn into_final_mixtape(self, key: FinalMixtapeKey, import_id: Uuid, analyzed_at: DateTime<Utc>) -> FinalMixtape {
        let base_score = [
            self.beacon_threat_score,
            self.long_conn_score,
            self.strobe_score,
            self.c2_over_dns_score,
            self.threat_intel_score,
        ]
        .into_iter()
        .fold(0.0_f64, f64::max);

        let final_score = base_score
            + self.total_modifier_score
            + self.prevalence_score
            + self.first_seen_score
            + self.missing_host_header_score
            + self.threat_intel_data_size_score
            + self.c2_over_dns_direct_conn_score;

        FinalMixtape {
            key,
            hash: self.hash,
            import_id,
            analyzed_at,
            base_score,
            total_modifier_score: self.total_modifier_score,
            final_score,
            beacon_threat_score: self.beacon_threat_score,
            long_conn_score: self.long_conn_score,
            strobe_score: self.strobe_score,
            c2_over_dns_score: self.c2_over_dns_score,
            threat_intel_score: self.threat_intel_score,
            prevalence_score: self.prevalence_score,
            first_seen_score: self.first_seen_score,
            missing_host_header_score: self.missing_host_header_score,
            threat_intel_data_size_score: self.threat_intel_data_size_score,
            c2_over_dns_direct_conn_score: self.c2_over_dns_direct_conn_score,
            port_proto_service: self.port_proto_service.into_iter().collect(),
            server_ips: self.server_ips.into_iter().collect(),
            proxy_ips: self.proxy_ips.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rita_types::{BeaconType, Fingerprint, NetworkId};

    use super::*;

    fn base_row(src: std::net::IpAddr, fqdn: &str) -> ThreatMixtape {
        ThreatMixtape {
            hash: Fingerprint([0u8; 16]),
            src,
            src_nuid: NetworkId(Uuid::nil()),
            dst: None,
            dst_nuid: None,
            fqdn: Some(fqdn.to_string()),
            beacon_type: BeaconType::Sni,
            beacon_score: Some(0.9),
            ts_score: Some(0.9),
            ds_score: Some(0.9),
            dur_score: Some(0.9),
            hist_score: Some(0.9),
            beacon_threat_score: 0.9,
            long_conn_score: 0.0,
            strobe_score: 0.0,
            c2_over_dns_score: 0.0,
            c2_over_dns_direct_conn_score: 0.0,
            threat_intel_score: 0.0,
            threat_intel_data_size_score: 0.0,
            prevalence_score: 0.1,
            first_seen_score: 0.0,
            missing_host_header_score: 0.0,
            modifier_name: String::new(),
            modifier_value: String::new(),
            modifier_score: 0.0,
            port_proto_service: vec![],
            server_ips: vec![],
            proxy_ips: vec![],
            analyzed_at: Utc::now(),
            first_seen_historical: Utc::now(),
            import_id: Uuid::nil(),
        }
    }

    #[test]
    fn folds_indicator_and_modifier_rows_into_one_pair() {
        let src: std::net::IpAddr = "10.0.0.1".parse().unwrap();
        let indicator = base_row(src, "evil.example");
        let mut modifier = base_row(src, "evil.example");
        modifier.modifier_name = "rare_signature".to_string();
        modifier.modifier_score = 0.1;
        modifier.first_seen_historical = ThreatMixtape::modifier_epoch();
        modifier.beacon_threat_score = 0.0;

        let out = amalgamate(&[indicator, modifier], Uuid::nil(), Utc::now());
        assert_eq!(out.len(), 1);
        let pair = &out[0];
        assert_eq!(pair.base_score, 0.9);
        assert_eq!(pair.total_modifier_score, 0.1);
        assert!((pair.final_score - 1.1).abs() < 1e-9);
    }

    #[test]
    fn distinct_pairs_stay_separate() {
        let src: std::net::IpAddr = "10.0.0.1".parse().unwrap();
        let a = base_row(src, "a.example");
        let b = base_row(src, "b.example");
        let out = amalgamate(&[a, b], Uuid::nil(), Utc::now());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn final_score_may_exceed_one() {
        let src: std::net::IpAddr = "10.0.0.1".parse().unwrap();
        let mut row = base_row(src, "evil.example");
        row.beacon_threat_score = 0.9;
        row.prevalence_score = 0.5;
        row.missing_host_header_score = 0.3;
        let out = amalgamate(&[row], Uuid::nil(), Utc::now());
        assert!(out[0].final_score > 1.0);
    }

    /// Re-running amalgamation on the same indicator rows reproduces the identical final row.
    #[test]
    fn amalgamation_is_idempotent() {
        let src: std::net::IpAddr = "10.0.0.1".parse().unwrap();
        let indicator = base_row(src, "evil.example");
        let mut modifier = base_row(src, "evil.example");
        modifier.modifier_name = "mime_type_mismatch".to_string();
        modifier.modifier_score = 0.1;
        modifier.beacon_threat_score = 0.0;

        let rows = vec![indicator, modifier];
        let import_id = Uuid::nil();
        let analyzed_at = Utc::now();
        let first = amalgamate(&rows, import_id, analyzed_at);
        let second = amalgamate(&rows, import_id, analyzed_at);
        assert_eq!(first, second);
    }
}
