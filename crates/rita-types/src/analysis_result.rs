use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;

use crate::fingerprint::Fingerprint;
use crate::network_id::NetworkId;

/// Which aggregation view produced a record. A tuple appears in at most one `BeaconType` per
/// `analyzed_at` timestamp, so the analyzer switches on this rather than dispatching to
/// per-kind trait objects.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde_repr::Serialize_repr, serde_repr::Deserialize_repr,
)]
#[repr(u8)]
pub enum BeaconType {
    Ip = 0,
    Sni = 1,
    Dns = 2,
}

impl std::fmt::Display for BeaconType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BeaconType::Ip => "ip",
            BeaconType::Sni => "sni",
            BeaconType::Dns => "dns",
        };
        f.write_str(s)
    }
}

/// One observed `(port, protocol, service)` triple between the pair during the window.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PortProtoService {
    pub port: u16,
    pub proto: u8,
    pub service: String,
}

/// One `(src, src_net, dst|fqdn, dst_net, beacon_type)` aggregate from the aggregation source.
///
/// This is the sole input to the beacon analyzer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    pub hash: Fingerprint,
    pub src: IpAddr,
    pub src_nuid: NetworkId,
    /// `None` for `ip` rows; the destination IP is carried in `server_ips`/`dst` instead.
    pub fqdn: Option<String>,
    pub dst: Option<IpAddr>,
    pub dst_nuid: Option<NetworkId>,
    pub beacon_type: BeaconType,

    pub count: u64,
    pub proxy_count: u64,
    pub open_count: u64,

    /// Count of distinct timestamps, i.e. `ts_list.len()` before any de-duplication.
    pub ts_unique: u64,
    /// Sorted ascending; epoch seconds. Empty for `dns` rows.
    pub ts_list: Vec<u32>,
    /// Sorted ascending. Empty for `dns` rows.
    pub bytes_list: Vec<f64>,

    pub total_duration: f64,
    pub total_bytes: f64,
    pub port_proto_service: Vec<PortProtoService>,

    pub first_seen_historical: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,

    pub server_ips: Vec<IpAddr>,
    pub proxy_ips: Vec<IpAddr>,

    pub prevalence_total: u32,
    /// `prevalence_total / network_size`, normalized by the aggregation source.
    pub prevalence: f64,

    /// First significant subdomain; only meaningful for `dns` rows.
    pub tld: Option<String>,
    pub subdomain_count: u64,

    pub on_threat_intel: bool,
    pub has_c2_direct_conns_mod: bool,

    /// Count of HTTP requests in the window observed without a `Host` header.
    pub missing_host_count: u32,

    pub src_net: Option<IpNetwork>,
    pub dst_net: Option<IpNetwork>,
}

impl AnalysisResult {
    /// Strobe and beacon are mutually exclusive: `count >= 86400` (one/sec for 24h) fires a
    /// strobe row and suppresses the beacon row.
    pub const STROBE_THRESHOLD: u64 = 86_400;

    pub fn is_strobe(&self) -> bool {
        self.count >= Self::STROBE_THRESHOLD
    }
}
