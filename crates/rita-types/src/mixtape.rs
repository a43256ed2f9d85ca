use std::net::IpAddr;

use chrono::{DateTime, Utc};

use crate::analysis_result::{BeaconType, PortProtoService};
use crate::fingerprint::Fingerprint;
use crate::network_id::NetworkId;

/// A single scored indicator or modifier row. Written once per `(pair, indicator)`; immutable
/// thereafter.
///
/// Indicator rows have `modifier_name == ""`; modifier rows set `modifier_name` to
/// `"rare_signature"` or `"mime_type_mismatch"` and set `first_seen_historical` to the Unix
/// epoch as a sentinel marking "this is a modifier row, not an indicator row".
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ThreatMixtape {
    pub hash: Fingerprint,
    pub src: IpAddr,
    pub src_nuid: NetworkId,
    pub dst: Option<IpAddr>,
    pub dst_nuid: Option<NetworkId>,
    pub fqdn: Option<String>,
    pub beacon_type: BeaconType,

    pub beacon_score: Option<f64>,
    pub ts_score: Option<f64>,
    pub ds_score: Option<f64>,
    pub dur_score: Option<f64>,
    pub hist_score: Option<f64>,
    pub beacon_threat_score: f64,

    pub long_conn_score: f64,
    pub strobe_score: f64,
    pub c2_over_dns_score: f64,
    pub c2_over_dns_direct_conn_score: f64,
    pub threat_intel_score: f64,
    pub threat_intel_data_size_score: f64,
    pub prevalence_score: f64,
    pub first_seen_score: f64,
    pub missing_host_header_score: f64,

    pub modifier_name: String,
    pub modifier_value: String,
    pub modifier_score: f64,

    pub port_proto_service: Vec<PortProtoService>,
    pub server_ips: Vec<IpAddr>,
    pub proxy_ips: Vec<IpAddr>,

    pub analyzed_at: DateTime<Utc>,
    pub first_seen_historical: DateTime<Utc>,
    pub import_id: uuid::Uuid,
}

impl ThreatMixtape {
    /// Sentinel `first_seen_historical` used by modifier rows.
    pub fn modifier_epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).expect("epoch zero is always representable")
    }

    pub fn is_modifier_row(&self) -> bool {
        !self.modifier_name.is_empty()
    }
}

/// Per-pair aggregate produced by the Amalgamator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FinalMixtapeKey {
    pub src: IpAddr,
    pub src_nuid: NetworkId,
    pub dst: Option<IpAddr>,
    pub dst_nuid: Option<NetworkId>,
    pub fqdn: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FinalMixtape {
    pub key: FinalMixtapeKey,
    pub hash: Fingerprint,
    pub import_id: uuid::Uuid,
    pub analyzed_at: DateTime<Utc>,

    pub base_score: f64,
    pub total_modifier_score: f64,
    pub final_score: f64,

    pub beacon_threat_score: f64,
    pub long_conn_score: f64,
    pub strobe_score: f64,
    pub c2_over_dns_score: f64,
    pub threat_intel_score: f64,
    pub prevalence_score: f64,
    pub first_seen_score: f64,
    pub missing_host_header_score: f64,
    pub threat_intel_data_size_score: f64,
    pub c2_over_dns_direct_conn_score: f64,

    pub port_proto_service: Vec<PortProtoService>,
    pub server_ips: Vec<IpAddr>,
    pub proxy_ips: Vec<IpAddr>,
}
