//! Aggregation source: the read side. Three parameterized views (SNI, IP, DNS) each stream
//! `AnalysisResult` rows out of Postgres.

use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt as _;
use ipnetwork::IpNetwork;
use rita_types::{AnalysisResult, BeaconType, Error, Fingerprint, NetworkId, PortProtoService, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Parameters shared by all three views.
#[derive(Clone, Debug)]
pub struct QueryParams {
    pub min_ts: u32,
    pub max_ts: u32,
    pub network_size: u32,
    pub unique_connection_threshold: u64,
    pub use_historical: bool,
    pub long_connection_base_threshold: f64,
    pub subdomain_threshold: u64,
}

/// Read side of the pipeline's external store dependency.
#[async_trait]
pub trait AggregationSource: Send + Sync {
    async fn sni_view(&self, params: &QueryParams) -> Result<BoxStream<'_, Result<AnalysisResult>>>;
    async fn ip_view(&self, params: &QueryParams) -> Result<BoxStream<'_, Result<AnalysisResult>>>;
    async fn dns_view(&self, params: &QueryParams) -> Result<BoxStream<'_, Result<AnalysisResult>>>;
}

pub struct PgAggregationSource {
    pool: PgPool,
}

impl PgAggregationSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw row shape returned by every view; converted into `AnalysisResult` by [`TryFrom`].
///
/// `dns` rows leave `ts_list`/`bytes_list` empty rather than `NULL`.
#[derive(sqlx::FromRow)]
struct AnalysisResultRow {
    hash: Vec<u8>,
    src: IpAddr,
    src_nuid: Uuid,
    fqdn: Option<String>,
    dst: Option<IpAddr>,
    dst_nuid: Option<Uuid>,
    beacon_type: i16,
    count: i64,
    proxy_count: i64,
    open_count: i64,
    ts_unique: i64,
    ts_list: Vec<i64>,
    bytes_list: Vec<f64>,
    total_duration: f64,
    total_bytes: f64,
    port_proto_service: sqlx::types::Json<Vec<PortProtoService>>,
    first_seen_historical: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    server_ips: Vec<IpAddr>,
    proxy_ips: Vec<IpAddr>,
    prevalence_total: i32,
    tld: Option<String>,
    subdomain_count: i64,
    on_threat_intel: bool,
    has_c2_direct_conns_mod: bool,
    missing_host_count: i32,
    src_net: Option<IpNetwork>,
    dst_net: Option<IpNetwork>,
}

impl AnalysisResultRow {
    fn into_analysis_result(self, network_size: u32) -> Result<AnalysisResult> {
        let hash: [u8; 16] = self
            .hash
            .try_into()
            .map_err(|v: Vec<u8>| Error::InvalidConfig(format!("hash column is {} bytes, expected 16", v.len())))?;
        let beacon_type = match self.beacon_type {
            0 => BeaconType::Ip,
            1 => BeaconType::Sni,
            2 => BeaconType::Dns,
            other => return Err(Error::InvalidConfig(format!("unknown beacon_type discriminant {other}"))),
        };
        let prevalence = if network_size == 0 {
            0.0
        } else {
            self.prevalence_total as f64 / network_size as f64
        };

        Ok(AnalysisResult {
            hash: Fingerprint(hash),
            src: self.src,
            src_nuid: NetworkId(self.src_nuid),
            fqdn: self.fqdn,
            dst: self.dst,
            dst_nuid: self.dst_nuid.map(NetworkId),
            beacon_type,
            count: self.count.max(0) as u64,
            proxy_count: self.proxy_count.max(0) as u64,
            open_count: self.open_count.max(0) as u64,
            ts_unique: self.ts_unique.max(0) as u64,
            ts_list: self.ts_list.into_iter().map(|t| t.max(0) as u32).collect(),
            bytes_list: self.bytes_list,
            total_duration: self.total_duration,
            total_bytes: self.total_bytes,
            port_proto_service: self.port_proto_service.0,
            first_seen_historical: self.first_seen_historical,
            last_seen: self.last_seen,
            server_ips: self.server_ips,
            proxy_ips: self.proxy_ips,
            prevalence_total: self.prevalence_total.max(0) as u32,
            prevalence,
            tld: self.tld,
            subdomain_count: self.subdomain_count.max(0) as u64,
            on_threat_intel: self.on_threat_intel,
            has_c2_direct_conns_mod: self.has_c2_direct_conns_mod,
            missing_host_count: self.missing_host_count.max(0) as u32,
            src_net: self.src_net,
            dst_net: self.dst_net,
        })
    }
}

const SNI_VIEW_SQL: &str = r#"
SELECT hash, src, src_nuid, fqdn, dst, dst_nuid, 1::smallint AS beacon_type,
       count, proxy_count, open_count, ts_unique, ts_list, bytes_list,
       total_duration, total_bytes, port_proto_service, first_seen_historical, last_seen,
       server_ips, proxy_ips, prevalence_total, tld, subdomain_count,
       on_threat_intel, has_c2_direct_conns_mod, missing_host_count, src_net, dst_net
FROM sni_aggregates
WHERE ts_first >= $1 AND ts_first < $2 AND unique_conn_threshold_met($3)
"#;

const IP_VIEW_SQL: &str = r#"
SELECT hash, src, src_nuid, NULL::text AS fqdn, dst, dst_nuid, 0::smallint AS beacon_type,
       count, proxy_count, open_count, ts_unique, ts_list, bytes_list,
       total_duration, total_bytes, port_proto_service, first_seen_historical, last_seen,
       server_ips, proxy_ips, prevalence_total, NULL::text AS tld, 0::bigint AS subdomain_count,
       on_threat_intel, has_c2_direct_conns_mod, missing_host_count, src_net, dst_net
FROM ip_aggregates
WHERE ts_first >= $1 AND ts_first < $2
  AND conn_id NOT IN (
      SELECT conn_id FROM sni_aggregates
      WHERE (ts_unique >= $3 AND count < 86400) OR total_duration >= $4
  )
"#;

const DNS_VIEW_SQL: &str = r#"
SELECT hash, src, src_nuid, fqdn, NULL::inet AS dst, NULL::uuid AS dst_nuid, 2::smallint AS beacon_type,
       count, proxy_count, open_count, 0::bigint AS ts_unique,
       ARRAY[]::bigint[] AS ts_list, ARRAY[]::double precision[] AS bytes_list,
       0.0::double precision AS total_duration, 0.0::double precision AS total_bytes,
       port_proto_service, first_seen_historical, last_seen,
       server_ips, proxy_ips, prevalence_total, tld, subdomain_count,
       on_threat_intel, has_c2_direct_conns_mod, 0::int AS missing_host_count, src_net, dst_net
FROM dns_aggregates
WHERE ts_first >= $1 AND ts_first < $2 AND subdomain_count >= $3
"#;

fn to_analysis_result_stream<'a>(
    rows: BoxStream<'a, std::result::Result<AnalysisResultRow, sqlx::Error>>,
    network_size: u32,
) -> BoxStream<'a, Result<AnalysisResult>> {
    Box::pin(rows.map_err(Error::from).and_then(move |row| {
        futures::future::ready(row.into_analysis_result(network_size))
    }))
}

#[async_trait]
impl AggregationSource for PgAggregationSource {
    async fn sni_view(&self, params: &QueryParams) -> Result<BoxStream<'_, Result<AnalysisResult>>> {
        let rows = sqlx::query_as::<_, AnalysisResultRow>(SNI_VIEW_SQL)
            .bind(params.min_ts as i64)
            .bind(params.max_ts as i64)
            .bind(params.unique_connection_threshold as i64)
            .fetch(&self.pool);
        Ok(to_analysis_result_stream(Box::pin(rows), params.network_size))
    }

    async fn ip_view(&self, params: &QueryParams) -> Result<BoxStream<'_, Result<AnalysisResult>>> {
        let rows = sqlx::query_as::<_, AnalysisResultRow>(IP_VIEW_SQL)
            .bind(params.min_ts as i64)
            .bind(params.max_ts as i64)
            .bind(params.unique_connection_threshold as i64)
            .bind(params.long_connection_base_threshold)
            .fetch(&self.pool);
        Ok(to_analysis_result_stream(Box::pin(rows), params.network_size))
    }

    async fn dns_view(&self, params: &QueryParams) -> Result<BoxStream<'_, Result<AnalysisResult>>> {
        let rows = sqlx::query_as::<_, AnalysisResultRow>(DNS_VIEW_SQL)
            .bind(params.min_ts as i64)
            .bind(params.max_ts as i64)
            .bind(params.subdomain_threshold as i64)
            .fetch(&self.pool);
        Ok(to_analysis_result_stream(Box::pin(rows), params.network_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_hash_length() {
        let row = AnalysisResultRow {
            hash: vec![0u8; 8],
            src: "10.0.0.1".parse().unwrap(),
            src_nuid: Uuid::nil(),
            fqdn: None,
            dst: None,
            dst_nuid: None,
            beacon_type: 0,
            count: 1,
            proxy_count: 0,
            open_count: 0,
            ts_unique: 1,
            ts_list: vec![],
            bytes_list: vec![],
            total_duration: 0.0,
            total_bytes: 0.0,
            port_proto_service: sqlx::types::Json(vec![]),
            first_seen_historical: Utc::now(),
            last_seen: Utc::now(),
            server_ips: vec![],
            proxy_ips: vec![],
            prevalence_total: 0,
            tld: None,
            subdomain_count: 0,
            on_threat_intel: false,
            has_c2_direct_conns_mod: false,
            missing_host_count: 0,
            src_net: None,
            dst_net: None,
        };
        assert!(row.into_analysis_result(100).is_err());
    }
}
