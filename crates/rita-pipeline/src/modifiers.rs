//! Modifier stage: two concurrent detectors sharing the rate-limited bulk writer.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt as _;
use rita_store::{HttpExtensions, MimeMismatchHit, MixtapeSink, ModifierSource, RareSignatureHit};
use rita_types::{Error, Modifiers, Result, ThreatMixtape};
use uuid::Uuid;

use crate::cancellation::CancellationToken;

pub async fn run_rare_signature_detector(
    modifier_source: Arc<dyn ModifierSource>,
    sink: Arc<dyn MixtapeSink>,
    modifiers: Arc<Modifiers>,
    import_id: Uuid,
    cancel: CancellationToken,
) -> Result<()> {
    let mut stream = modifier_source.rare_signatures(import_id).await?;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::IterationCancelled);
        }
        let next = tokio::select! {
            item = stream.next() => item,
            _ = cancel.cancelled() => return Err(Error::IterationCancelled),
        };
        match next {
            Some(Ok(hit)) => sink.write_indicator_row(rare_signature_row(hit, &modifiers, import_id)).await?,
            Some(Err(e)) => return Err(e),
            None => return Ok(()),
        }
    }
}

/// Unlike the rare-signature query, `ModifierSource::mime_mismatches` only joins candidate
/// `(mime_type, uri_extension)` pairs; whether the pair is actually a mismatch is decided here
/// against the static HTTP-extensions lookup table, since that table has no natural home in
/// Postgres.
pub async fn run_mime_mismatch_detector(
    modifier_source: Arc<dyn ModifierSource>,
    sink: Arc<dyn MixtapeSink>,
    modifiers: Arc<Modifiers>,
    http_extensions: Arc<HttpExtensions>,
    import_id: Uuid,
    cancel: CancellationToken,
) -> Result<()> {
    let mut stream = modifier_source.mime_mismatches(import_id).await?;
    loop {
        if cancel.is_cancelled() {
            return Err(Error::IterationCancelled);
        }
        let next = tokio::select! {
            item = stream.next() => item,
            _ = cancel.cancelled() => return Err(Error::IterationCancelled),
        };
        match next {
            Some(Ok(hit)) => {
                if http_extensions.is_mismatch(&hit.mime_type, &hit.uri_extension) {
                    sink.write_indicator_row(mime_mismatch_row(hit, &modifiers, import_id)).await?;
                }
            }
            Some(Err(e)) => return Err(e),
            None => return Ok(()),
        }
    }
}

fn empty_scores_row(
    hash: rita_types::Fingerprint,
    src: std::net::IpAddr,
    src_nuid: rita_types::NetworkId,
    dst: Option<std::net::IpAddr>,
    dst_nuid: Option<rita_types::NetworkId>,
    fqdn: Option<String>,
    beacon_type: rita_types::BeaconType,
    import_id: Uuid,
) -> ThreatMixtape {
    ThreatMixtape {
        hash,
        src,
        src_nuid,
        dst,
        dst_nuid,
        fqdn,
        beacon_type,
        beacon_score: None,
        ts_score: None,
        ds_score: None,
        dur_score: None,
        hist_score: None,
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
        modifier_name: String::new(),
        modifier_value: String::new(),
        modifier_score: 0.0,
        port_proto_service: vec![],
        server_ips: vec![],
        proxy_ips: vec![],
        analyzed_at: Utc::now(),
        // Sentinel marking "modifier row, not an indicator row".
        first_seen_historical: ThreatMixtape::modifier_epoch(),
        import_id,
    }
}

fn rare_signature_row(hit: RareSignatureHit, modifiers: &Modifiers, import_id: Uuid) -> ThreatMixtape {
    let mut row = empty_scores_row(
        hit.hash,
        hit.src,
        hit.src_nuid,
        hit.dst,
        hit.dst_nuid,
        hit.fqdn,
        hit.beacon_type,
        import_id,
    );
    row.modifier_name = "rare_signature".to_string();
    row.modifier_value = hit.signature;
    row.modifier_score = modifiers.rare_signature_score_increase;
    row
}

fn mime_mismatch_row(hit: MimeMismatchHit, modifiers: &Modifiers, import_id: Uuid) -> ThreatMixtape {
    let mut row = empty_scores_row(
        hit.hash,
        hit.src,
        hit.src_nuid,
        hit.dst,
        hit.dst_nuid,
        hit.fqdn,
        hit.beacon_type,
        import_id,
    );
    row.modifier_name = "mime_type_mismatch".to_string();
    row.modifier_value = format!("{}:{}", hit.mime_type, hit.uri_extension);
    row.modifier_score = modifiers.mime_type_mismatch_score_increase;
    row
}
