//! Top-level task-group orchestration: wires the Spagooper, the analyzer worker pool, the two
//! modifier detectors, and the Amalgamator behind one shared cancellation token.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indicatif::MultiProgress;
use log::info;
use rita_config::Config;
use rita_store::{AggregationSource, HttpExtensions, MixtapeSink, ModifierSource, QueryParams};
use rita_types::Result;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::tee_sink::TeeSink;
use crate::{amalgamator, analyzer, modifiers, spagooper};

pub struct PipelineInputs {
    pub aggregation_source: Arc<dyn AggregationSource>,
    pub modifier_source: Arc<dyn ModifierSource>,
    pub sink: Arc<dyn MixtapeSink>,
    pub config: Arc<Config>,
    pub http_extensions: Arc<HttpExtensions>,
    pub min_ts: u32,
    pub max_ts: u32,
    pub import_id: Uuid,
}

/// Runs one full import end to end: fan out, score, modify, amalgamate, flush. The first stage
/// to fail cancels every other stage; their errors are collected and the first one is returned.
pub async fn run(inputs: PipelineInputs, analyzed_at: DateTime<Utc>) -> Result<()> {
    let PipelineInputs {
        aggregation_source,
        modifier_source,
        sink,
        config,
        http_extensions,
        min_ts,
        max_ts,
        import_id,
    } = inputs;

    let tee = Arc::new(TeeSink::new(sink));
    let tee_as_sink: Arc<dyn MixtapeSink> = tee.clone();

    let cancel = CancellationToken::new();
    let progress = MultiProgress::new();

    let params = QueryParams {
        min_ts,
        max_ts,
        network_size: config.network.network_size,
        unique_connection_threshold: config.aggregation.unique_connection_threshold,
        use_historical: config.aggregation.use_historical,
        long_connection_base_threshold: config.aggregation.long_connection_base_threshold,
        subdomain_threshold: config.aggregation.subdomain_threshold,
    };

    let dispatcher = spagooper::spagoop(
        aggregation_source,
        params,
        config.channel_capacity,
        cancel.clone(),
        &progress,
    );

    let analyzer_fut = analyzer::run(
        dispatcher.receiver,
        tee_as_sink.clone(),
        config.clone(),
        min_ts,
        max_ts,
        import_id,
        analyzed_at,
        cancel.clone(),
        config.analyzer_workers,
    );

    let rare_signature_fut = modifiers::run_rare_signature_detector(
        modifier_source.clone(),
        tee_as_sink.clone(),
        Arc::new(config.modifiers.clone()),
        import_id,
        cancel.clone(),
    );
    let mime_mismatch_fut = modifiers::run_mime_mismatch_detector(
        modifier_source,
        tee_as_sink.clone(),
        Arc::new(config.modifiers.clone()),
        http_extensions,
        import_id,
        cancel.clone(),
    );

    let (dispatch_result, analyzer_result, rare_result, mime_result) =
        tokio::join!(dispatcher.handle, analyzer_fut, rare_signature_fut, mime_mismatch_fut);

    dispatch_result.map_err(|e| rita_types::Error::InvalidConfig(format!("spagooper task panicked: {e}")))??;
    analyzer_result?;
    rare_result?;
    mime_result?;

    info!("analyzer and modifier stages complete, amalgamating");
    let rows = tee.take_rows().await;
    let finals = amalgamator::amalgamate(&rows, import_id, analyzed_at);
    info!("amalgamated {} pairs from {} rows", finals.len(), rows.len());

    for row in finals {
        tee_as_sink.write_final_row(row).await?;
    }
    tee_as_sink.close().await
}
