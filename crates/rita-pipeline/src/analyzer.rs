//! Worker pool that drains the Spagooper channel: each worker scores one `AnalysisResult` at a
//! time using `rita-beacon`, derives its indicator row, and writes it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, warn};
use rita_beacon::{analyze, derive_indicator_row};
use rita_config::Config;
use rita_store::MixtapeSink;
use rita_types::{AnalysisResult, BeaconType, Error, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::cancellation::CancellationToken;

/// Drains `receiver` with `worker_count` concurrent tasks sharing it behind a `Mutex`, mirroring
/// the `futures::stream::...buffer_unordered(n)` shape `param-grid-search` uses for concurrent
/// inserts, but expressed as an explicit pool since the work here is per-message rather than
/// per-future.
pub async fn run(
    receiver: mpsc::Receiver<AnalysisResult>,
    sink: Arc<dyn MixtapeSink>,
    config: Arc<Config>,
    min_ts: u32,
    max_ts: u32,
    import_id: Uuid,
    analyzed_at: DateTime<Utc>,
    cancel: CancellationToken,
    worker_count: usize,
) -> Result<()> {
    let receiver = Arc::new(Mutex::new(receiver));
    let mut workers = JoinSet::new();

    for worker_id in 0..worker_count {
        let receiver = receiver.clone();
        let sink = sink.clone();
        let config = config.clone();
        let cancel = cancel.clone();
        workers.spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    return Err(Error::IterationCancelled);
                }
                let record = receiver.lock().await.recv().await;
                let Some(record) = record else {
                    return Ok(());
                };
                if let Err(e) =
                    process_one(&record, &sink, &config, min_ts, max_ts, import_id, analyzed_at).await
                {
                    error!("analyzer worker {worker_id} aborting on {}: {e}", record.hash);
                    return Err(e);
                }
            }
        });
    }

    let mut first_err = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                cancel.cancel();
                first_err.get_or_insert(e);
            }
            Err(join_err) => {
                cancel.cancel();
                error!("analyzer worker panicked: {join_err}");
            }
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn process_one(
    record: &AnalysisResult,
    sink: &Arc<dyn MixtapeSink>,
    config: &Config,
    min_ts: u32,
    max_ts: u32,
    import_id: Uuid,
    analyzed_at: DateTime<Utc>,
) -> Result<()> {
    // Strobes suppress the beacon row; dns records carry no beacon math inputs.
    let beacon = if record.is_strobe() || record.beacon_type == BeaconType::Dns {
        None
    } else {
        match analyze(record, &config.beacon, min_ts, max_ts) {
            Ok(beacon) => Some(beacon),
            Err(Error::InsufficientTimestamps(n)) => {
                warn!("{}: insufficient timestamps ({n}), skipping beacon score", record.hash);
                None
            }
            Err(Error::InsufficientDataPoints(n)) => {
                warn!("{}: insufficient data points ({n}), skipping beacon score", record.hash);
                None
            }
            Err(Error::InvalidDatasetTimeRange { min_ts, max_ts }) => {
                warn!(
                    "{}: invalid dataset time range (min_ts {min_ts} >= max_ts {max_ts}), skipping beacon score",
                    record.hash
                );
                None
            }
            Err(e) => return Err(e),
        }
    };

    let row = derive_indicator_row(
        record,
        beacon.as_ref(),
        &config.beacon,
        &config.thresholds,
        &config.modifiers,
        analyzed_at,
        import_id,
    );
    sink.write_indicator_row(row).await
}
