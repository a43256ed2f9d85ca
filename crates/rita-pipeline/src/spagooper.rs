//! Spagooper: the fan-out dispatcher. Three parallel producers (SNI, IP, DNS) pull
//! `AnalysisResult`s from the aggregation source and push them onto one channel; progress bars
//! track each producer's completion (IDs 1=SNI, 2=IP, 3=DNS).

use std::fmt;
use std::sync::Arc;

use futures::StreamExt as _;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::error;
use rita_store::{AggregationSource, QueryParams};
use rita_types::{AnalysisResult, Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::cancellation::CancellationToken;

/// Styled the same way as `param-grid-search`'s progress bars.
pub fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{elapsed_precise} ETA: {eta_precise} {wide_bar} {pos}/{len} {percent}%")
        .expect("progress template is valid")
        .progress_chars("##-")
}

#[derive(Copy, Clone, Debug)]
enum ViewKind {
    Sni,
    Ip,
    Dns,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewKind::Sni => "sni",
            ViewKind::Ip => "ip",
            ViewKind::Dns => "dns",
        };
        f.write_str(s)
    }
}

/// The receiving half of the dispatch channel, plus a handle that resolves once every producer
/// has finished (successfully, or because the group was cancelled).
pub struct Dispatcher {
    pub receiver: mpsc::Receiver<AnalysisResult>,
    pub handle: tokio::task::JoinHandle<Result<()>>,
}

pub fn spagoop(
    source: Arc<dyn AggregationSource>,
    params: QueryParams,
    channel_capacity: usize,
    cancel: CancellationToken,
    progress: &MultiProgress,
) -> Dispatcher {
    let (tx, rx) = mpsc::channel(channel_capacity);

    let mut producers = JoinSet::new();
    for kind in [ViewKind::Sni, ViewKind::Ip, ViewKind::Dns] {
        let bar = progress.add(ProgressBar::new_spinner());
        bar.set_style(progress_style());
        bar.set_message(kind.to_string());
        producers.spawn(produce(source.clone(), params.clone(), kind, tx.clone(), cancel.clone(), bar));
    }
    // Every producer holds its own clone; dropping this one lets the channel close once all
    // three finish.
    drop(tx);

    let handle = tokio::spawn(async move {
        let mut first_err = None;
        while let Some(joined) = producers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!("spagooper producer failed: {e}");
                    cancel.cancel();
                    first_err.get_or_insert(e);
                }
                Err(join_err) => {
                    error!("spagooper producer task panicked: {join_err}");
                    cancel.cancel();
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    Dispatcher { receiver: rx, handle }
}

async fn produce(
    source: Arc<dyn AggregationSource>,
    params: QueryParams,
    kind: ViewKind,
    tx: mpsc::Sender<AnalysisResult>,
    cancel: CancellationToken,
    bar: ProgressBar,
) -> Result<()> {
    let mut stream = match kind {
        ViewKind::Sni => source.sni_view(&params).await?,
        ViewKind::Ip => source.ip_view(&params).await?,
        ViewKind::Dns => source.dns_view(&params).await?,
    };

    loop {
        if cancel.is_cancelled() {
            return Err(Error::IterationCancelled);
        }
        let next = tokio::select! {
            item = stream.next() => item,
            _ = cancel.cancelled() => return Err(Error::IterationCancelled),
        };
        match next {
            Some(Ok(record)) => {
                bar.inc(1);
                if tx.send(record).await.is_err() {
                    // Analyzer pool has shut down; nothing left to feed.
                    break;
                }
            }
            Some(Err(e)) => {
                bar.abandon_with_message(format!("{kind} view failed"));
                return Err(e);
            }
            None => break,
        }
    }
    bar.finish_with_message(format!("{kind} done"));
    Ok(())
}
