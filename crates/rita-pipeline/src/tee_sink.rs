//! Decorator that mirrors every indicator row into an in-memory buffer so the amalgamator can
//! fold the whole run's output without a read-back query.

use std::sync::Arc;

use async_trait::async_trait;
use rita_store::MixtapeSink;
use rita_types::{FinalMixtape, Result, ThreatMixtape};
use tokio::sync::Mutex;

pub struct TeeSink {
    inner: Arc<dyn MixtapeSink>,
    buffer: Mutex<Vec<ThreatMixtape>>,
}

impl TeeSink {
    pub fn new(inner: Arc<dyn MixtapeSink>) -> Self {
        Self {
            inner,
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub async fn take_rows(&self) -> Vec<ThreatMixtape> {
        std::mem::take(&mut *self.buffer.lock().await)
    }
}

#[async_trait]
impl MixtapeSink for TeeSink {
    async fn write_indicator_row(&self, row: ThreatMixtape) -> Result<()> {
        self.buffer.lock().await.push(row.clone());
        self.inner.write_indicator_row(row).await
    }

    async fn write_final_row(&self, row: FinalMixtape) -> Result<()> {
        self.inner.write_final_row(row).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
