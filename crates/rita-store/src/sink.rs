//! Mixtape sink: the write side. Batches `ThreatMixtape`/`FinalMixtape` rows behind a
//! token-bucket rate limiter and flushes them as multi-row `INSERT`s, the same shape as
//! `netflow-import`'s `insert_entry` helper but batched instead of one row per call.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use log::{debug, warn};
use rita_types::{Error, FinalMixtape, Result, ThreatMixtape};
use sqlx::PgPool;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Write side of the pipeline's external store dependency.
#[async_trait]
pub trait MixtapeSink: Send + Sync {
    async fn write_indicator_row(&self, row: ThreatMixtape) -> Result<()>;
    async fn write_final_row(&self, row: FinalMixtape) -> Result<()>;
    async fn close(&self) -> Result<()>;
}

/// Flush a batch once it reaches this many buffered rows, even if the flush interval hasn't
/// elapsed yet.
const BATCH_SIZE: usize = 200;
const MAX_WRITE_ATTEMPTS: u32 = 3;

pub struct PgMixtapeWriter {
    pool: PgPool,
    limiter: Arc<DefaultRateLimiter>,
    indicator_buffer: tokio::sync::Mutex<Vec<ThreatMixtape>>,
    final_buffer: tokio::sync::Mutex<Vec<FinalMixtape>>,
}

impl PgMixtapeWriter {
    /// Rate limiter is a token bucket at rate=5, burst=5.
    pub fn new(pool: PgPool) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(5).unwrap()).allow_burst(NonZeroU32::new(5).unwrap());
        Self {
            pool,
            limiter: Arc::new(RateLimiter::direct(quota)),
            indicator_buffer: tokio::sync::Mutex::new(Vec::with_capacity(BATCH_SIZE)),
            final_buffer: tokio::sync::Mutex::new(Vec::with_capacity(BATCH_SIZE)),
        }
    }

    async fn flush_indicator_batch(&self, batch: Vec<ThreatMixtape>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.limiter.until_ready().await;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.insert_indicator_batch(&batch).await {
                Ok(()) => return Ok(()),
                Err(source) if attempts < MAX_WRITE_ATTEMPTS => {
                    warn!("mixtape insert failed (attempt {attempts}): {source}");
                    tokio::time::sleep(std::time::Duration::from_millis(100 * attempts as u64)).await;
                }
                Err(source) => {
                    return Err(Error::WriteFailed { attempts, source });
                }
            }
        }
    }

    async fn insert_indicator_batch(&self, batch: &[ThreatMixtape]) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for row in batch {
            sqlx::query(
                r#"INSERT INTO threat_mixtape
                   (hash, src, src_nuid, dst, dst_nuid, fqdn, beacon_type,
                    beacon_threat_score, long_conn_score, strobe_score, c2_over_dns_score,
                    threat_intel_score, prevalence_score, first_seen_score, missing_host_header_score,
                    modifier_name, modifier_value, modifier_score, analyzed_at, first_seen_historical,
                    import_id)
                   VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)"#,
            )
            .bind(row.hash.0.as_slice())
            .bind(row.src)
            .bind(row.src_nuid.0)
            .bind(row.dst)
            .bind(row.dst_nuid.map(|n| n.0))
            .bind(&row.fqdn)
            .bind(row.beacon_type as i16)
            .bind(row.beacon_threat_score)
            .bind(row.long_conn_score)
            .bind(row.strobe_score)
            .bind(row.c2_over_dns_score)
            .bind(row.threat_intel_score)
            .bind(row.prevalence_score)
            .bind(row.first_seen_score)
            .bind(row.missing_host_header_score)
            .bind(&row.modifier_name)
            .bind(&row.modifier_value)
            .bind(row.modifier_score)
            .bind(row.analyzed_at)
            .bind(row.first_seen_historical)
            .bind(row.import_id)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await?;
        debug!("flushed {} indicator rows", batch.len());
        Ok(())
    }

    async fn flush_final_batch(&self, batch: Vec<FinalMixtape>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.limiter.until_ready().await;
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.insert_final_batch(&batch).await {
                Ok(()) => return Ok(()),
                Err(source) if attempts < MAX_WRITE_ATTEMPTS => {
                    warn!("final mixtape insert failed (attempt {attempts}): {source}");
                    tokio::time::sleep(std::time::Duration::from_millis(100 * attempts as u64)).await;
                }
                Err(source) => return Err(Error::WriteFailed { attempts, source }),
            }
        }
    }

    async fn insert_final_batch(&self, batch: &[FinalMixtape]) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for row in batch {
            sqlx::query(
                r#"INSERT INTO final_mixtape
                   (hash, src, src_nuid, dst, dst_nuid, fqdn, import_id, analyzed_at,
                    base_score, total_modifier_score, final_score)
                   VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)"#,
            )
            .bind(row.hash.0.as_slice())
            .bind(row.key.src)
            .bind(row.key.src_nuid.0)
            .bind(row.key.dst)
            .bind(row.key.dst_nuid.map(|n| n.0))
            .bind(&row.key.fqdn)
            .bind(row.import_id)
            .bind(row.analyzed_at)
            .bind(row.base_score)
            .bind(row.total_modifier_score)
            .bind(row.final_score)
            .execute(&mut tx)
            .await?;
        }
        tx.commit().await?;
        debug!("flushed {} final rows", batch.len());
        Ok(())
    }
}

#[async_trait]
impl MixtapeSink for PgMixtapeWriter {
    async fn write_indicator_row(&self, row: ThreatMixtape) -> Result<()> {
        let batch = {
            let mut buffer = self.indicator_buffer.lock().await;
            buffer.push(row);
            if buffer.len() >= BATCH_SIZE {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };
        if let Some(batch) = batch {
            self.flush_indicator_batch(batch).await?;
        }
        Ok(())
    }

    async fn write_final_row(&self, row: FinalMixtape) -> Result<()> {
        let batch = {
            let mut buffer = self.final_buffer.lock().await;
            buffer.push(row);
            if buffer.len() >= BATCH_SIZE {
                Some(std::mem::take(&mut *buffer))
            } else {
                None
            }
        };
        if let Some(batch) = batch {
            self.flush_final_batch(batch).await?;
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let indicator_rest = std::mem::take(&mut *self.indicator_buffer.lock().await);
        self.flush_indicator_batch(indicator_rest).await?;
        let final_rest = std::mem::take(&mut *self.final_buffer.lock().await);
        self.flush_final_batch(final_rest).await?;
        Ok(())
    }
}
