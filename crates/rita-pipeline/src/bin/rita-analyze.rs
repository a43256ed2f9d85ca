//! CLI entry point: loads configuration, opens the database pool, and runs one full import.

#![deny(unused_import_braces, unused_qualifications)]

use std::str::FromStr as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use color_eyre::eyre::Result;
use rita_config::{CliArgs, Config};
use rita_pipeline::PipelineInputs;
use rita_store::{HttpExtensions, PgAggregationSource, PgMixtapeWriter, PgModifierSource};
use sqlx::postgres::PgConnectOptions;
use sqlx::ConnectOptions as _;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args: CliArgs = clap::Parser::parse();
    let config = Config::load(&args.config)?;

    let min_ts = args.min_ts.ok_or_else(|| {
        color_eyre::eyre::eyre!("--min-ts is required until a historical-window lookup is wired up")
    })?;
    let max_ts = args.max_ts.ok_or_else(|| {
        color_eyre::eyre::eyre!("--max-ts is required until a historical-window lookup is wired up")
    })?;
    let import_id = args.import_id.unwrap_or_else(uuid::Uuid::new_v4);

    let http_extensions = Arc::new(HttpExtensions::load(&config.http_extensions_csv_path)?);

    let mut pgoptions =
        PgConnectOptions::from_str(&config.database_url)?.application_name("rita-analyze");
    pgoptions
        .log_statements(log::LevelFilter::Debug)
        .log_slow_statements(log::LevelFilter::Warn, Duration::new(5, 0));
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.analyzer_workers as u32 + 4)
        .acquire_timeout(Duration::new(30, 0))
        .test_before_acquire(true)
        .connect_with(pgoptions)
        .await?;

    let inputs = PipelineInputs {
        aggregation_source: Arc::new(PgAggregationSource::new(pool.clone())),
        modifier_source: Arc::new(PgModifierSource::new(pool.clone())),
        sink: Arc::new(PgMixtapeWriter::new(pool)),
        config: Arc::new(config),
        http_extensions,
        min_ts,
        max_ts,
        import_id,
    };

    rita_pipeline::run(inputs, Utc::now()).await?;
    Ok(())
}
