use std::path::PathBuf;

/// Command-line surface for `rita-analyze`, matching the `#[derive(clap::Parser)]` style
/// already used by `param-grid-search`/`param-evasion`.
#[derive(Debug, clap::Parser)]
#[command(name = "rita-analyze", about = "Beacon-scoring analysis pipeline")]
pub struct CliArgs {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "rita.toml")]
    pub config: PathBuf,

    /// Window start, Unix seconds. Overrides any value derived from the database.
    #[arg(long)]
    pub min_ts: Option<u32>,

    /// Window end, Unix seconds. Overrides any value derived from the database.
    #[arg(long)]
    pub max_ts: Option<u32>,

    /// Import identifier to tag every written row with. Generated if omitted.
    #[arg(long)]
    pub import_id: Option<uuid::Uuid>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long)]
    pub quiet: bool,
}
