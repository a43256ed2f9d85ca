/// Error kinds shared across the beacon-scoring pipeline.
///
/// Per-record data-quality errors ([`Error::InsufficientTimestamps`],
/// [`Error::InsufficientDataPoints`], [`Error::InvalidDatasetTimeRange`]) are meant to be
/// logged and the record skipped. [`Error::InvalidConfig`], [`Error::IterationCancelled`], and
/// [`Error::WriteFailed`] are pipeline-shape errors that cancel the whole run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("beacon config invalid: {0}")]
    InvalidConfig(String),

    #[error("dataset time range invalid: min_ts {min_ts} >= max_ts {max_ts}")]
    InvalidDatasetTimeRange { min_ts: u32, max_ts: u32 },

    #[error("insufficient timestamps: need >= 4 points and >= 3 non-zero deltas, got {0}")]
    InsufficientTimestamps(usize),

    #[error("insufficient data points: need >= 3, got {0}")]
    InsufficientDataPoints(usize),

    #[error("iteration cancelled")]
    IterationCancelled,

    #[error("write failed after {attempts} attempts: {source}")]
    WriteFailed {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
