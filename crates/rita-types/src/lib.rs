//! Shared data model for the beacon-scoring pipeline: the records that flow between the
//! aggregation source, the analyzer, the modifier stage, and the amalgamator.

#![deny(unused_import_braces, unused_qualifications)]

mod analysis_result;
mod beacon;
mod error;
mod fingerprint;
mod mixtape;
mod network_id;
mod thresholds;

pub use analysis_result::{AnalysisResult, BeaconType, PortProtoService};
pub use beacon::Beacon;
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FingerprintParseError};
pub use mixtape::{FinalMixtape, FinalMixtapeKey, ThreatMixtape};
pub use network_id::NetworkId;
pub use thresholds::{BeaconConfig, BeaconWeights, IndicatorThresholds, Modifiers, ScoreThresholds};
