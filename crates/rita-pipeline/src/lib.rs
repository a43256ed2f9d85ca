//! Orchestration crate wiring `rita-beacon`, `rita-config`, and `rita-store` into one pipeline
//! run.

#![deny(unused_import_braces, unused_qualifications)]

mod amalgamator;
mod analyzer;
mod cancellation;
mod modifiers;
mod pipeline;
mod spagooper;
mod tee_sink;

pub use cancellation::CancellationToken;
pub use pipeline::{run, PipelineInputs};
