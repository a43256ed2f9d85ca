//! External store access: the aggregation source (read), the mixtape sink (write), the modifier
//! queries, and the HTTP-extensions lookup table.

#![deny(unused_import_braces, unused_qualifications)]

mod http_extensions;
mod modifiers;
mod sink;
mod source;

pub use http_extensions::HttpExtensions;
pub use modifiers::{MimeMismatchHit, ModifierSource, PgModifierSource, RareSignatureHit};
pub use sink::{MixtapeSink, PgMixtapeWriter};
pub use source::{AggregationSource, PgAggregationSource, QueryParams};
