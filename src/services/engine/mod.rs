pub mod aggregate;
pub mod error;
pub mod filter;
pub mod normalizer;
pub mod sanitizer;
pub mod types;

pub use aggregate::{aggregate, rank, totals};
pub use error::{EngineError, NormalizationFailure};
pub use filter::{filter, FilterOutcome};
pub use normalizer::normalize;
pub use sanitizer::{sanitize, sanitize_table, Dataset, SanitizeReport};
pub use types::*;
