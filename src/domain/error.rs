//! Engine error taxonomy
//!
//! Only validation failures surface to callers as errors. Lookup misses are
//! modelled as `CheckoutOutcome::Ignored`, and storage failures are caught
//! and logged at the initiate/confirm/cancel/history boundaries (converted
//! to a failed checkout or an empty result), so neither appears here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed subject id or position sample. The only error raised
    /// synchronously to API callers.
    #[error("validation failed: {0}")]
    Validation(String),
}
