//! Tracing subscriber setup for binaries and tests embedding the crate

use tracing_subscriber::EnvFilter;

use crate::{BatchFlowError, Result};

/// Install a formatting subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"batchflow=info"`) when the variable is unset.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| BatchFlowError::Logging(e.to_string()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| BatchFlowError::Logging(e.to_string()))
}
