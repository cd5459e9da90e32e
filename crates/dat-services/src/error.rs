//! Errors surfaced by the DAT context.
//!
//! Cache and dissemination failures are handled where they happen and never
//! show up here; only setup problems do.

use dat_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum DatError {
    #[error("no tokio runtime available to run the purge task: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
