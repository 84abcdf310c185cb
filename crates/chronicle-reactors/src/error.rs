//! Error type shared by the reactive modules.

use chronicle_bus::BusError;

use crate::store::ReactorError;

/// Errors surfaced by a reactive module's public operations.
///
/// Bus-handler paths never surface these to the dispatcher; a reaction
/// that fails is logged and skipped so sibling handlers still run.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The module's persistence port failed.
    #[error("store failure: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: ReactorError,
    },

    /// A secondary publication was rejected by a bus guard.
    #[error("publish failure: {source}")]
    Publish {
        /// The underlying bus error.
        #[from]
        source: BusError,
    },
}
