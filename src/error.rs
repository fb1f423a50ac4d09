//! Error taxonomy for the map core and its host.
//!
//! `MapError` is what the core reports. Fatal classes end up as
//! `LoadState::Error`, cluster expansion failures are only logged.
//! `HostError` is what a host primitive reports back to the core.

use thiserror::Error;

/// Errors produced by the map core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    /// Host construction failed (missing container, invalid style document)
    #[error("map could not be initialized: {0}")]
    Initialization(String),

    /// Base style or tiles failed to load
    #[error("map style failed to load: {0}")]
    StyleLoad(String),

    /// Source/layer creation conflicted with the host and the retry failed too
    #[error("layer registration failed for source '{source_id}': {reason}")]
    LayerRegistration { source_id: String, reason: String },

    /// Expansion zoom lookup failed or referenced stale data
    #[error("cluster expansion failed: {0}")]
    ClusterExpansion(String),

    /// A layer operation was requested while the host is not ready
    #[error("map is not ready (state: {0})")]
    NotReady(String),

    /// Options rejected before anything was applied
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// Feature data violates the collection invariants
    #[error("invalid feature data: {0}")]
    InvalidFeatures(String),
}

impl MapError {
    /// Fatal errors are surfaced as `LoadState::Error`
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MapError::Initialization(_) | MapError::StyleLoad(_) | MapError::LayerRegistration { .. }
        )
    }
}

/// Errors reported by host primitives
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("container '{0}' is not available")]
    ContainerUnavailable(String),

    #[error("invalid style: {0}")]
    InvalidStyle(String),

    #[error("source '{0}' already exists")]
    DuplicateSource(String),

    #[error("source '{0}' does not exist")]
    SourceNotFound(String),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("layer '{0}' does not exist")]
    LayerNotFound(String),

    #[error("source '{source_id}' is still used by layers {layers:?}")]
    SourceInUse { source_id: String, layers: Vec<String> },

    #[error("no cluster with id {0}")]
    UnknownCluster(u64),

    #[error("map instance has been removed")]
    Removed,
}

impl HostError {
    /// Removal of something that is not there
    pub fn is_not_found(&self) -> bool {
        matches!(self, HostError::SourceNotFound(_) | HostError::LayerNotFound(_))
    }
}
