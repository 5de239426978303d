//! Simulation error types

use mmbeam_core::{BeamError, PeerId};
use thiserror::Error;

/// Result type for scenario operations
pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    /// Engine configuration or usage failure
    #[error(transparent)]
    Beam(#[from] BeamError),

    /// Scenario parameters that cannot be simulated
    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    /// Channel queried for a link it does not model
    #[error("No propagation path towards {0}")]
    UnknownPeer(PeerId),
}

impl SimError {
    /// Whether the run cannot start at all.
    pub fn is_fatal(&self) -> bool {
        match self {
            SimError::Beam(e) => e.is_fatal(),
            SimError::InvalidScenario(_) => true,
            SimError::UnknownPeer(_) => false,
        }
    }
}
