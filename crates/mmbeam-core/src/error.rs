//! Beam management error types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for beam management operations
pub type BeamResult<T> = Result<T, BeamError>;

/// Errors surfaced by the beam management engine.
///
/// Invalid strategy parameters, lookup misses and malformed codebook tokens
/// are recovered in place and never show up here.
#[derive(Error, Debug)]
pub enum BeamError {
    /// Codebook file does not exist
    #[error("Codebook file not found: {}", path.display())]
    CodebookNotFound { path: PathBuf },

    /// Codebook file exists but could not be read
    #[error("Failed to read codebook: {0}")]
    CodebookRead(#[from] io::Error),

    /// Codebook loaded but holds no beams
    #[error("Codebook {} contains no beams", path.display())]
    EmptyCodebook { path: PathBuf },

    /// Reporting or burst-set period outside the enumerated set
    #[error("Invalid period {0} ms (expected one of 0, 1, 5, 10, 20, 40, 80, 160)")]
    InvalidReportingPeriod(u16),

    /// Beam index past the end of the codebook
    #[error("Beam index {index} out of range for codebook of {size} beams")]
    BeamOutOfRange { index: usize, size: usize },

    /// SS block slot index past the end of the burst pattern
    #[error("SS block slot {slot} out of range for burst pattern of length {pattern_len}")]
    BurstSlotOutOfRange { slot: u16, pattern_len: usize },

    /// Burst timing requested on a pattern with no entries
    #[error("SS burst pattern is empty")]
    EmptyBurstPattern,

    /// Configuration parse or validation failure
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BeamError {
    /// Configuration errors stop the engine at startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BeamError::CodebookNotFound { .. }
                | BeamError::CodebookRead(_)
                | BeamError::EmptyCodebook { .. }
                | BeamError::InvalidReportingPeriod(_)
                | BeamError::Config(_)
        )
    }

    /// Usage errors reported by individual calls (bad index, bad slot).
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            BeamError::BeamOutOfRange { .. }
                | BeamError::BurstSlotOutOfRange { .. }
                | BeamError::EmptyBurstPattern
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let e = BeamError::CodebookNotFound {
            path: PathBuf::from("missing.txt"),
        };
        assert!(e.is_fatal());
        assert!(!e.is_usage_error());
        assert_eq!(e.to_string(), "Codebook file not found: missing.txt");

        let e = BeamError::BurstSlotOutOfRange {
            slot: 64,
            pattern_len: 64,
        };
        assert!(e.is_usage_error());
        assert!(!e.is_fatal());
    }
}
