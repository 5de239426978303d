//! # Configuration System
//!
//! YAML configuration for a beam manager node:
//!
//! - Candidate list strategy (`strategy`, `alpha`, `beta`, `memory`, cap)
//! - CSI reporting period
//! - Codebook files and beam grid geometry per side
//! - SS burst numerology and burst-set period
//! - Logging
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `MMBEAM_CONFIG` environment variable
//! 2. `./mmbeam.yaml` (current directory)
//! 3. `~/.config/mmbeam/config.yaml` (user config)
//! 4. `/etc/mmbeam/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! candidates:
//!   strategy: 3
//!   alpha: 2
//!   memory: false
//!   max_num_beam_pair_candidates: 20
//!
//! reporting:
//!   period_ms: 10
//!   sync_mode: replace
//!
//! codebooks:
//!   tx_path: "codebooks/KronCodebook16h4v.txt"
//!   rx_path: "codebooks/KronCodebook8h2v.txt"
//!
//! burst:
//!   scs: Scs120KHz
//!   set_period_ms: 20
//! ```

use crate::burst::{BurstTiming, Periodicity, SubcarrierSpacing};
use crate::sync::SyncMode;
use crate::candidate::StrategyParams;
use crate::error::{BeamError, BeamResult};
use crate::observe::LogConfig;
use crate::sweep::SweepSide;
use crate::types::GridGeometry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Candidate list strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Strategy id (0-5); anything else falls back to 2
    pub strategy: u16,
    /// Receive-side azimuth spacing for Alt3/Alt5
    pub alpha: u16,
    /// Transmit-side azimuth spacing for Alt4/Alt5
    pub beta: u16,
    /// Keep SS measurements across sweeps
    pub memory: bool,
    /// List cap for the SINR-ranked strategy
    pub max_num_beam_pair_candidates: u16,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            strategy: 2,
            alpha: 2,
            beta: 4,
            memory: true,
            max_num_beam_pair_candidates: 20,
        }
    }
}

/// CSI reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Reporting period in ms (0, 1, 5, 10, 20, 40, 80 or 160)
    pub period_ms: u16,
    /// Margin used when checking which CSI resources are due, in µs
    pub margin_us: u64,
    /// How the peer folds pushed tracking lists into its registry
    pub sync_mode: SyncMode,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            margin_us: 0,
            sync_mode: SyncMode::Replace,
        }
    }
}

/// Codebook files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodebookConfig {
    pub tx_path: PathBuf,
    pub rx_path: PathBuf,
}

impl Default for CodebookConfig {
    fn default() -> Self {
        Self {
            tx_path: SweepSide::Transmit.default_codebook_path(),
            rx_path: SweepSide::Receive.default_codebook_path(),
        }
    }
}

/// Beam grid geometry per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub tx: GridGeometry,
    pub rx: GridGeometry,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            tx: GridGeometry::default_tx(),
            rx: GridGeometry::default_rx(),
        }
    }
}

/// SS burst settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    pub scs: SubcarrierSpacing,
    /// Use the standard SS block pattern (otherwise every slot carries a block)
    pub pattern_enabled: bool,
    /// Burst-set period in ms
    pub set_period_ms: u16,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            scs: SubcarrierSpacing::Scs120KHz,
            pattern_enabled: true,
            set_period_ms: 20,
        }
    }
}

/// Complete beam manager configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamConfig {
    pub candidates: CandidateConfig,
    pub reporting: ReportingConfig,
    pub codebooks: CodebookConfig,
    pub grid: GridConfig,
    pub burst: BurstConfig,
    pub logging: LogConfig,
}

impl BeamConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the default configuration if no file is found.
    pub fn load() -> BeamResult<Self> {
        if let Ok(path) = std::env::var("MMBEAM_CONFIG") {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> BeamResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BeamError::Config(format!("{}: {}", path.display(), e)))?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> BeamResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| BeamError::Config(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> BeamResult<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| BeamError::Config(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| BeamError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./mmbeam.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "mmbeam") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/mmbeam/config.yaml"));
        paths
    }

    /// Check the settings that cannot be recovered at runtime.
    pub fn validate(&self) -> BeamResult<()> {
        self.reporting_period()?;
        self.burst_set_period()?;
        if self.grid.tx.num_beams() == 0 || self.grid.rx.num_beams() == 0 {
            return Err(BeamError::Config("beam grids must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn reporting_period(&self) -> BeamResult<Periodicity> {
        Periodicity::try_from(self.reporting.period_ms)
    }

    pub fn burst_set_period(&self) -> BeamResult<Periodicity> {
        Periodicity::try_from(self.burst.set_period_ms)
    }

    /// SS burst timing for this configuration.
    pub fn burst_timing(&self) -> BeamResult<BurstTiming> {
        Ok(BurstTiming::new(
            self.burst.scs,
            self.burst.pattern_enabled,
            self.burst_set_period()?,
        ))
    }

    /// Strategy parameters after the recovery rules are applied.
    pub fn strategy_params(&self) -> StrategyParams {
        let c = &self.candidates;
        StrategyParams::normalized(
            c.strategy,
            c.alpha,
            c.beta,
            c.memory,
            c.max_num_beam_pair_candidates,
            self.grid.tx,
            self.grid.rx,
        )
    }

    /// Codebook file for one side.
    pub fn codebook_path(&self, side: SweepSide) -> &Path {
        match side {
            SweepSide::Transmit => &self.codebooks.tx_path,
            SweepSide::Receive => &self.codebooks.rx_path,
        }
    }

    /// Grid geometry for one side.
    pub fn grid(&self, side: SweepSide) -> GridGeometry {
        match side {
            SweepSide::Transmit => self.grid.tx,
            SweepSide::Receive => self.grid.rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Strategy;

    #[test]
    fn test_default_config() {
        let config = BeamConfig::default();
        assert_eq!(config.candidates.strategy, 2);
        assert_eq!(config.candidates.max_num_beam_pair_candidates, 20);
        assert_eq!(config.reporting_period().unwrap(), Periodicity::Ms10);
        assert_eq!(config.grid.tx, GridGeometry::new(16, 4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
candidates:
  strategy: 5
  alpha: 3
  beta: 6
  memory: false

reporting:
  period_ms: 40

codebooks:
  tx_path: "/tmp/tx.txt"

burst:
  scs: Scs240KHz
  set_period_ms: 5
"#;

        let config = BeamConfig::parse(yaml).unwrap();
        assert!(config.validate().is_ok());
        let params = config.strategy_params();
        assert_eq!(params.strategy, Strategy::Alt5);
        assert_eq!((params.alpha, params.beta), (3, 6));
        assert!(!params.memory);
        assert_eq!(config.reporting_period().unwrap(), Periodicity::Ms40);
        assert_eq!(config.codebook_path(SweepSide::Transmit), Path::new("/tmp/tx.txt"));
        // Defaults should be applied
        assert_eq!(
            config.codebook_path(SweepSide::Receive),
            Path::new("codebooks/KronCodebook8h2v.txt")
        );
        assert_eq!(config.burst_timing().unwrap().pattern.len(), 64);
    }

    #[test]
    fn test_validation_rejects_bad_period() {
        let mut config = BeamConfig::default();
        config.reporting.period_ms = 15;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, BeamError::InvalidReportingPeriod(15)));
        assert!(err.is_fatal());

        config.reporting.period_ms = 10;
        config.burst.set_period_ms = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = BeamConfig::parse("candidates: [1, 2").unwrap_err();
        assert!(matches!(err, BeamError::Config(_)));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("mmbeam_config_roundtrip.yaml");
        let mut config = BeamConfig::default();
        config.candidates.strategy = 1;
        config.reporting.period_ms = 80;
        config.save(&path).unwrap();

        let loaded = BeamConfig::load_from(&path).unwrap();
        assert_eq!(loaded.candidates.strategy, 1);
        assert_eq!(loaded.reporting.period_ms, 80);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_config_search_paths() {
        let paths = BeamConfig::config_search_paths();
        assert!(!paths.is_empty());
        assert!(paths[0].ends_with("mmbeam.yaml"));
    }
}
