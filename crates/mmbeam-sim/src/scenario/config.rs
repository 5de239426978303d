//! Scenario configuration
//!
//! One gNB, one UE, a single propagation path between them, and the beam
//! management settings both nodes share.

use crate::channel::{ChannelConfig, LinkPath};
use crate::error::{SimError, SimResult};
use mmbeam_core::{BeamConfig, PeerId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Path rotation applied after every completed receive sweep, in beam units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PathDrift {
    pub tx: (f64, f64),
    pub rx: (f64, f64),
}

impl PathDrift {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration for the scenario engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    /// Simulated time in milliseconds
    pub duration_ms: u64,
    pub gnb: PeerId,
    pub ue: PeerId,
    /// Settings shared by both nodes
    pub beam: BeamConfig,
    pub channel: ChannelConfig,
    /// Path towards the gNB as seen by the UE
    pub path: LinkPath,
    pub drift: PathDrift,
    /// Generate Kronecker DFT codebooks instead of reading the codebook files
    pub generate_codebooks: bool,
    /// Start CSI reporting after the first successful sweep
    pub csi_reporting: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        let mut beam = BeamConfig::default();
        // two 120 kHz slots
        beam.reporting.margin_us = 250;
        Self {
            name: "single-link".to_string(),
            duration_ms: 1000,
            gnb: PeerId(1),
            ue: PeerId(100),
            beam,
            channel: ChannelConfig::default(),
            path: LinkPath {
                tx_direction: (5.0, 1.0), // tx beam 21 on 16x4
                rx_direction: (3.0, 1.0), // rx beam 11 on 8x2
            },
            drift: PathDrift::default(),
            generate_codebooks: true,
            csi_reporting: true,
        }
    }
}

impl ScenarioConfig {
    /// Load a scenario from a YAML file.
    pub fn load_from(path: &Path) -> SimResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SimError::InvalidScenario(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| SimError::InvalidScenario(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Simulated time one full receive sweep takes (one burst set per beam).
    pub fn sweep_duration(&self) -> SimResult<Duration> {
        let period = self.beam.burst_set_period()?.as_duration();
        Ok(period * self.beam.grid.rx.num_beams() as u32)
    }

    /// Number of full receive sweeps that fit in the run.
    pub fn expected_sweeps(&self) -> SimResult<u64> {
        let sweep = self.sweep_duration()?;
        if sweep.is_zero() {
            return Ok(0);
        }
        Ok((self.duration().as_nanos() / sweep.as_nanos()) as u64)
    }

    pub fn validate(&self) -> SimResult<()> {
        self.beam.validate()?;
        if self.gnb == self.ue {
            return Err(SimError::InvalidScenario("gNB and UE share an id".to_string()));
        }
        if !self.beam.burst.pattern_enabled {
            return Err(SimError::InvalidScenario(
                "SS block slots need the burst pattern enabled".to_string(),
            ));
        }
        if self.beam.burst_timing()?.pattern.is_empty() {
            return Err(SimError::InvalidScenario(format!(
                "no SS burst pattern for {:?}",
                self.beam.burst.scs
            )));
        }
        if self.beam.burst.set_period_ms == 0 {
            return Err(SimError::InvalidScenario("burst-set period must be > 0".to_string()));
        }
        if self.channel.num_bands == 0 {
            return Err(SimError::InvalidScenario("num_bands must be > 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmbeam_core::SubcarrierSpacing;

    #[test]
    fn test_default_config() {
        let cfg = ScenarioConfig::default();
        assert!(cfg.validate().is_ok());
        // 16 receive beams, one 20 ms burst set each
        assert_eq!(cfg.sweep_duration().unwrap(), Duration::from_millis(320));
        assert_eq!(cfg.expected_sweeps().unwrap(), 3);
        assert!(cfg.drift.is_zero());
    }

    #[test]
    fn test_validation() {
        let mut cfg = ScenarioConfig::default();
        cfg.ue = cfg.gnb;
        assert!(matches!(cfg.validate(), Err(SimError::InvalidScenario(_))));

        let mut cfg = ScenarioConfig::default();
        cfg.beam.burst.pattern_enabled = false;
        assert!(cfg.validate().is_err());

        for scs in [SubcarrierSpacing::Scs15KHz, SubcarrierSpacing::Scs480KHz] {
            let mut cfg = ScenarioConfig::default();
            cfg.beam.burst.scs = scs;
            assert!(matches!(cfg.validate(), Err(SimError::InvalidScenario(_))));
        }
        let mut cfg = ScenarioConfig::default();
        cfg.beam.burst.scs = SubcarrierSpacing::Scs60KHz;
        assert!(cfg.validate().is_ok());

        let mut cfg = ScenarioConfig::default();
        cfg.beam.reporting.period_ms = 7;
        assert!(matches!(cfg.validate(), Err(SimError::Beam(_))));
    }

    #[test]
    fn test_load_from_yaml() {
        let path = std::env::temp_dir().join("mmbeam_scenario.yaml");
        let yaml = r#"
name: drifting
duration_ms: 700
beam:
  candidates:
    strategy: 3
drift:
  tx: [1.0, 0.0]
  rx: [0.0, 0.0]
"#;
        std::fs::write(&path, yaml).unwrap();
        let cfg = ScenarioConfig::load_from(&path).unwrap();
        assert_eq!(cfg.name, "drifting");
        assert_eq!(cfg.duration(), Duration::from_millis(700));
        assert_eq!(cfg.beam.candidates.strategy, 3);
        assert_eq!(cfg.drift.tx, (1.0, 0.0));
        assert!(cfg.generate_codebooks);
        let _ = std::fs::remove_file(&path);
    }
}
