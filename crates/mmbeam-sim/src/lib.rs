//! # mmWave Beam Management Simulator
//!
//! Discrete-event driver for `mmbeam-core`. It stands in for the PHY/MAC
//! layers around the engine: it walks SS block slots, asks a synthetic
//! beamforming channel for SINR, triggers end-of-sweep updates, runs the
//! periodic CSI refresh, and carries synchronization messages between a gNB
//! and a UE.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mmbeam_sim::scenario::{ScenarioConfig, ScenarioEngine};
//!
//! let mut engine = ScenarioEngine::new(ScenarioConfig::default()).unwrap();
//! let report = engine.run().unwrap();
//! println!("best pair: {:?}", report.best_pair);
//! ```

pub mod channel;
pub mod error;
pub mod scenario;

pub use channel::{ChannelConfig, LinkPath, SyntheticBeamChannel};
pub use error::{SimError, SimResult};
pub use scenario::{ScenarioConfig, ScenarioEngine, ScenarioReport};
