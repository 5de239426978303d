//! Single-link beam management scenarios
//!
//! A gNB sweeps its transmit codebook over SS blocks while a UE holds one
//! receive beam per burst set. After a full receive sweep the UE picks its
//! best pair, starts CSI reporting, and pushes its tracking list to the gNB.

pub mod config;
pub mod engine;

pub use config::{PathDrift, ScenarioConfig};
pub use engine::{ScenarioEngine, ScenarioReport};
