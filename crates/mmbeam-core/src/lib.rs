//! # mmWave Beam Management Core
//!
//! This crate implements the beam-management decision engine for directional
//! millimeter-wave links. For every remote peer it keeps a table of measured
//! SINR per transmit/receive beam pair, sweeps a fixed antenna codebook, ranks
//! candidate beam pairs into tracking lists, and keeps those lists refreshed
//! and synchronized with the peer.
//!
//! ## Overview
//!
//! - **Codebooks**: complex weight matrices, one row per beam ([`codebook`])
//! - **Beam sweep**: cyclic walk over the codebook, SS burst timing ([`sweep`], [`burst`])
//! - **Measurements**: per-peer SINR table ([`sinr`])
//! - **Candidate lists**: six ranking strategies, Alt0 to Alt5 ([`candidate`])
//! - **Tracking lists**: per-peer lists with refresh timers ([`registry`])
//! - **Synchronization**: lists pushed to the peer as messages ([`sync`])
//! - **Scheduling**: single-threaded discrete-event queue ([`scheduler`])
//!
//! ## Control Flow
//!
//! ```text
//! SS block ─► channel.compute_sinr ─► add_sinr ─► (sweep complete) update_best
//!                                                         │
//!                            TrackingListRegistry ◄───────┘
//!                                    │ notify_peers
//!                                    ▼
//!                     SyncMessage ─► peer.apply ─► CSI timers (expired / advance)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use mmbeam_core::{BeamConfig, BeamManager, PeerId, SinrSample, SweepSide};
//! use std::time::Duration;
//!
//! let mut config = BeamConfig::default();
//! config.candidates.strategy = 1;
//! config.candidates.max_num_beam_pair_candidates = 2;
//!
//! let gnb = PeerId(1);
//! let mut ue = BeamManager::new(PeerId(100), SweepSide::Receive, &config).unwrap();
//! ue.enable_reporting();
//! ue.add_sinr(gnb, 0, 0, SinrSample::flat(10.0));
//! ue.add_sinr(gnb, 1, 0, SinrSample::flat(15.0));
//! ue.add_sinr(gnb, 0, 1, SinrSample::flat(5.0));
//!
//! let outcome = ue.update_best(Duration::ZERO);
//! assert_eq!((outcome.best.tx_beam, outcome.best.rx_beam), (1, 0));
//! assert_eq!(ue.tracking_list(gnb).len(), 2);
//! ```

pub mod burst;
pub mod candidate;
pub mod channel;
pub mod codebook;
pub mod config;
pub mod error;
pub mod manager;
pub mod observe;
pub mod registry;
pub mod scheduler;
pub mod sinr;
pub mod sweep;
pub mod sync;
pub mod types;

pub use burst::{BurstTiming, Periodicity, SsBurstPattern, SsBurstScheduler, SubcarrierSpacing};
pub use candidate::{CandidateListBuilder, Strategy, StrategyParams};
pub use channel::ChannelModel;
pub use codebook::{parse_complex, Codebook};
pub use config::BeamConfig;
pub use error::{BeamError, BeamResult};
pub use manager::{BeamManager, CsiRefreshOutcome, UpdateOutcome};
pub use registry::{BeamTrackingList, TrackingListRegistry};
pub use scheduler::{EventScheduler, OwnerToken};
pub use sinr::SinrMeasurementStore;
pub use sweep::{BeamSweepCycle, SweepSide};
pub use sync::{PeerSynchronizer, SyncMessage, SyncMode};
pub use types::{
    BeamId, BeamPairCandidate, BeamPairKey, BeamVector, ComplexWeight, GridGeometry, PeerId,
    SinrSample,
};
