//! Synthetic beamforming channel
//!
//! A single line-of-sight path per link, described by its departure and
//! arrival directions in *beam units* on each side's grid: direction
//! `(3.0, 1.0)` on the transmit grid is exactly where beam `1 * width + 3`
//! points; `(3.4, 1.0)` falls between beams 3 and 4 of row 1.
//!
//! The gain of a beam pair is the product of the two array gains
//!
//! ```text
//! G(tx, rx) = |w_tx^H a_tx|^2 · |w_rx^H a_rx|^2        (each in [0, 1])
//! SINR      = peak · G + floor                          (linear, per band)
//! ```
//!
//! where `a` is the planar-array steering vector of the path direction and
//! `w` the codebook weights. Each band is then scaled by log-normal jitter
//! (`band_jitter_db` standard deviation) drawn from a seeded generator.

use crate::error::{SimError, SimResult};
use mmbeam_core::{
    BeamId, BeamPairCandidate, BeamPairKey, ChannelModel, Codebook, GridGeometry, PeerId,
    SinrSample,
};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::debug;

/// Channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Frequency bands per SINR sample
    pub num_bands: usize,
    /// SINR of a perfectly aligned pair, in dB
    pub peak_sinr_db: f64,
    /// Linear SINR floor added to every pair
    pub floor: f64,
    /// Per-band log-normal jitter, in dB (0 disables noise)
    pub band_jitter_db: f64,
    /// Random seed (`None` seeds from entropy)
    pub seed: Option<u64>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            num_bands: 4,
            peak_sinr_db: 25.0,
            floor: 0.01,
            band_jitter_db: 1.0,
            seed: Some(42),
        }
    }
}

impl ChannelConfig {
    /// Noise-free channel
    pub fn ideal() -> Self {
        Self {
            band_jitter_db: 0.0,
            ..Default::default()
        }
    }

    pub fn peak_linear(&self) -> f64 {
        10f64.powf(self.peak_sinr_db / 10.0)
    }
}

/// Departure/arrival directions of one link, in beam units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkPath {
    /// `(azimuth, elevation)` on the transmit grid
    pub tx_direction: (f64, f64),
    /// `(azimuth, elevation)` on the receive grid
    pub rx_direction: (f64, f64),
}

impl LinkPath {
    /// Path aligned exactly with the given beams.
    pub fn aligned(tx: BeamId, rx: BeamId, tx_grid: GridGeometry, rx_grid: GridGeometry) -> Self {
        let (tr, tc) = tx_grid.position(tx);
        let (rr, rc) = rx_grid.position(rx);
        Self {
            tx_direction: (tc as f64, tr as f64),
            rx_direction: (rc as f64, rr as f64),
        }
    }

    /// Move both directions, wrapping around the grids.
    pub fn rotate(&mut self, d_tx: (f64, f64), d_rx: (f64, f64), tx_grid: GridGeometry, rx_grid: GridGeometry) {
        self.tx_direction = wrap(self.tx_direction, d_tx, tx_grid);
        self.rx_direction = wrap(self.rx_direction, d_rx, rx_grid);
    }
}

fn wrap(dir: (f64, f64), delta: (f64, f64), grid: GridGeometry) -> (f64, f64) {
    (
        (dir.0 + delta.0).rem_euclid(grid.width.max(1) as f64),
        (dir.1 + delta.1).rem_euclid(grid.height.max(1) as f64),
    )
}

/// Steering vector of a planar array for a direction in beam units.
///
/// Element order matches the Kronecker codebooks (vertical index outer).
pub fn steering_vector(direction: (f64, f64), grid: GridGeometry) -> Vec<Complex64> {
    let h = grid.width.max(1) as usize;
    let v = grid.height.max(1) as usize;
    let norm = 1.0 / ((h * v) as f64).sqrt();
    let mut a = Vec::with_capacity(h * v);
    for ev in 0..v {
        for eh in 0..h {
            let phase =
                -2.0 * PI * (direction.0 * eh as f64 / h as f64 + direction.1 * ev as f64 / v as f64);
            a.push(Complex64::from_polar(norm, phase));
        }
    }
    a
}

/// `|w^H a|^2`
pub fn array_gain(weights: &[Complex64], steering: &[Complex64]) -> f64 {
    weights
        .iter()
        .zip(steering)
        .map(|(w, a)| w.conj() * a)
        .sum::<Complex64>()
        .norm_sqr()
}

/// Line-of-sight beamforming channel with seeded per-band jitter.
#[derive(Debug)]
pub struct SyntheticBeamChannel {
    config: ChannelConfig,
    tx_codebook: Arc<Codebook>,
    rx_codebook: Arc<Codebook>,
    tx_grid: GridGeometry,
    rx_grid: GridGeometry,
    paths: BTreeMap<PeerId, LinkPath>,
    steered: BTreeMap<PeerId, BeamPairKey>,
    jitter: Option<Normal<f64>>,
    rng: StdRng,
}

impl SyntheticBeamChannel {
    pub fn new(
        config: ChannelConfig,
        tx_codebook: Arc<Codebook>,
        rx_codebook: Arc<Codebook>,
        tx_grid: GridGeometry,
        rx_grid: GridGeometry,
    ) -> SimResult<Self> {
        if config.num_bands == 0 {
            return Err(SimError::InvalidScenario("num_bands must be > 0".to_string()));
        }
        let jitter = if config.band_jitter_db > 0.0 {
            let normal = Normal::new(0.0, config.band_jitter_db)
                .map_err(|e| SimError::InvalidScenario(format!("band_jitter_db: {}", e)))?;
            Some(normal)
        } else {
            None
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            config,
            tx_codebook,
            rx_codebook,
            tx_grid,
            rx_grid,
            paths: BTreeMap::new(),
            steered: BTreeMap::new(),
            jitter,
            rng,
        })
    }

    /// Set the propagation path towards `peer`.
    pub fn set_path(&mut self, peer: PeerId, path: LinkPath) {
        self.paths.insert(peer, path);
    }

    pub fn path(&self, peer: PeerId) -> Option<&LinkPath> {
        self.paths.get(&peer)
    }

    /// Rotate the path towards `peer` (user or scatterer movement).
    pub fn drift(&mut self, peer: PeerId, d_tx: (f64, f64), d_rx: (f64, f64)) -> SimResult<()> {
        let (tx_grid, rx_grid) = (self.tx_grid, self.rx_grid);
        let path = self.paths.get_mut(&peer).ok_or(SimError::UnknownPeer(peer))?;
        path.rotate(d_tx, d_rx, tx_grid, rx_grid);
        Ok(())
    }

    /// Noise-free gain of a pair, in `[0, 1]`.
    pub fn pair_gain(&self, peer: PeerId, pair: BeamPairKey) -> f64 {
        let Some(path) = self.paths.get(&peer) else {
            return 0.0;
        };
        let (Ok(w_tx), Ok(w_rx)) = (self.tx_codebook.vector(pair.tx), self.rx_codebook.vector(pair.rx)) else {
            return 0.0;
        };
        let a_tx = steering_vector(path.tx_direction, self.tx_grid);
        let a_rx = steering_vector(path.rx_direction, self.rx_grid);
        array_gain(w_tx, &a_tx) * array_gain(w_rx, &a_rx)
    }

    /// Pair with the highest noise-free gain towards `peer`.
    pub fn optimal_pair(&self, peer: PeerId) -> Option<BeamPairKey> {
        if !self.paths.contains_key(&peer) {
            return None;
        }
        let mut best: Option<(BeamPairKey, f64)> = None;
        for tx in 0..self.tx_codebook.len() as BeamId {
            for rx in 0..self.rx_codebook.len() as BeamId {
                let key = BeamPairKey::new(tx, rx);
                let gain = self.pair_gain(peer, key);
                if best.map_or(true, |(_, g)| gain > g) {
                    best = Some((key, gain));
                }
            }
        }
        best.map(|(key, _)| key)
    }

    /// Pair the link towards `peer` is currently steered to.
    pub fn steered_pair(&self, peer: PeerId) -> Option<BeamPairKey> {
        self.steered.get(&peer).copied()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl ChannelModel for SyntheticBeamChannel {
    fn compute_sinr(&mut self, peer: PeerId, pair: BeamPairKey) -> SinrSample {
        if !self.paths.contains_key(&peer) {
            debug!(peer = %peer, "No path towards peer, reporting floor SINR");
        }
        let mean = self.config.peak_linear() * self.pair_gain(peer, pair) + self.config.floor;
        let bands = (0..self.config.num_bands)
            .map(|_| match &self.jitter {
                Some(normal) => mean * 10f64.powf(normal.sample(&mut self.rng) / 10.0),
                None => mean,
            })
            .collect();
        SinrSample::new(bands)
    }

    fn update_bf_channel_matrix(&mut self, peer: PeerId, pair: &BeamPairCandidate) {
        debug!(peer = %peer, tx = pair.tx_beam, rx = pair.rx_beam, "Beamforming matrix updated");
        self.steered.insert(peer, pair.key());
    }
}
