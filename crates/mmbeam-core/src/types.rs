//! Core types for beam management
//!
//! This module defines the identifiers and measurement records shared by
//! every stage of the engine: beam indices, peer handles, SINR samples and
//! beam-pair candidates.
//!
//! ## Beam Grids
//!
//! A codebook of `width * height` beams is laid out as a grid. Beam `id`
//! sits at `row = id / width`, `col = id % width`:
//!
//! ```text
//!   col →   0    1    2   ...  15
//! row 0  [  0    1    2   ...  15 ]
//! row 1  [ 16   17   18   ...  31 ]
//! row 2  [ 32   33   34   ...  47 ]
//! row 3  [ 48   49   50   ...  63 ]
//! ```
//!
//! Neighbor math wraps on both axes (the grid is a torus).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single antenna weight.
pub type ComplexWeight = Complex64;

/// One beam's weight vector (one value per antenna element).
pub type BeamVector = Vec<ComplexWeight>;

/// Index of a beam inside a codebook, in `[0, codebook_size)`.
pub type BeamId = u16;

/// Opaque handle identifying a remote peer (a gNB or a UE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Key of a measured beam pair: `(tx_beam, rx_beam)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BeamPairKey {
    pub tx: BeamId,
    pub rx: BeamId,
}

impl BeamPairKey {
    pub const fn new(tx: BeamId, rx: BeamId) -> Self {
        Self { tx, rx }
    }
}

impl fmt::Display for BeamPairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(tx={}, rx={})", self.tx, self.rx)
    }
}

/// Geometry of one side's beam grid.
///
/// Transmit and receive sides have independent geometries (16×4 and 8×2 by
/// default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Beams per row (azimuth).
    pub width: u16,
    /// Number of rows (elevation).
    pub height: u16,
}

impl GridGeometry {
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Default transmit (gNB) grid: 16 azimuth × 4 elevation beams.
    pub const fn default_tx() -> Self {
        Self::new(16, 4)
    }

    /// Default receive (UE) grid: 8 azimuth × 2 elevation beams.
    pub const fn default_rx() -> Self {
        Self::new(8, 2)
    }

    /// Total number of beams on the grid.
    pub fn num_beams(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// `(row, col)` of a beam.
    #[inline]
    pub fn position(&self, beam: BeamId) -> (u16, u16) {
        (beam / self.width, beam % self.width)
    }

    /// Toroidal Manhattan distance between two beams on this grid.
    pub fn wrapped_distance(&self, a: BeamId, b: BeamId) -> u16 {
        let (ra, ca) = self.position(a);
        let (rb, cb) = self.position(b);
        let dc = ca.abs_diff(cb);
        let dr = ra.abs_diff(rb);
        dc.min(self.width.max(1) - dc) + dr.min(self.height.max(1) - dr)
    }
}

/// A per-frequency-band SINR measurement.
///
/// Band values are linear. `avg` is the arithmetic mean across bands and is
/// computed once on construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SinrSample {
    bands: Vec<f64>,
    avg: f64,
}

impl SinrSample {
    /// Build a sample from per-band values.
    pub fn new(bands: Vec<f64>) -> Self {
        let avg = if bands.is_empty() {
            0.0
        } else {
            bands.iter().sum::<f64>() / bands.len() as f64
        };
        Self { bands, avg }
    }

    /// A single-band sample.
    pub fn flat(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// A sample with no bands (value unknown).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Per-band values.
    pub fn bands(&self) -> &[f64] {
        &self.bands
    }

    /// Number of frequency bands.
    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    /// Mean SINR across bands.
    #[inline]
    pub fn avg(&self) -> f64 {
        self.avg
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// `avg_sinr` marker for a candidate whose pair has never been measured.
pub const UNKNOWN_SINR: f64 = -1.0;

/// One entry of a beam tracking list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamPairCandidate {
    /// Peer the pair belongs to. `None` only for the null sentinel.
    pub peer: Option<PeerId>,
    pub tx_beam: BeamId,
    pub rx_beam: BeamId,
    pub sinr: SinrSample,
    pub avg_sinr: f64,
}

impl BeamPairCandidate {
    /// A measured candidate.
    pub fn measured(peer: PeerId, key: BeamPairKey, sinr: SinrSample) -> Self {
        let avg_sinr = sinr.avg();
        Self {
            peer: Some(peer),
            tx_beam: key.tx,
            rx_beam: key.rx,
            sinr,
            avg_sinr,
        }
    }

    /// A candidate whose beam ids are known but whose SINR is not.
    pub fn unmeasured(peer: PeerId, key: BeamPairKey) -> Self {
        Self {
            peer: Some(peer),
            tx_beam: key.tx,
            rx_beam: key.rx,
            sinr: SinrSample::empty(),
            avg_sinr: UNKNOWN_SINR,
        }
    }

    /// The "nothing measured yet" sentinel.
    pub fn null() -> Self {
        Self {
            peer: None,
            tx_beam: 0,
            rx_beam: 0,
            sinr: SinrSample::empty(),
            avg_sinr: UNKNOWN_SINR,
        }
    }

    pub fn key(&self) -> BeamPairKey {
        BeamPairKey::new(self.tx_beam, self.rx_beam)
    }

    pub fn is_null(&self) -> bool {
        self.peer.is_none()
    }
}
