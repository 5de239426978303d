//! Per-peer SINR measurement table
//!
//! ```text
//! peer#1 ─┬─ (tx=0, rx=0) → [b0, b1, ...] avg
//!         ├─ (tx=1, rx=0) → ...
//!         └─ ...
//! peer#2 ─── ...
//! ```
//!
//! Both levels are ordered maps so scans (best pair, ranking) visit entries
//! in a deterministic order.

use crate::types::{BeamId, BeamPairCandidate, BeamPairKey, PeerId, SinrSample};
use std::collections::BTreeMap;
use tracing::debug;

/// Measured SINR per beam pair, for one peer.
pub type PeerMeasurements = BTreeMap<BeamPairKey, SinrSample>;

#[derive(Debug, Clone, Default)]
pub struct SinrMeasurementStore {
    peers: BTreeMap<PeerId, PeerMeasurements>,
}

impl SinrMeasurementStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the sample for `(tx, rx)` of `peer`.
    pub fn add_sinr(&mut self, peer: PeerId, tx: BeamId, rx: BeamId, sample: SinrSample) {
        self.peers
            .entry(peer)
            .or_default()
            .insert(BeamPairKey::new(tx, rx), sample);
    }

    /// Drop every measurement. Known peers stay registered with empty tables.
    pub fn clear_all(&mut self) {
        for table in self.peers.values_mut() {
            table.clear();
        }
        debug!(peers = self.peers.len(), "Cleared SINR measurements");
    }

    /// Highest-`avg` pair over all peers.
    ///
    /// Ties keep the first pair visited. Returns the null sentinel when
    /// nothing has been measured.
    pub fn best_across_all(&self) -> BeamPairCandidate {
        let mut best = BeamPairCandidate::null();
        for (&peer, table) in &self.peers {
            if let Some(candidate) = best_in(peer, table) {
                if candidate.avg_sinr > best.avg_sinr {
                    best = candidate;
                }
            }
        }
        best
    }

    /// Highest-`avg` pair of one peer, if it has any measurement.
    pub fn best_for(&self, peer: PeerId) -> Option<BeamPairCandidate> {
        self.peers.get(&peer).and_then(|table| best_in(peer, table))
    }

    /// Measurements of one peer.
    pub fn peer(&self, peer: PeerId) -> Option<&PeerMeasurements> {
        self.peers.get(&peer)
    }

    /// Sample for one pair of one peer.
    pub fn get(&self, peer: PeerId, key: BeamPairKey) -> Option<&SinrSample> {
        self.peers.get(&peer).and_then(|t| t.get(&key))
    }

    /// Iterate over peers and their tables, in peer order.
    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerMeasurements)> {
        self.peers.iter()
    }

    /// Number of stored samples over all peers.
    pub fn len(&self) -> usize {
        self.peers.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn best_in(peer: PeerId, table: &PeerMeasurements) -> Option<BeamPairCandidate> {
    let mut best: Option<(&BeamPairKey, &SinrSample)> = None;
    for (key, sample) in table {
        match best {
            Some((_, b)) if sample.avg() <= b.avg() => {}
            _ => best = Some((key, sample)),
        }
    }
    best.map(|(key, sample)| BeamPairCandidate::measured(peer, *key, sample.clone()))
}
