//! # Candidate Beam-Pair Lists
//!
//! Builds, per peer, the ordered list of beam pairs to keep tracking after a
//! sweep. Six strategies are available:
//!
//! | Strategy | List contents                                                  |
//! |----------|----------------------------------------------------------------|
//! | Alt0     | every measured pair of the peer (exhaustive)                   |
//! | Alt1     | top-K measured pairs by average SINR, descending               |
//! | Alt2     | best pair, then tx-neighbors × rx-neighbors                    |
//! | Alt3     | Alt2 with extra rx beams spaced `alpha` apart in azimuth       |
//! | Alt4     | Alt2 with extra tx beams spaced `beta` apart in azimuth        |
//! | Alt5     | Alt3 and Alt4 extensions together                              |
//!
//! ## Neighborhoods
//!
//! Neighbors are taken on a toroidal grid (`row = id / width`,
//! `col = id % width`), in the order same, right, left, up, down:
//!
//! ```text
//!            up
//!             ▲
//!   left ◄── beam ──► right
//!             ▼
//!           down
//! ```
//!
//! Up is only present when the grid has more than one row, down only when it
//! has more than two (with two rows, up and down are the same beam).
//!
//! Alt2..Alt5 enumerate a fixed neighborhood and are not truncated, so their
//! lists can be longer than `max_candidates`. Pairs without a measurement are
//! listed with `avg_sinr == -1` and an empty sample.

use crate::burst::Periodicity;
use crate::registry::{BeamTrackingList, TrackingListRegistry};
use crate::sinr::{best_in, PeerMeasurements, SinrMeasurementStore};
use crate::types::{BeamId, BeamPairCandidate, BeamPairKey, GridGeometry, PeerId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Candidate cap forced by the exhaustive strategy.
pub const EXHAUSTIVE_MAX_CANDIDATES: u16 = 1024;

/// Fallback receive-side spacing.
pub const DEFAULT_ALPHA: u16 = 2;

/// Fallback transmit-side spacing.
pub const DEFAULT_BETA: u16 = 4;

/// Candidate list strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Alt0,
    Alt1,
    Alt2,
    Alt3,
    Alt4,
    Alt5,
}

impl Strategy {
    /// Map a numeric strategy id. Unknown ids fall back to Alt2.
    pub fn from_id(id: u16) -> Self {
        match id {
            0 => Strategy::Alt0,
            1 => Strategy::Alt1,
            2 => Strategy::Alt2,
            3 => Strategy::Alt3,
            4 => Strategy::Alt4,
            5 => Strategy::Alt5,
            other => {
                warn!(strategy = other, "Unrecognized candidate list strategy, using Alt2");
                Strategy::Alt2
            }
        }
    }

    pub fn id(&self) -> u16 {
        match self {
            Strategy::Alt0 => 0,
            Strategy::Alt1 => 1,
            Strategy::Alt2 => 2,
            Strategy::Alt3 => 3,
            Strategy::Alt4 => 4,
            Strategy::Alt5 => 5,
        }
    }

    fn extends_rx(&self) -> bool {
        matches!(self, Strategy::Alt3 | Strategy::Alt5)
    }

    fn extends_tx(&self) -> bool {
        matches!(self, Strategy::Alt4 | Strategy::Alt5)
    }
}

/// Strategy selection and tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub strategy: Strategy,
    /// Receive-side azimuth spacing (Alt3, Alt5).
    pub alpha: u16,
    /// Transmit-side azimuth spacing (Alt4, Alt5).
    pub beta: u16,
    /// Keep measurements across sweeps (cumulative) instead of clearing them.
    pub memory: bool,
    /// Maximum list length for Alt1.
    pub max_candidates: u16,
}

impl StrategyParams {
    /// Apply the recovery rules for inconsistent parameters.
    ///
    /// - unknown strategy id: Alt2
    /// - Alt0: memory on, cap raised to [`EXHAUSTIVE_MAX_CANDIDATES`]
    /// - Alt1: memory off
    /// - Alt3/Alt5 with `alpha` past the last rx column: `alpha = 2`
    /// - Alt4/Alt5 with `beta` past the last tx column: `beta = 4`
    pub fn normalized(
        strategy_id: u16,
        alpha: u16,
        beta: u16,
        memory: bool,
        max_candidates: u16,
        tx_grid: GridGeometry,
        rx_grid: GridGeometry,
    ) -> Self {
        let mut params = Self {
            strategy: Strategy::from_id(strategy_id),
            alpha,
            beta,
            memory,
            max_candidates,
        };

        match params.strategy {
            Strategy::Alt0 => {
                params.memory = true;
                params.max_candidates = EXHAUSTIVE_MAX_CANDIDATES;
            }
            Strategy::Alt1 => params.memory = false,
            _ => {}
        }

        if params.strategy.extends_rx() && alpha >= rx_grid.width {
            warn!(alpha, max = rx_grid.width.saturating_sub(1), "Invalid alpha, using {}", DEFAULT_ALPHA);
            params.alpha = DEFAULT_ALPHA;
        }
        if params.strategy.extends_tx() && beta >= tx_grid.width {
            warn!(beta, max = tx_grid.width.saturating_sub(1), "Invalid beta, using {}", DEFAULT_BETA);
            params.beta = DEFAULT_BETA;
        }
        params
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            strategy: Strategy::Alt2,
            alpha: DEFAULT_ALPHA,
            beta: DEFAULT_BETA,
            memory: true,
            max_candidates: 20,
        }
    }
}

/// Toroidal neighbors of `beam`: same, right, left, then up and down when the
/// grid is tall enough.
pub fn side_immediate_neighbors(beam: BeamId, width: u16, height: u16) -> Vec<BeamId> {
    let width = width.max(1);
    let height = height.max(1);
    let row = beam / width;
    let col = beam % width;

    let mut beams = vec![
        beam,
        row * width + (col + 1) % width,
        row * width + (width + col - 1) % width,
    ];
    if height > 1 {
        beams.push(col + ((row + 1) % height) * width);
        if height > 2 {
            beams.push(col + ((height + row - 1) % height) * width);
        }
    }
    beams
}

/// Beams on the same row as `optimal`, at azimuth offsets
/// `alpha, 2·alpha, ...` below `width`.
///
/// `alpha == 0` yields nothing.
pub fn alpha_spaced_azimuth_beams(optimal: BeamId, alpha: u16, width: u16) -> Vec<BeamId> {
    let mut beams = Vec::new();
    if alpha == 0 || width == 0 {
        return beams;
    }
    let row = optimal / width;
    let col = optimal % width;
    let mut offset = alpha;
    while offset < width {
        beams.push(row * width + (col + offset) % width);
        offset += alpha;
    }
    beams
}

/// Builds per-peer tracking lists from the measurement table.
#[derive(Debug, Clone)]
pub struct CandidateListBuilder {
    params: StrategyParams,
    tx_grid: GridGeometry,
    rx_grid: GridGeometry,
    reporting_period: Periodicity,
}

impl CandidateListBuilder {
    pub fn new(
        params: StrategyParams,
        tx_grid: GridGeometry,
        rx_grid: GridGeometry,
        reporting_period: Periodicity,
    ) -> Self {
        Self {
            params,
            tx_grid,
            rx_grid,
            reporting_period,
        }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn set_memory(&mut self, memory: bool) {
        self.params.memory = memory;
    }

    pub fn reporting_period(&self) -> Periodicity {
        self.reporting_period
    }

    /// Select the global best pair, cache it, and (with reporting on)
    /// rebuild every peer's tracking list into `registry`.
    ///
    /// The cache is only overwritten by a pair that belongs to a peer, so a
    /// cleared store never erases the last known best.
    pub fn build_and_find_best(
        &self,
        store: &SinrMeasurementStore,
        best_cache: &mut BeamPairCandidate,
        registry: &mut TrackingListRegistry,
        reporting_enabled: bool,
        now: Duration,
    ) -> BeamPairCandidate {
        let best = store.best_across_all();
        if !best.is_null() {
            *best_cache = best.clone();
        }
        if reporting_enabled {
            self.build_all(store, best_cache, registry, now);
        }
        best
    }

    /// Rebuild the tracking list of every peer in `store`.
    pub fn build_all(
        &self,
        store: &SinrMeasurementStore,
        best: &BeamPairCandidate,
        registry: &mut TrackingListRegistry,
        now: Duration,
    ) {
        for (&peer, table) in store.iter() {
            match self.build(peer, table, best) {
                Some(candidates) => {
                    debug!(
                        peer = %peer,
                        strategy = ?self.params.strategy,
                        candidates = candidates.len(),
                        "Rebuilt tracking list"
                    );
                    let list = BeamTrackingList::new(
                        candidates,
                        self.params.max_candidates,
                        self.reporting_period,
                    );
                    registry.replace(peer, list, now);
                }
                None => debug!(peer = %peer, "No measured pair, tracking list left as is"),
            }
        }
    }

    /// Candidate list of one peer under the configured strategy.
    ///
    /// Returns `None` when a neighbor strategy has no best pair to anchor on.
    pub fn build(
        &self,
        peer: PeerId,
        table: &PeerMeasurements,
        best: &BeamPairCandidate,
    ) -> Option<Vec<BeamPairCandidate>> {
        match self.params.strategy {
            Strategy::Alt0 => Some(self.exhaustive(peer, table)),
            Strategy::Alt1 => Some(self.sinr_ranked(peer, table)),
            strategy => {
                let anchor = anchor_for(peer, table, best)?;
                let mut tx_beams =
                    side_immediate_neighbors(anchor.tx_beam, self.tx_grid.width, self.tx_grid.height);
                let mut rx_beams =
                    side_immediate_neighbors(anchor.rx_beam, self.rx_grid.width, self.rx_grid.height);
                if strategy.extends_rx() {
                    rx_beams.extend(alpha_spaced_azimuth_beams(
                        anchor.rx_beam,
                        self.params.alpha,
                        self.rx_grid.width,
                    ));
                }
                if strategy.extends_tx() {
                    tx_beams.extend(alpha_spaced_azimuth_beams(
                        anchor.tx_beam,
                        self.params.beta,
                        self.tx_grid.width,
                    ));
                }
                Some(neighborhood(peer, table, anchor, &tx_beams, &rx_beams))
            }
        }
    }

    /// Alt0: every measured pair, in key order, up to the cap.
    fn exhaustive(&self, peer: PeerId, table: &PeerMeasurements) -> Vec<BeamPairCandidate> {
        table
            .iter()
            .take(self.params.max_candidates as usize)
            .map(|(key, sample)| BeamPairCandidate::measured(peer, *key, sample.clone()))
            .collect()
    }

    /// Alt1: descending top-K by average SINR.
    ///
    /// Weaker pairs are appended while the list is below the cap; the running
    /// minimum only applies once the list is full.
    fn sinr_ranked(&self, peer: PeerId, table: &PeerMeasurements) -> Vec<BeamPairCandidate> {
        let max = self.params.max_candidates as usize;
        let mut list: Vec<BeamPairCandidate> = Vec::with_capacity(max + 1);
        let mut running_min: Option<f64> = None;

        for (key, sample) in table {
            let avg = sample.avg();
            if running_min.map_or(false, |min| avg < min) {
                continue;
            }

            match list.iter().position(|c| c.avg_sinr < avg) {
                Some(at) => list.insert(at, BeamPairCandidate::measured(peer, *key, sample.clone())),
                None if list.len() < max => {
                    list.push(BeamPairCandidate::measured(peer, *key, sample.clone()))
                }
                None => continue,
            }
            if list.len() > max {
                list.truncate(max);
                running_min = list.last().map(|c| c.avg_sinr);
            }
        }
        list
    }
}

/// Best pair for `peer`: the cached global best when it belongs to the peer,
/// else the peer's own best measurement.
fn anchor_for(
    peer: PeerId,
    table: &PeerMeasurements,
    best: &BeamPairCandidate,
) -> Option<BeamPairCandidate> {
    if best.peer == Some(peer) {
        return Some(best.clone());
    }
    best_in(peer, table)
}

/// Anchor first, then the cross product of the two beam sets, skipping the
/// pair made of both first entries (the anchor itself).
fn neighborhood(
    peer: PeerId,
    table: &PeerMeasurements,
    anchor: BeamPairCandidate,
    tx_beams: &[BeamId],
    rx_beams: &[BeamId],
) -> Vec<BeamPairCandidate> {
    let mut list = Vec::with_capacity(tx_beams.len() * rx_beams.len());
    list.push(anchor);
    for (i, &tx) in tx_beams.iter().enumerate() {
        for (j, &rx) in rx_beams.iter().enumerate() {
            if i == 0 && j == 0 {
                continue;
            }
            let key = BeamPairKey::new(tx, rx);
            list.push(match table.get(&key) {
                Some(sample) => BeamPairCandidate::measured(peer, key, sample.clone()),
                None => BeamPairCandidate::unmeasured(peer, key),
            });
        }
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SinrSample, UNKNOWN_SINR};

    const P: PeerId = PeerId(7);

    fn builder(strategy: u16, max: u16) -> CandidateListBuilder {
        let tx = GridGeometry::default_tx();
        let rx = GridGeometry::default_rx();
        CandidateListBuilder::new(
            StrategyParams::normalized(strategy, 2, 4, true, max, tx, rx),
            tx,
            rx,
            Periodicity::Ms10,
        )
    }

    fn keys(list: &[BeamPairCandidate]) -> Vec<(BeamId, BeamId)> {
        list.iter().map(|c| (c.tx_beam, c.rx_beam)).collect()
    }

    #[test]
    fn test_side_immediate_neighbors() {
        assert_eq!(side_immediate_neighbors(0, 16, 4), vec![0, 1, 15, 16, 48]);
        assert_eq!(side_immediate_neighbors(31, 16, 4), vec![31, 16, 30, 47, 15]);
        // Two rows: up only
        assert_eq!(side_immediate_neighbors(9, 8, 2), vec![9, 10, 8, 1]);
        // Single row: horizontal only
        assert_eq!(side_immediate_neighbors(0, 4, 1), vec![0, 1, 3]);
    }

    #[test]
    fn test_alpha_spaced_azimuth_beams() {
        assert_eq!(alpha_spaced_azimuth_beams(0, 4, 16), vec![4, 8, 12]);
        assert_eq!(alpha_spaced_azimuth_beams(14, 4, 16), vec![2, 6, 10]);
        assert_eq!(alpha_spaced_azimuth_beams(9, 3, 8), vec![12, 15]);
        assert!(alpha_spaced_azimuth_beams(5, 0, 16).is_empty());
        assert!(alpha_spaced_azimuth_beams(5, 16, 16).is_empty());
    }

    #[test]
    fn test_normalized_params() {
        let tx = GridGeometry::default_tx();
        let rx = GridGeometry::default_rx();

        let p = StrategyParams::normalized(9, 2, 4, true, 20, tx, rx);
        assert_eq!(p.strategy, Strategy::Alt2);

        let p = StrategyParams::normalized(0, 2, 4, false, 20, tx, rx);
        assert!(p.memory);
        assert_eq!(p.max_candidates, EXHAUSTIVE_MAX_CANDIDATES);

        let p = StrategyParams::normalized(1, 2, 4, true, 20, tx, rx);
        assert!(!p.memory);

        let p = StrategyParams::normalized(3, 8, 4, true, 20, tx, rx);
        assert_eq!(p.alpha, DEFAULT_ALPHA);
        let p = StrategyParams::normalized(3, 7, 40, true, 20, tx, rx);
        assert_eq!((p.alpha, p.beta), (7, 40));

        let p = StrategyParams::normalized(4, 2, 16, true, 20, tx, rx);
        assert_eq!(p.beta, DEFAULT_BETA);

        let p = StrategyParams::normalized(5, 9, 3, true, 20, tx, rx);
        assert_eq!((p.alpha, p.beta), (DEFAULT_ALPHA, 3));
    }

    #[test]
    fn test_alt1_evicts_weakest() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(P, 0, 0, SinrSample::flat(10.0));
        store.add_sinr(P, 1, 0, SinrSample::flat(15.0));
        store.add_sinr(P, 0, 1, SinrSample::flat(5.0));

        let b = builder(1, 2);
        let list = b.build(P, store.peer(P).unwrap(), &BeamPairCandidate::null()).unwrap();
        assert_eq!(keys(&list), vec![(1, 0), (0, 0)]);
        assert_eq!(list[0].avg_sinr, 15.0);
        assert_eq!(list[1].avg_sinr, 10.0);
    }

    #[test]
    fn test_alt1_bounded_and_sorted() {
        let mut store = SinrMeasurementStore::new();
        // Deterministic pseudo-random values over distinct keys
        let mut x: u32 = 12345;
        for tx in 0..16 {
            for rx in 0..8 {
                x = x.wrapping_mul(1103515245).wrapping_add(12345);
                store.add_sinr(P, tx, rx, SinrSample::flat((x >> 16) as f64 / 100.0));
            }
        }

        for max in [1u16, 5, 20, 200] {
            let b = builder(1, max);
            let list = b.build(P, store.peer(P).unwrap(), &BeamPairCandidate::null()).unwrap();
            assert!(list.len() <= max as usize);
            assert!(!list.is_empty());
            for pair in list.windows(2) {
                assert!(pair[0].avg_sinr >= pair[1].avg_sinr);
            }
            // Head is always the overall best
            let best = store.best_for(P).unwrap();
            assert_eq!(list[0].avg_sinr, best.avg_sinr);
        }
    }

    #[test]
    fn test_alt1_idempotent() {
        let mut store = SinrMeasurementStore::new();
        for (tx, v) in [(0, 3.0), (1, 9.0), (2, 9.0), (3, 1.0), (4, 7.0)] {
            store.add_sinr(P, tx, 0, SinrSample::flat(v));
        }
        let b = builder(1, 3);
        let table = store.peer(P).unwrap();
        let first = b.build(P, table, &BeamPairCandidate::null()).unwrap();
        let second = b.build(P, table, &BeamPairCandidate::null()).unwrap();
        assert_eq!(first, second);
        assert_eq!(keys(&first), vec![(1, 0), (2, 0), (4, 0)]);
    }

    #[test]
    fn test_alt1_keeps_weaker_pairs_while_room() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(P, 0, 0, SinrSample::flat(10.0));
        store.add_sinr(P, 0, 1, SinrSample::flat(5.0));
        store.add_sinr(P, 0, 2, SinrSample::flat(7.0));
        let list = builder(1, 5).build(P, store.peer(P).unwrap(), &BeamPairCandidate::null()).unwrap();
        assert_eq!(keys(&list), vec![(0, 0), (0, 2), (0, 1)]);
    }

    #[test]
    fn test_alt0_lists_all_measured() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(P, 3, 1, SinrSample::flat(1.0));
        store.add_sinr(P, 0, 2, SinrSample::flat(2.0));
        let b = builder(0, 5);
        let list = b.build(P, store.peer(P).unwrap(), &BeamPairCandidate::null()).unwrap();
        assert_eq!(keys(&list), vec![(0, 2), (3, 1)]);
    }

    #[test]
    fn test_alt2_neighborhood() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(P, 0, 0, SinrSample::flat(30.0));
        store.add_sinr(P, 1, 1, SinrSample::flat(12.0));
        let best = store.best_across_all();

        let b = builder(2, 20);
        let list = b.build(P, store.peer(P).unwrap(), &best).unwrap();

        // 5 tx neighbors × 4 rx neighbors
        assert_eq!(list.len(), 20);
        assert_eq!(list[0], best);
        assert_eq!(keys(&list[1..4]), vec![(0, 1), (0, 7), (0, 8)]);
        let measured = list.iter().find(|c| c.key() == BeamPairKey::new(1, 1)).unwrap();
        assert_eq!(measured.avg_sinr, 12.0);
        let unknown = list.iter().find(|c| c.key() == BeamPairKey::new(15, 8)).unwrap();
        assert_eq!(unknown.avg_sinr, UNKNOWN_SINR);
        assert!(unknown.sinr.is_empty());
        assert!(list.iter().all(|c| c.peer == Some(P)));
    }

    #[test]
    fn test_alt3_to_alt5_extensions() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(P, 0, 0, SinrSample::flat(30.0));
        let best = store.best_across_all();
        let table = store.peer(P).unwrap();

        // alpha = 2 on an 8-wide rx grid: 3 extra rx beams
        let list = builder(3, 20).build(P, table, &best).unwrap();
        assert_eq!(list.len(), 5 * 7);
        // beta = 4 on a 16-wide tx grid: 3 extra tx beams
        let list = builder(4, 20).build(P, table, &best).unwrap();
        assert_eq!(list.len(), 8 * 4);
        let list = builder(5, 20).build(P, table, &best).unwrap();
        assert_eq!(list.len(), 8 * 7);
        assert_eq!(list[0], best);
    }

    #[test]
    fn test_anchor_uses_peer_best_when_cache_is_elsewhere() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(PeerId(1), 5, 0, SinrSample::flat(50.0));
        store.add_sinr(P, 2, 3, SinrSample::flat(8.0));
        store.add_sinr(P, 4, 3, SinrSample::flat(6.0));
        let best = store.best_across_all();
        assert_eq!(best.peer, Some(PeerId(1)));

        let list = builder(2, 20).build(P, store.peer(P).unwrap(), &best).unwrap();
        assert_eq!(list[0].key(), BeamPairKey::new(2, 3));
        assert_eq!(list[0].peer, Some(P));
    }

    #[test]
    fn test_build_and_find_best() {
        let mut store = SinrMeasurementStore::new();
        store.add_sinr(P, 0, 0, SinrSample::flat(10.0));
        store.add_sinr(P, 1, 0, SinrSample::flat(15.0));
        let b = builder(2, 20);
        let mut cache = BeamPairCandidate::null();
        let mut registry = TrackingListRegistry::new();

        // Reporting off: best found, nothing built
        let best = b.build_and_find_best(&store, &mut cache, &mut registry, false, Duration::ZERO);
        assert_eq!(best.key(), BeamPairKey::new(1, 0));
        assert_eq!(cache, best);
        assert!(registry.is_empty());

        let now = Duration::from_millis(3);
        b.build_and_find_best(&store, &mut cache, &mut registry, true, now);
        let list = registry.get(P);
        assert_eq!(list.len(), 20);
        assert_eq!(list.candidates[0], cache);
        assert_eq!(list.last_refresh, now);

        // Cleared store keeps the cached best
        store.clear_all();
        let best = b.build_and_find_best(&store, &mut cache, &mut registry, true, now);
        assert!(best.is_null());
        assert_eq!(cache.key(), BeamPairKey::new(1, 0));
    }
}
