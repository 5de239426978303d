//! # Beam Manager
//!
//! One [`BeamManager`] per node ties the engine together:
//!
//! ```text
//!             add_sinr                 update_best / find_candidates
//! channel ──────────────► SinrMeasurementStore ──► CandidateListBuilder
//!    ▲                                                     │
//!    │ update_bf_channel_matrix                            ▼
//!    └──────────── csi_refresh ◄──────────────── TrackingListRegistry
//!                                                          │ notify_peers
//!                                                          ▼
//!                                               SyncMessage ──► remote apply
//! ```
//!
//! The manager holds no clock. Every time-dependent call takes `now`, and
//! follow-up work (clearing measurements, the next CSI refresh) is returned to
//! the caller as a delay for it to schedule.

use crate::burst::Periodicity;
use crate::candidate::CandidateListBuilder;
use crate::channel::ChannelModel;
use crate::config::BeamConfig;
use crate::error::BeamResult;
use crate::registry::{BeamTrackingList, TrackingListRegistry};
use crate::sinr::SinrMeasurementStore;
use crate::sweep::{BeamSweepCycle, SweepSide};
use crate::sync::{PeerSynchronizer, SyncMessage, SyncMode};
use crate::types::{BeamId, BeamPairCandidate, BeamPairKey, PeerId, SinrSample};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Delay between a memoryless best-pair update and the measurement wipe.
pub const CLEAR_DELAY: Duration = Duration::from_nanos(10);

/// Result of [`BeamManager::update_best`].
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    /// Best pair of this sweep (null if nothing was measured).
    pub best: BeamPairCandidate,
    /// When set, [`BeamManager::clear_measurements`] must run after this delay.
    pub clear_after: Option<Duration>,
}

/// Result of [`BeamManager::csi_refresh`].
#[derive(Debug, Clone, PartialEq)]
pub struct CsiRefreshOutcome {
    /// Pairs re-measured over all tracked peers.
    pub measured: usize,
    /// New active pair, if the refresh switched beams.
    pub switched_to: Option<BeamPairCandidate>,
    /// Lists to deliver to the peers.
    pub messages: Vec<SyncMessage>,
    /// Delay until the next refresh (`None` with a zero reporting period).
    pub next_in: Option<Duration>,
}

/// Beam management state of one node.
#[derive(Debug, Clone)]
pub struct BeamManager {
    local: PeerId,
    sweep: BeamSweepCycle,
    store: SinrMeasurementStore,
    builder: CandidateListBuilder,
    registry: TrackingListRegistry,
    sync: PeerSynchronizer,
    best: BeamPairCandidate,
    active: Option<BeamPairKey>,
    reporting_enabled: bool,
    reporting_period: Periodicity,
    reporting_margin: Duration,
}

impl BeamManager {
    /// Build a manager for the node `local` sweeping `side`.
    ///
    /// Fails on configuration that cannot be recovered (bad periods). The
    /// codebook is only read by [`BeamManager::initialize`].
    pub fn new(local: PeerId, side: SweepSide, config: &BeamConfig) -> BeamResult<Self> {
        config.validate()?;
        let reporting_period = config.reporting_period()?;
        let params = config.strategy_params();
        Ok(Self {
            local,
            sweep: BeamSweepCycle::new(side, config.codebook_path(side)),
            store: SinrMeasurementStore::new(),
            builder: CandidateListBuilder::new(params, config.grid.tx, config.grid.rx, reporting_period),
            registry: TrackingListRegistry::new(),
            sync: PeerSynchronizer::new(local).with_mode(config.reporting.sync_mode),
            best: BeamPairCandidate::null(),
            active: None,
            reporting_enabled: false,
            reporting_period,
            reporting_margin: Duration::from_micros(config.reporting.margin_us),
        })
    }

    /// Load the codebook and start sweeping.
    pub fn initialize(&mut self, interval: Duration, now: Duration) -> BeamResult<()> {
        self.sweep.initialize(interval, now)
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn side(&self) -> SweepSide {
        self.sweep.side()
    }

    pub fn sweep(&self) -> &BeamSweepCycle {
        &self.sweep
    }

    pub fn sweep_mut(&mut self) -> &mut BeamSweepCycle {
        &mut self.sweep
    }

    pub fn store(&self) -> &SinrMeasurementStore {
        &self.store
    }

    pub fn registry(&self) -> &TrackingListRegistry {
        &self.registry
    }

    pub fn builder(&self) -> &CandidateListBuilder {
        &self.builder
    }

    /// Record a measurement reported by the channel.
    pub fn add_sinr(&mut self, peer: PeerId, tx: BeamId, rx: BeamId, sample: SinrSample) {
        self.store.add_sinr(peer, tx, rx, sample);
    }

    /// Global best pair; rebuilds tracking lists when reporting is on.
    pub fn build_and_find_best(&mut self, now: Duration) -> BeamPairCandidate {
        self.builder.build_and_find_best(
            &self.store,
            &mut self.best,
            &mut self.registry,
            self.reporting_enabled,
            now,
        )
    }

    /// End-of-sweep update: pick the best pair and refresh the lists.
    ///
    /// In memoryless mode with reporting on, the caller must wipe the
    /// measurements after [`UpdateOutcome::clear_after`].
    pub fn update_best(&mut self, now: Duration) -> UpdateOutcome {
        let best = self.build_and_find_best(now);
        if !best.is_null() {
            info!(
                node = %self.local,
                peer = ?best.peer,
                tx = best.tx_beam,
                rx = best.rx_beam,
                avg_sinr = best.avg_sinr,
                "Best beam pair update (SS)"
            );
        }
        let clear_after = (!self.builder.params().memory && self.reporting_enabled).then_some(CLEAR_DELAY);
        UpdateOutcome { best, clear_after }
    }

    /// Rebuild every peer's list around the cached best pair.
    pub fn find_candidates(&mut self, now: Duration) {
        self.builder.build_all(&self.store, &self.best, &mut self.registry, now);
    }

    pub fn clear_measurements(&mut self) {
        self.store.clear_all();
    }

    pub fn enable_reporting(&mut self) {
        if !self.reporting_enabled {
            info!(node = %self.local, period_ms = self.reporting_period.as_ms(), "Beam reporting enabled");
        }
        self.reporting_enabled = true;
    }

    pub fn reporting_enabled(&self) -> bool {
        self.reporting_enabled
    }

    pub fn reporting_period(&self) -> Periodicity {
        self.reporting_period
    }

    /// Switch between cumulative and memoryless measurement history.
    pub fn set_memory(&mut self, memory: bool) {
        self.builder.set_memory(memory);
    }

    pub fn memory(&self) -> bool {
        self.builder.params().memory
    }

    /// Cached best-known pair.
    pub fn best_pair(&self) -> &BeamPairCandidate {
        &self.best
    }

    /// Pair the link is currently steered to.
    pub fn active_pair(&self) -> Option<BeamPairKey> {
        self.active
    }

    /// Steer onto `pair` and make it the cached best.
    pub fn activate(&mut self, pair: &BeamPairCandidate, channel: &mut dyn ChannelModel) {
        let Some(peer) = pair.peer else {
            debug!(node = %self.local, "Ignoring activation of the null pair");
            return;
        };
        self.best = pair.clone();
        self.active = Some(pair.key());
        channel.update_bf_channel_matrix(peer, pair);
    }

    /// Messages carrying this node's lists to their peers.
    pub fn notify_peers(&self) -> Vec<SyncMessage> {
        self.sync.push(&self.registry)
    }

    /// Apply a list pushed by a remote node.
    ///
    /// Returns `false` if the message was addressed to another node.
    pub fn apply(&mut self, msg: SyncMessage, now: Duration) -> bool {
        if msg.to != self.local {
            warn!(node = %self.local, to = %msg.to, "Dropping misaddressed sync message");
            return false;
        }
        let from = msg.from;
        let mode = msg.mode;
        let list = msg.into_list(self.builder.params().max_candidates, self.reporting_period);
        match mode {
            SyncMode::Replace => self.registry.replace(from, list, now),
            SyncMode::MergeValues => {
                self.registry.merge_values(from, list, now);
            }
        }
        true
    }

    /// Tracking list of `peer`, or the empty sentinel.
    pub fn tracking_list(&self, peer: PeerId) -> &BeamTrackingList {
        self.registry.get(peer)
    }

    /// Lists whose CSI resource is due, using the configured margin.
    pub fn due_lists(&self, now: Duration) -> BTreeMap<PeerId, BeamTrackingList> {
        self.registry.expired(self.reporting_margin, now)
    }

    /// Re-arm the CSI timers of the given peers by one period.
    pub fn advance_timers<'a>(&mut self, peers: impl IntoIterator<Item = &'a PeerId>) {
        self.registry.advance_timers(peers);
    }

    /// Candidates tracked over all peers.
    pub fn total_tracked_candidates(&self) -> usize {
        self.registry.total_candidates()
    }

    /// List of the first tracked peer.
    pub fn first_tracking_list(&self) -> Option<(PeerId, &BeamTrackingList)> {
        self.registry.first()
    }

    /// Periodic CSI refresh.
    ///
    /// Re-measures every tracked pair, folds the values back into the lists,
    /// and switches to the strongest tracked pair when it differs from the
    /// active one. Lists are rebuilt after a switch. The lists are always
    /// returned as messages for the peers.
    pub fn csi_refresh(&mut self, channel: &mut dyn ChannelModel, now: Duration) -> CsiRefreshOutcome {
        let peers: Vec<PeerId> = self.registry.peers().collect();
        let mut measured = 0;
        let mut switched_to = None;

        for peer in peers {
            let mut list = self.registry.get(peer).clone();
            for candidate in &mut list.candidates {
                let sample = channel.compute_sinr(peer, candidate.key());
                self.store.add_sinr(peer, candidate.tx_beam, candidate.rx_beam, sample.clone());
                candidate.avg_sinr = sample.avg();
                candidate.sinr = sample;
                measured += 1;
            }
            let strongest = list.best().cloned();
            let tracks_best = self.best.peer == Some(peer)
                && list.candidates.iter().any(|c| c.key() == self.best.key());
            self.registry.merge_values(peer, list, now);

            let Some(strongest) = strongest else { continue };
            if self.active == Some(strongest.key()) || !tracks_best {
                continue;
            }
            info!(
                node = %self.local,
                peer = %peer,
                tx = strongest.tx_beam,
                rx = strongest.rx_beam,
                avg_sinr = strongest.avg_sinr,
                "Best beam pair update (CSI)"
            );
            self.activate(&strongest, channel);
            self.find_candidates(now);
            switched_to = Some(strongest);
        }

        let period = self.reporting_period.as_duration();
        CsiRefreshOutcome {
            measured,
            switched_to,
            messages: self.notify_peers(),
            next_in: (!period.is_zero()).then_some(period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codebook::Codebook;
    use std::sync::Arc;

    const GNB: PeerId = PeerId(1);
    const UE: PeerId = PeerId(100);

    /// Channel with a fixed SINR table; unknown pairs read 1.0.
    #[derive(Default)]
    struct TableChannel {
        values: BTreeMap<BeamPairKey, f64>,
        steered: Vec<(PeerId, BeamPairKey)>,
    }

    impl ChannelModel for TableChannel {
        fn compute_sinr(&mut self, _peer: PeerId, pair: BeamPairKey) -> SinrSample {
            SinrSample::flat(self.values.get(&pair).copied().unwrap_or(1.0))
        }

        fn update_bf_channel_matrix(&mut self, peer: PeerId, pair: &BeamPairCandidate) {
            self.steered.push((peer, pair.key()));
        }
    }

    fn manager(strategy: u16, memory: bool) -> BeamManager {
        let mut config = BeamConfig::default();
        config.candidates.strategy = strategy;
        config.candidates.memory = memory;
        let mut m = BeamManager::new(UE, SweepSide::Receive, &config).unwrap();
        m.sweep_mut().set_codebook(Arc::new(Codebook::kronecker_dft(8, 2)));
        m
    }

    #[test]
    fn test_new_rejects_bad_period() {
        let mut config = BeamConfig::default();
        config.reporting.period_ms = 7;
        let err = BeamManager::new(UE, SweepSide::Receive, &config).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_update_best_without_reporting() {
        let mut m = manager(2, false);
        m.add_sinr(GNB, 3, 1, SinrSample::flat(12.0));
        m.add_sinr(GNB, 4, 1, SinrSample::flat(8.0));

        let outcome = m.update_best(Duration::ZERO);
        assert_eq!(outcome.best.key(), BeamPairKey::new(3, 1));
        assert_eq!(outcome.clear_after, None);
        assert_eq!(m.best_pair().key(), BeamPairKey::new(3, 1));
        assert_eq!(m.total_tracked_candidates(), 0);
    }

    #[test]
    fn test_update_best_memoryless_schedules_clear() {
        let mut m = manager(2, false);
        m.enable_reporting();
        m.add_sinr(GNB, 3, 1, SinrSample::flat(12.0));

        let outcome = m.update_best(Duration::from_millis(1));
        assert_eq!(outcome.clear_after, Some(CLEAR_DELAY));
        assert_eq!(m.total_tracked_candidates(), 20);
        let (peer, list) = m.first_tracking_list().unwrap();
        assert_eq!(peer, GNB);
        assert_eq!(list.candidates[0].key(), BeamPairKey::new(3, 1));

        m.clear_measurements();
        assert!(m.store().is_empty());
        // Cached best survives the wipe
        assert_eq!(m.best_pair().key(), BeamPairKey::new(3, 1));
    }

    #[test]
    fn test_memory_mode_keeps_measurements() {
        let mut m = manager(2, true);
        m.enable_reporting();
        m.add_sinr(GNB, 0, 0, SinrSample::flat(5.0));
        assert_eq!(m.update_best(Duration::ZERO).clear_after, None);

        m.set_memory(false);
        assert!(!m.memory());
        assert!(m.update_best(Duration::ZERO).clear_after.is_some());
    }

    #[test]
    fn test_sync_round_trip() {
        let mut ue = manager(1, false);
        ue.enable_reporting();
        ue.add_sinr(GNB, 0, 0, SinrSample::flat(10.0));
        ue.add_sinr(GNB, 1, 0, SinrSample::flat(15.0));
        ue.update_best(Duration::ZERO);

        let mut gnb = BeamManager::new(GNB, SweepSide::Transmit, &BeamConfig::default()).unwrap();
        let msgs = ue.notify_peers();
        assert_eq!(msgs.len(), 1);
        let now = Duration::from_millis(2);
        for msg in msgs {
            assert!(gnb.apply(msg, now));
        }

        let list = gnb.tracking_list(UE);
        assert_eq!(list.len(), 2);
        assert_eq!(list.candidates[0].key(), BeamPairKey::new(1, 0));
        assert_eq!(list.last_refresh, now);
        assert_eq!(list.reporting_period, Periodicity::Ms10);

        // gNB's CSI resource becomes due one period later
        assert!(gnb.due_lists(now + Duration::from_millis(10)).is_empty());
        let due = gnb.due_lists(now + Duration::from_millis(11));
        assert!(due.contains_key(&UE));
        gnb.advance_timers(due.keys());
        assert_eq!(gnb.tracking_list(UE).last_refresh, now + Duration::from_millis(10));
    }

    #[test]
    fn test_apply_misaddressed() {
        let mut m = manager(2, true);
        let msg = SyncMessage {
            from: GNB,
            to: PeerId(55),
            candidates: Vec::new(),
            mode: SyncMode::Replace,
        };
        assert!(!m.apply(msg, Duration::ZERO));
        assert!(m.registry().is_empty());
    }

    #[test]
    fn test_notify_peers_uses_configured_mode() {
        let mut config = BeamConfig::default();
        config.reporting.sync_mode = SyncMode::MergeValues;
        let mut m = BeamManager::new(UE, SweepSide::Receive, &config).unwrap();
        m.enable_reporting();
        m.add_sinr(GNB, 0, 0, SinrSample::flat(10.0));
        m.update_best(Duration::ZERO);

        let msgs = m.notify_peers();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].mode, SyncMode::MergeValues);
    }

    #[test]
    fn test_apply_merge_values() {
        let mut m = manager(2, true);
        let pushed = |pairs: &[(u16, u16, f64)], mode| SyncMessage {
            from: GNB,
            to: UE,
            candidates: pairs
                .iter()
                .map(|&(tx, rx, v)| {
                    BeamPairCandidate::measured(GNB, BeamPairKey::new(tx, rx), SinrSample::flat(v))
                })
                .collect(),
            mode,
        };

        let t0 = Duration::from_millis(5);
        assert!(m.apply(pushed(&[(3, 1, 12.0), (4, 1, 8.0), (2, 1, 6.0)], SyncMode::Replace), t0));

        // second position swapped, third refreshed
        let t1 = Duration::from_millis(15);
        let merge = pushed(&[(3, 1, 20.0), (2, 1, 9.0), (2, 1, 7.0)], SyncMode::MergeValues);
        assert!(m.apply(merge, t1));
        let list = m.tracking_list(GNB);
        let values: Vec<(BeamPairKey, f64)> =
            list.candidates.iter().map(|c| (c.key(), c.avg_sinr)).collect();
        assert_eq!(
            values,
            vec![
                (BeamPairKey::new(3, 1), 20.0),
                (BeamPairKey::new(4, 1), 8.0),
                (BeamPairKey::new(2, 1), 7.0),
            ]
        );
        assert_eq!(list.last_refresh, t1);

        // nothing lines up: list and refresh time unchanged
        let t2 = Duration::from_millis(25);
        let mismatch = pushed(&[(9, 0, 30.0), (8, 0, 30.0)], SyncMode::MergeValues);
        assert!(m.apply(mismatch, t2));
        let list = m.tracking_list(GNB);
        assert_eq!(list.len(), 3);
        assert_eq!(list.candidates[0].avg_sinr, 20.0);
        assert_eq!(list.last_refresh, t1);
    }

    #[test]
    fn test_csi_refresh_switches_to_stronger_neighbor() {
        let mut m = manager(2, true);
        let mut channel = TableChannel::default();
        m.enable_reporting();
        m.add_sinr(GNB, 0, 0, SinrSample::flat(20.0));
        let best = m.update_best(Duration::ZERO).best;
        m.activate(&best, &mut channel);
        assert_eq!(m.active_pair(), Some(BeamPairKey::new(0, 0)));

        // The link moved: the right-hand tx neighbor is now strongest
        channel.values.insert(BeamPairKey::new(0, 0), 5.0);
        channel.values.insert(BeamPairKey::new(1, 0), 30.0);

        let now = Duration::from_millis(10);
        let outcome = m.csi_refresh(&mut channel, now);
        assert_eq!(outcome.measured, 20);
        let switched = outcome.switched_to.unwrap();
        assert_eq!(switched.key(), BeamPairKey::new(1, 0));
        assert_eq!(m.active_pair(), Some(BeamPairKey::new(1, 0)));
        assert_eq!(channel.steered.last(), Some(&(GNB, BeamPairKey::new(1, 0))));

        // List rebuilt around the new best
        let list = m.tracking_list(GNB);
        assert_eq!(list.candidates[0].key(), BeamPairKey::new(1, 0));
        assert_eq!(list.last_refresh, now);
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.next_in, Some(Duration::from_millis(10)));

        // Nothing changes on the next refresh
        let outcome = m.csi_refresh(&mut channel, now * 2);
        assert!(outcome.switched_to.is_none());
    }

    #[test]
    fn test_csi_refresh_without_lists() {
        let mut m = manager(2, true);
        let mut channel = TableChannel::default();
        let outcome = m.csi_refresh(&mut channel, Duration::ZERO);
        assert_eq!(outcome.measured, 0);
        assert!(outcome.messages.is_empty());
        assert!(channel.steered.is_empty());
    }
}
