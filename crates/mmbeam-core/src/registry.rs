//! Per-peer beam tracking lists and their refresh timers.
//!
//! Each list carries the reporting period of its CSI resource and the time it
//! was last refreshed. A list is due once
//! `now + margin > last_refresh + reporting_period`. Re-arming is additive
//! ([`TrackingListRegistry::advance_timers`]) so refreshes stay aligned with
//! the period boundary instead of drifting with processing delays.

use crate::burst::Periodicity;
use crate::types::{BeamPairCandidate, PeerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

static EMPTY_LIST: BeamTrackingList = BeamTrackingList {
    candidates: Vec::new(),
    max_len: 0,
    reporting_period: Periodicity::Ms0,
    last_refresh: Duration::ZERO,
};

/// Ordered candidate pairs for one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeamTrackingList {
    pub candidates: Vec<BeamPairCandidate>,
    /// Declared capacity (`max_candidates` of the strategy that built it).
    pub max_len: u16,
    pub reporting_period: Periodicity,
    pub last_refresh: Duration,
}

impl BeamTrackingList {
    pub fn new(candidates: Vec<BeamPairCandidate>, max_len: u16, reporting_period: Periodicity) -> Self {
        Self {
            candidates,
            max_len,
            reporting_period,
            last_refresh: Duration::ZERO,
        }
    }

    /// The shared "unknown peer" sentinel.
    pub fn empty() -> &'static BeamTrackingList {
        &EMPTY_LIST
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Entry with the highest average SINR (first one on ties).
    pub fn best(&self) -> Option<&BeamPairCandidate> {
        self.candidates
            .iter()
            .fold(None, |best: Option<&BeamPairCandidate>, c| match best {
                Some(b) if c.avg_sinr <= b.avg_sinr => Some(b),
                _ => Some(c),
            })
    }

    /// Whether the list's refresh deadline falls before `now + margin`.
    pub fn is_due(&self, margin: Duration, now: Duration) -> bool {
        now + margin > self.last_refresh + self.reporting_period.as_duration()
    }
}

/// Tracking lists keyed by peer.
#[derive(Debug, Clone, Default)]
pub struct TrackingListRegistry {
    lists: BTreeMap<PeerId, BeamTrackingList>,
}

impl TrackingListRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `peer`'s list, stamping it as refreshed at `now`.
    pub fn replace(&mut self, peer: PeerId, mut list: BeamTrackingList, now: Duration) {
        list.last_refresh = now;
        self.lists.insert(peer, list);
    }

    /// Refresh SINR values of entries whose keys match position by position.
    ///
    /// An unknown peer gets `incoming` as its list. Positions whose
    /// `(tx, rx)` differ are left untouched. The refresh time moves to `now`
    /// only if at least one position matched.
    ///
    /// Returns the number of merged entries.
    pub fn merge_values(&mut self, peer: PeerId, incoming: BeamTrackingList, now: Duration) -> usize {
        let Some(existing) = self.lists.get_mut(&peer) else {
            let merged = incoming.len();
            self.replace(peer, incoming, now);
            return merged;
        };

        let mut merged = 0;
        for (slot, update) in existing.candidates.iter_mut().zip(incoming.candidates) {
            if slot.key() == update.key() {
                slot.sinr = update.sinr;
                slot.avg_sinr = update.avg_sinr;
                merged += 1;
            } else {
                debug!(
                    peer = %peer,
                    existing = %slot.key(),
                    incoming = %update.key(),
                    "Tracking list order mismatch, entry not merged"
                );
            }
        }
        if merged > 0 {
            existing.last_refresh = now;
        }
        merged
    }

    /// Stored list of `peer`, or the empty sentinel.
    pub fn get(&self, peer: PeerId) -> &BeamTrackingList {
        match self.lists.get(&peer) {
            Some(list) => list,
            None => {
                debug!(peer = %peer, "No tracking list for peer");
                BeamTrackingList::empty()
            }
        }
    }

    /// Lists due for refresh within `margin` of `now`.
    pub fn expired(&self, margin: Duration, now: Duration) -> BTreeMap<PeerId, BeamTrackingList> {
        self.lists
            .iter()
            .filter(|(_, list)| list.is_due(margin, now))
            .map(|(peer, list)| (*peer, list.clone()))
            .collect()
    }

    /// Push each given peer's refresh time one reporting period forward.
    pub fn advance_timers<'a>(&mut self, peers: impl IntoIterator<Item = &'a PeerId>) {
        for peer in peers {
            if let Some(list) = self.lists.get_mut(peer) {
                list.last_refresh += list.reporting_period.as_duration();
            }
        }
    }

    /// Total candidates over all peers.
    pub fn total_candidates(&self) -> usize {
        self.lists.values().map(BeamTrackingList::len).sum()
    }

    /// List of the lowest-ordered peer, if any.
    pub fn first(&self) -> Option<(PeerId, &BeamTrackingList)> {
        self.lists.iter().next().map(|(p, l)| (*p, l))
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.lists.keys().copied()
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.lists.contains_key(&peer)
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
