//! Tracking-list synchronization between the two ends of a link.
//!
//! A node never writes into another node's registry. It emits
//! [`SyncMessage`]s instead, and the receiving node applies them on its own
//! event loop through [`crate::manager::BeamManager::apply`].

use crate::registry::{BeamTrackingList, TrackingListRegistry};
use crate::types::{BeamPairCandidate, PeerId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// How the receiver folds the list into its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Overwrite the stored list.
    Replace,
    /// Refresh values of position-matching entries only.
    MergeValues,
}

/// A tracking list addressed to a remote node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    /// Node that built the list; the receiver stores it under this key.
    pub from: PeerId,
    /// Node the list is addressed to.
    pub to: PeerId,
    pub candidates: Vec<BeamPairCandidate>,
    pub mode: SyncMode,
}

impl SyncMessage {
    /// The list as the receiver will store it.
    pub fn into_list(self, max_len: u16, reporting_period: crate::burst::Periodicity) -> BeamTrackingList {
        BeamTrackingList::new(self.candidates, max_len, reporting_period)
    }
}

/// Turns a node's tracking lists into messages for the peers they describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSynchronizer {
    local: PeerId,
    mode: SyncMode,
}

impl PeerSynchronizer {
    pub fn new(local: PeerId) -> Self {
        Self {
            local,
            mode: SyncMode::Replace,
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    /// One message per peer holding a list in `registry`.
    pub fn push(&self, registry: &TrackingListRegistry) -> Vec<SyncMessage> {
        registry
            .peers()
            .map(|peer| {
                let list = registry.get(peer);
                trace!(from = %self.local, to = %peer, candidates = list.len(), "Sync push");
                SyncMessage {
                    from: self.local,
                    to: peer,
                    candidates: list.candidates.clone(),
                    mode: self.mode,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burst::Periodicity;
    use crate::types::{BeamPairKey, SinrSample};
    use std::time::Duration;

    #[test]
    fn test_push_one_message_per_peer() {
        let mut reg = TrackingListRegistry::new();
        for peer in [PeerId(10), PeerId(11)] {
            let c = BeamPairCandidate::measured(peer, BeamPairKey::new(1, 2), SinrSample::flat(3.0));
            reg.replace(peer, BeamTrackingList::new(vec![c], 20, Periodicity::Ms10), Duration::ZERO);
        }

        let msgs = PeerSynchronizer::new(PeerId(1)).push(&reg);
        assert_eq!(msgs.len(), 2);
        assert!(msgs.iter().all(|m| m.from == PeerId(1) && m.mode == SyncMode::Replace));
        assert_eq!(msgs[0].to, PeerId(10));
        assert_eq!(msgs[1].to, PeerId(11));
        assert_eq!(msgs[1].candidates[0].key(), BeamPairKey::new(1, 2));
    }

    #[test]
    fn test_push_empty_registry() {
        let sync = PeerSynchronizer::new(PeerId(1)).with_mode(SyncMode::MergeValues);
        assert!(sync.push(&TrackingListRegistry::new()).is_empty());
    }
}
