//! Channel collaborator interface
//!
//! The engine never computes SINR itself. Whatever models the radio channel
//! (a beamforming model, a 3GPP statistical model, a ray tracer) implements
//! [`ChannelModel`] and is handed to the engine as `&mut dyn ChannelModel`.

use crate::types::{BeamPairCandidate, BeamPairKey, PeerId, SinrSample};

/// Capability every channel variant provides.
pub trait ChannelModel {
    /// Per-band SINR seen on `pair` towards `peer`.
    fn compute_sinr(&mut self, peer: PeerId, pair: BeamPairKey) -> SinrSample;

    /// Steer the link towards `peer` onto `pair`.
    fn update_bf_channel_matrix(&mut self, peer: PeerId, pair: &BeamPairCandidate);
}
