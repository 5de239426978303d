//! Beam sweep cycle
//!
//! Holds the codebook of one side (gNB transmit or UE receive) and the
//! index of the beam currently in use. The PHY layer calls [`BeamSweepCycle::step`]
//! once per sweep step and asks [`BeamSweepCycle::next_burst_time`] when the
//! next SS block is due.

use crate::burst::{check_slot, BurstTiming};
use crate::codebook::Codebook;
use crate::error::{BeamError, BeamResult};
use crate::types::{BeamId, BeamVector, GridGeometry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Which end of the link a node sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepSide {
    /// gNB: sweeps transmit beams.
    Transmit,
    /// UE: sweeps receive beams.
    Receive,
}

impl SweepSide {
    /// Grid geometry used when none is configured.
    pub fn default_grid(&self) -> GridGeometry {
        match self {
            SweepSide::Transmit => GridGeometry::default_tx(),
            SweepSide::Receive => GridGeometry::default_rx(),
        }
    }

    /// Codebook file used when none is configured.
    pub fn default_codebook_path(&self) -> PathBuf {
        match self {
            SweepSide::Transmit => PathBuf::from("codebooks/KronCodebook16h4v.txt"),
            SweepSide::Receive => PathBuf::from("codebooks/KronCodebook8h2v.txt"),
        }
    }
}

/// Cyclic walk over the beams of a codebook.
#[derive(Debug, Clone)]
pub struct BeamSweepCycle {
    side: SweepSide,
    codebook_path: PathBuf,
    codebook: Option<Arc<Codebook>>,
    current_beam: BeamId,
    interval: Duration,
    last_update: Duration,
    blocks_since_update: u16,
}

impl BeamSweepCycle {
    pub fn new(side: SweepSide, codebook_path: impl Into<PathBuf>) -> Self {
        Self {
            side,
            codebook_path: codebook_path.into(),
            codebook: None,
            current_beam: 0,
            interval: Duration::ZERO,
            last_update: Duration::ZERO,
            blocks_since_update: 0,
        }
    }

    /// Sweep cycle using the side's default codebook path.
    pub fn for_side(side: SweepSide) -> Self {
        Self::new(side, side.default_codebook_path())
    }

    /// Load the codebook (once), rewind to beam 0 and start the clock.
    pub fn initialize(&mut self, interval: Duration, now: Duration) -> BeamResult<()> {
        if self.codebook.is_none() {
            let codebook = Codebook::load(&self.codebook_path)?;
            self.codebook = Some(Arc::new(codebook));
        }
        self.interval = interval;
        self.current_beam = 0;
        self.last_update = now;
        info!(
            side = ?self.side,
            beams = self.codebook_size(),
            interval = ?interval,
            "Beam sweep initialized"
        );
        Ok(())
    }

    /// Install an in-memory codebook, replacing any loaded one.
    pub fn set_codebook(&mut self, codebook: Arc<Codebook>) {
        debug!(side = ?self.side, beams = codebook.len(), "Codebook installed");
        self.codebook = Some(codebook);
        self.current_beam = 0;
    }

    /// Advance to the next beam, wrapping at the end of the codebook.
    pub fn step(&mut self) {
        let size = self.codebook_size();
        if size == 0 {
            warn!(side = ?self.side, "Sweep step without a codebook");
            return;
        }
        self.current_beam = ((self.current_beam as usize + 1) % size) as BeamId;
        trace!(side = ?self.side, beam = self.current_beam, "Sweep step");
    }

    /// Whether the last step wrapped back to beam 0.
    pub fn at_cycle_start(&self) -> bool {
        self.current_beam == 0
    }

    pub fn current_beam(&self) -> BeamId {
        self.current_beam
    }

    /// Weight vector of the current beam.
    pub fn current_vector(&self) -> BeamResult<&BeamVector> {
        self.vector_at(self.current_beam)
    }

    /// Weight vector of beam `id`.
    pub fn vector_at(&self, id: BeamId) -> BeamResult<&BeamVector> {
        match &self.codebook {
            Some(cb) => cb.vector(id),
            None => Err(BeamError::BeamOutOfRange {
                index: id as usize,
                size: 0,
            }),
        }
    }

    /// Time until the SS block following pattern entry `current_slot`.
    ///
    /// Within a burst set this is the symbol distance to the next pattern
    /// entry. After the last entry the burst set rolls over: the reference
    /// time advances by one burst-set period and the delay targets the
    /// first entry of the new set.
    pub fn next_burst_time(
        &mut self,
        timing: &BurstTiming,
        current_slot: u16,
        now: Duration,
    ) -> BeamResult<Duration> {
        if let Err(e) = check_slot(&timing.pattern, current_slot) {
            warn!(slot = current_slot, pattern_len = timing.pattern.len(), "{}", e);
            return Err(e);
        }

        let next = current_slot + 1;
        if let (Some(cur), Some(nxt)) = (timing.pattern.offset(current_slot), timing.pattern.offset(next)) {
            return Ok(timing.symbols(nxt - cur));
        }

        self.last_update += timing.burst_set_period.as_duration();
        let delay = (self.last_update + timing.first_block_offset()).saturating_sub(now);
        trace!(last_update = ?self.last_update, delay = ?delay, "Burst set rollover");
        Ok(delay)
    }

    /// SS blocks seen since the current burst set started.
    pub fn blocks_since_update(&self) -> u16 {
        self.blocks_since_update
    }

    pub fn increase_blocks(&mut self) {
        self.blocks_since_update = self.blocks_since_update.saturating_add(1);
    }

    pub fn reset_blocks(&mut self) {
        self.blocks_since_update = 0;
    }

    pub fn codebook_size(&self) -> usize {
        self.codebook.as_ref().map_or(0, |cb| cb.len())
    }

    pub fn codebook(&self) -> Option<&Arc<Codebook>> {
        self.codebook.as_ref()
    }

    pub fn codebook_path(&self) -> &Path {
        &self.codebook_path
    }

    pub fn side(&self) -> SweepSide {
        self.side
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_update(&self) -> Duration {
        self.last_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::burst::{Periodicity, SsBurstPattern, SubcarrierSpacing};

    fn sweep_with(beams: u16) -> BeamSweepCycle {
        let mut s = BeamSweepCycle::for_side(SweepSide::Receive);
        s.set_codebook(Arc::new(Codebook::kronecker_dft(beams, 1)));
        s
    }

    #[test]
    fn test_step_wraps() {
        let mut s = sweep_with(4);
        for expected in [1, 2, 3, 0, 1] {
            s.step();
            assert_eq!(s.current_beam(), expected);
        }
    }

    #[test]
    fn test_step_without_codebook() {
        let mut s = BeamSweepCycle::for_side(SweepSide::Transmit);
        s.step();
        assert_eq!(s.current_beam(), 0);
        assert!(s.current_vector().is_err());
    }

    #[test]
    fn test_vector_at() {
        let s = sweep_with(4);
        assert_eq!(s.vector_at(3).unwrap().len(), 4);
        assert!(matches!(
            s.vector_at(4),
            Err(BeamError::BeamOutOfRange { index: 4, size: 4 })
        ));
    }

    #[test]
    fn test_initialize_keeps_installed_codebook() {
        let mut s = BeamSweepCycle::new(SweepSide::Transmit, "/nonexistent/codebook.txt");
        s.set_codebook(Arc::new(Codebook::kronecker_dft(2, 2)));
        s.step();
        s.initialize(Duration::from_micros(100), Duration::from_millis(3))
            .unwrap();
        assert_eq!(s.current_beam(), 0);
        assert_eq!(s.last_update(), Duration::from_millis(3));
        assert_eq!(s.codebook_size(), 4);
    }

    #[test]
    fn test_initialize_missing_codebook_is_fatal() {
        let mut s = BeamSweepCycle::new(SweepSide::Transmit, "/nonexistent/codebook.txt");
        let err = s.initialize(Duration::ZERO, Duration::ZERO).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_next_burst_time_within_set() {
        let timing = BurstTiming::new(SubcarrierSpacing::Scs120KHz, true, Periodicity::Ms20);
        let mut s = sweep_with(4);
        // Entries 0 and 1 are symbols 4 and 8
        let d = s.next_burst_time(&timing, 0, Duration::ZERO).unwrap();
        assert_eq!(d, Duration::from_nanos(4 * 8330));
        assert_eq!(s.last_update(), Duration::ZERO);
    }

    #[test]
    fn test_next_burst_time_rollover() {
        let timing = BurstTiming {
            scs: SubcarrierSpacing::Scs120KHz,
            pattern: SsBurstPattern::new(vec![4, 8]),
            burst_set_period: Periodicity::Ms20,
        };
        let mut s = sweep_with(4);
        let now = Duration::from_nanos(8 * 8330);
        let d = s.next_burst_time(&timing, 1, now).unwrap();
        assert_eq!(s.last_update(), Duration::from_millis(20));
        assert_eq!(d, Duration::from_millis(20) + Duration::from_nanos(4 * 8330) - now);
    }

    #[test]
    fn test_next_burst_time_bad_slot() {
        let timing = BurstTiming::default();
        let mut s = sweep_with(4);
        let err = s.next_burst_time(&timing, 64, Duration::ZERO).unwrap_err();
        assert!(matches!(err, BeamError::BurstSlotOutOfRange { slot: 64, .. }));
        assert_eq!(s.last_update(), Duration::ZERO);
    }

    #[test]
    fn test_block_counter() {
        let mut s = sweep_with(2);
        s.increase_blocks();
        s.increase_blocks();
        assert_eq!(s.blocks_since_update(), 2);
        s.reset_blocks();
        assert_eq!(s.blocks_since_update(), 0);
    }
}
