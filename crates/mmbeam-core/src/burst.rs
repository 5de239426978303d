//! SS burst timing
//!
//! Synchronization-signal (SS) blocks are transmitted in bursts: inside each
//! burst set, blocks occupy a fixed list of OFDM symbol offsets, and the
//! burst set repeats every burst-set period.
//!
//! ```text
//!  burst-set period (e.g. 20 ms)
//! |<------------------------------------------------------->|
//! |▮ ▮  ▮ ▮   ▮ ▮ ...                                        |▮ ▮  ▮ ▮ ...
//!  ^ pattern[0] * symbol period
//! ```
//!
//! This module holds the numerology ([`SubcarrierSpacing`]), the enumerated
//! periods ([`Periodicity`]), the burst patterns ([`SsBurstPattern`]) and the
//! [`SsBurstScheduler`] that re-arms the in-window block counter once per
//! burst set.

use crate::error::{BeamError, BeamResult};
use crate::scheduler::{EventScheduler, OwnerToken};
use crate::sweep::BeamSweepCycle;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// SS block symbol offsets for 60 kHz subcarrier spacing.
pub const SS_BURST_PATTERN_SCS60: [u16; 20] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19,
];

/// SS block symbol offsets for 120 kHz subcarrier spacing (TS 38.213 case D).
pub const SS_BURST_PATTERN_SCS120: [u16; 64] = [
    4, 8, 16, 20, 32, 36, 44, 48, 60, 64, 72, 76, 88, 92, 100, 104, 144, 148, 156, 160, 172, 176,
    184, 188, 200, 204, 212, 216, 228, 232, 240, 244, 284, 288, 296, 300, 312, 316, 324, 328,
    340, 344, 352, 356, 368, 372, 380, 384, 424, 428, 436, 440, 452, 456, 464, 468, 480, 484,
    492, 496, 508, 512, 520, 524,
];

/// SS block symbol offsets for 240 kHz subcarrier spacing (TS 38.213 case E).
pub const SS_BURST_PATTERN_SCS240: [u16; 64] = [
    8, 12, 16, 20, 32, 36, 40, 44, 64, 68, 72, 76, 88, 92, 96, 100, 120, 124, 128, 132, 144, 148,
    152, 156, 176, 180, 184, 188, 200, 204, 208, 212, 288, 292, 296, 300, 312, 316, 320, 324,
    344, 348, 352, 356, 368, 372, 376, 380, 400, 404, 408, 412, 424, 428, 432, 436, 456, 460,
    464, 468, 480, 484, 488, 492,
];

/// NR subcarrier spacing (numerology), assuming 14-symbol slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubcarrierSpacing {
    Scs15KHz,
    Scs30KHz,
    Scs60KHz,
    Scs120KHz,
    Scs240KHz,
    Scs480KHz,
    Scs960KHz,
}

impl Default for SubcarrierSpacing {
    fn default() -> Self {
        SubcarrierSpacing::Scs120KHz
    }
}

impl SubcarrierSpacing {
    /// OFDM symbol period in microseconds.
    pub fn symbol_period_us(&self) -> f64 {
        match self {
            SubcarrierSpacing::Scs15KHz => 66.67,
            SubcarrierSpacing::Scs30KHz => 33.34,
            SubcarrierSpacing::Scs60KHz => 16.67,
            SubcarrierSpacing::Scs120KHz => 8.33,
            SubcarrierSpacing::Scs240KHz => 4.16,
            SubcarrierSpacing::Scs480KHz => 2.08,
            SubcarrierSpacing::Scs960KHz => 1.04,
        }
    }

    /// Symbol period rounded to whole nanoseconds.
    pub fn symbol_period(&self) -> Duration {
        Duration::from_nanos((self.symbol_period_us() * 1000.0).round() as u64)
    }

    /// Slots per 1 ms subframe.
    pub fn slots_per_subframe(&self) -> u32 {
        match self {
            SubcarrierSpacing::Scs15KHz => 1,
            SubcarrierSpacing::Scs30KHz => 2,
            SubcarrierSpacing::Scs60KHz => 4,
            SubcarrierSpacing::Scs120KHz => 8,
            SubcarrierSpacing::Scs240KHz => 16,
            SubcarrierSpacing::Scs480KHz => 32,
            SubcarrierSpacing::Scs960KHz => 64,
        }
    }

    /// Slot duration.
    pub fn slot_period(&self) -> Duration {
        Duration::from_nanos(1_000_000 / self.slots_per_subframe() as u64)
    }
}

/// Enumerated SS burst-set and CSI reporting periods (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Periodicity {
    Ms0,
    Ms1,
    Ms5,
    Ms10,
    Ms20,
    Ms40,
    Ms80,
    Ms160,
}

impl Periodicity {
    /// Value in milliseconds.
    pub fn as_ms(&self) -> u16 {
        match self {
            Periodicity::Ms0 => 0,
            Periodicity::Ms1 => 1,
            Periodicity::Ms5 => 5,
            Periodicity::Ms10 => 10,
            Periodicity::Ms20 => 20,
            Periodicity::Ms40 => 40,
            Periodicity::Ms80 => 80,
            Periodicity::Ms160 => 160,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.as_ms() as u64)
    }
}

impl TryFrom<u16> for Periodicity {
    type Error = BeamError;

    fn try_from(ms: u16) -> Result<Self, Self::Error> {
        match ms {
            0 => Ok(Periodicity::Ms0),
            1 => Ok(Periodicity::Ms1),
            5 => Ok(Periodicity::Ms5),
            10 => Ok(Periodicity::Ms10),
            20 => Ok(Periodicity::Ms20),
            40 => Ok(Periodicity::Ms40),
            80 => Ok(Periodicity::Ms80),
            160 => Ok(Periodicity::Ms160),
            other => Err(BeamError::InvalidReportingPeriod(other)),
        }
    }
}

impl From<Periodicity> for u16 {
    fn from(p: Periodicity) -> u16 {
        p.as_ms()
    }
}

/// Symbol offsets of the SS blocks inside one burst set.
///
/// An empty pattern means "every slot carries a block".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SsBurstPattern {
    offsets: Vec<u16>,
}

impl SsBurstPattern {
    pub fn new(offsets: Vec<u16>) -> Self {
        Self { offsets }
    }

    /// Built-in pattern for a numerology.
    ///
    /// With `enabled == false`, or for numerologies without a table, the
    /// pattern is empty.
    pub fn for_scs(scs: SubcarrierSpacing, enabled: bool) -> Self {
        if !enabled {
            return Self::default();
        }
        let offsets = match scs {
            SubcarrierSpacing::Scs60KHz => SS_BURST_PATTERN_SCS60.to_vec(),
            SubcarrierSpacing::Scs120KHz => SS_BURST_PATTERN_SCS120.to_vec(),
            SubcarrierSpacing::Scs240KHz => SS_BURST_PATTERN_SCS240.to_vec(),
            _ => Vec::new(),
        };
        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Symbol offset of pattern entry `index`.
    pub fn offset(&self, index: u16) -> Option<u16> {
        self.offsets.get(index as usize).copied()
    }

    pub fn offsets(&self) -> &[u16] {
        &self.offsets
    }

    /// Whether `slot` is part of the sync-burst window.
    pub fn contains(&self, slot: u16) -> bool {
        if self.offsets.is_empty() {
            return true;
        }
        self.offsets
            .iter()
            .take_while(|&&o| o <= slot)
            .any(|&o| o == slot)
    }
}

/// Everything needed to time SS block occurrences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurstTiming {
    pub scs: SubcarrierSpacing,
    pub pattern: SsBurstPattern,
    pub burst_set_period: Periodicity,
}

impl BurstTiming {
    pub fn new(scs: SubcarrierSpacing, pattern_enabled: bool, burst_set_period: Periodicity) -> Self {
        Self {
            scs,
            pattern: SsBurstPattern::for_scs(scs, pattern_enabled),
            burst_set_period,
        }
    }

    /// Duration of `symbols` OFDM symbols.
    pub fn symbols(&self, symbols: u16) -> Duration {
        self.scs.symbol_period() * symbols as u32
    }

    /// Offset of the first block inside a burst set.
    pub fn first_block_offset(&self) -> Duration {
        self.symbols(self.pattern.offset(0).unwrap_or(0))
    }
}

impl Default for BurstTiming {
    fn default() -> Self {
        Self::new(SubcarrierSpacing::Scs120KHz, true, Periodicity::Ms20)
    }
}

/// Re-arms the SS block counter at every burst-set boundary.
///
/// Each firing resets the counter and registers the next firing one
/// burst-set period (minus one nanosecond, so it lands before the first
/// block of the next set) later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsBurstScheduler {
    period: Periodicity,
}

impl SsBurstScheduler {
    pub fn new(period: Periodicity) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Periodicity {
        self.period
    }

    /// Delay until the next re-arm.
    pub fn next_delay(&self) -> Duration {
        self.period.as_duration().saturating_sub(Duration::from_nanos(1))
    }

    /// Reset the in-window counter and register the next re-arm.
    pub fn rearm<E>(
        &self,
        sweep: &mut BeamSweepCycle,
        events: &mut EventScheduler<E>,
        owner: &OwnerToken,
        event: E,
    ) {
        sweep.reset_blocks();
        let delay = self.next_delay();
        trace!(at = ?events.now(), next_in = ?delay, "SS burst set re-armed");
        events.schedule(delay, owner, event);
    }
}

/// Validate that `slot` indexes into `pattern`.
pub(crate) fn check_slot(pattern: &SsBurstPattern, slot: u16) -> BeamResult<()> {
    if pattern.is_empty() {
        return Err(BeamError::EmptyBurstPattern);
    }
    if slot as usize >= pattern.len() {
        return Err(BeamError::BurstSlotOutOfRange {
            slot,
            pattern_len: pattern.len(),
        });
    }
    Ok(())
}
