//! Scenario engine
//!
//! Drives two [`BeamManager`]s from one [`EventScheduler`]:
//!
//! ```text
//!  SsBlock ──► channel.compute_sinr(tx, rx) ──► UE add_sinr
//!       │ next_burst_time
//!       ├── within the burst set: next slot
//!       └── burst set done: UE steps rx ──(rx sweep wrapped)──► update_best
//!                                                                  │
//!                      first success: activate, enable reporting   │
//!                                                                  ▼
//!  CsiRefresh (UE, every period) ──► Deliver(SyncMessage) ──► gNB apply
//!  CsiResourceCheck (gNB, every period) ──► due_lists / advance_timers
//! ```
//!
//! SS blocks, re-arming and CSI refresh belong to the UE; resource checks to
//! the gNB. Deliveries belong to the receiving node.

use super::config::ScenarioConfig;
use crate::channel::SyntheticBeamChannel;
use crate::error::{SimError, SimResult};
use mmbeam_core::scheduler::SchedulerStats;
use mmbeam_core::{
    BeamManager, BeamPairKey, BurstTiming, ChannelModel, Codebook, EventScheduler, GridGeometry,
    OwnerToken, SsBurstScheduler, SweepSide, SyncMessage,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

#[derive(Debug)]
enum Event {
    SsBlock,
    Rearm,
    ClearMeasurements,
    CsiRefresh,
    CsiResourceCheck,
    Deliver(SyncMessage),
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    ss_blocks: u64,
    sweeps_completed: u64,
    messages_delivered: u64,
    csi_refreshes: u64,
    csi_resources_served: u64,
    beam_switches: u64,
}

/// Summary of a scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub name: String,
    pub ss_blocks: u64,
    pub sweeps_completed: u64,
    /// UE's best pair from the last sweep or CSI switch
    pub best_pair: Option<BeamPairKey>,
    pub best_avg_sinr: f64,
    /// Pair the UE is steered to
    pub active_pair: Option<BeamPairKey>,
    /// Noise-free optimum of the channel at the end of the run
    pub optimal_pair: Option<BeamPairKey>,
    /// Grid steps between the active pair and the optimum, summed over both sides
    pub pointing_error: Option<u16>,
    pub ue_tracked: usize,
    pub gnb_tracked: usize,
    pub messages_delivered: u64,
    pub csi_refreshes: u64,
    pub csi_resources_served: u64,
    pub beam_switches: u64,
    pub events: SchedulerStats,
}

/// Discrete-event engine for one gNB/UE link.
pub struct ScenarioEngine {
    config: ScenarioConfig,
    gnb: BeamManager,
    ue: BeamManager,
    channel: SyntheticBeamChannel,
    timing: BurstTiming,
    rearm: SsBurstScheduler,
    events: EventScheduler<Event>,
    gnb_owner: OwnerToken,
    ue_owner: OwnerToken,
    counters: Counters,
    started: bool,
}

impl ScenarioEngine {
    pub fn new(config: ScenarioConfig) -> SimResult<Self> {
        config.validate()?;

        let mut gnb = BeamManager::new(config.gnb, SweepSide::Transmit, &config.beam)?;
        let mut ue = BeamManager::new(config.ue, SweepSide::Receive, &config.beam)?;
        let tx_grid = config.beam.grid(SweepSide::Transmit);
        let rx_grid = config.beam.grid(SweepSide::Receive);
        if config.generate_codebooks {
            gnb.sweep_mut()
                .set_codebook(Arc::new(Codebook::kronecker_dft(tx_grid.width, tx_grid.height)));
            ue.sweep_mut()
                .set_codebook(Arc::new(Codebook::kronecker_dft(rx_grid.width, rx_grid.height)));
        }

        let timing = config.beam.burst_timing()?;
        let interval = timing.burst_set_period.as_duration();
        gnb.initialize(interval, Duration::ZERO)?;
        ue.initialize(interval, Duration::ZERO)?;

        let tx_codebook = sweep_codebook(&gnb, tx_grid)?;
        let rx_codebook = sweep_codebook(&ue, rx_grid)?;
        let mut channel =
            SyntheticBeamChannel::new(config.channel.clone(), tx_codebook, rx_codebook, tx_grid, rx_grid)?;
        channel.set_path(config.gnb, config.path);

        info!(
            scenario = %config.name,
            gnb = %config.gnb,
            ue = %config.ue,
            strategy = ?config.beam.strategy_params().strategy,
            ss_blocks_per_set = timing.pattern.len(),
            "Scenario ready"
        );

        Ok(Self {
            rearm: SsBurstScheduler::new(timing.burst_set_period),
            config,
            gnb,
            ue,
            channel,
            timing,
            events: EventScheduler::new(),
            gnb_owner: OwnerToken::new(),
            ue_owner: OwnerToken::new(),
            counters: Counters::default(),
            started: false,
        })
    }

    /// Run to the configured duration and summarise.
    pub fn run(&mut self) -> SimResult<ScenarioReport> {
        self.run_until(self.config.duration())?;
        let report = self.report();
        info!(
            scenario = %report.name,
            sweeps = report.sweeps_completed,
            best = ?report.best_pair,
            switches = report.beam_switches,
            delivered = report.messages_delivered,
            "Scenario finished"
        );
        Ok(report)
    }

    /// Process every event due at or before `until`.
    pub fn run_until(&mut self, until: Duration) -> SimResult<()> {
        if !self.started {
            self.start();
        }
        while self.events.peek_time().map_or(false, |t| t <= until) {
            let Some((now, event)) = self.events.pop() else {
                break;
            };
            self.handle(now, event)?;
        }
        Ok(())
    }

    /// Take the UE off the air; its pending events are dropped.
    pub fn detach_ue(&self) {
        info!(ue = %self.config.ue, "UE detached");
        self.ue_owner.retire();
    }

    pub fn report(&self) -> ScenarioReport {
        let best = self.ue.best_pair();
        let c = self.counters;
        let active = self.ue.active_pair();
        let optimal = self.channel.optimal_pair(self.config.gnb);
        let grid = &self.config.beam.grid;
        let pointing_error = active.zip(optimal).map(|(a, o)| {
            grid.tx.wrapped_distance(a.tx, o.tx) + grid.rx.wrapped_distance(a.rx, o.rx)
        });
        ScenarioReport {
            name: self.config.name.clone(),
            ss_blocks: c.ss_blocks,
            sweeps_completed: c.sweeps_completed,
            best_pair: (!best.is_null()).then(|| best.key()),
            best_avg_sinr: best.avg_sinr,
            active_pair: active,
            optimal_pair: optimal,
            pointing_error,
            ue_tracked: self.ue.total_tracked_candidates(),
            gnb_tracked: self.gnb.total_tracked_candidates(),
            messages_delivered: c.messages_delivered,
            csi_refreshes: c.csi_refreshes,
            csi_resources_served: c.csi_resources_served,
            beam_switches: c.beam_switches,
            events: self.events.stats().clone(),
        }
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn now(&self) -> Duration {
        self.events.now()
    }

    pub fn gnb(&self) -> &BeamManager {
        &self.gnb
    }

    pub fn ue(&self) -> &BeamManager {
        &self.ue
    }

    pub fn channel(&self) -> &SyntheticBeamChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut SyntheticBeamChannel {
        &mut self.channel
    }

    fn start(&mut self) {
        self.started = true;
        let first = self.timing.first_block_offset();
        self.events.schedule_at(first, &self.ue_owner, Event::SsBlock);
        self.events.schedule(self.rearm.next_delay(), &self.ue_owner, Event::Rearm);
    }

    fn handle(&mut self, now: Duration, event: Event) -> SimResult<()> {
        match event {
            Event::SsBlock => self.on_ss_block(now)?,
            Event::Rearm => {
                self.gnb.sweep_mut().reset_blocks();
                self.rearm
                    .rearm(self.ue.sweep_mut(), &mut self.events, &self.ue_owner, Event::Rearm);
            }
            Event::ClearMeasurements => {
                debug!(at = ?now, "Clearing SS measurements");
                self.ue.clear_measurements();
            }
            Event::CsiRefresh => self.on_csi_refresh(now),
            Event::CsiResourceCheck => self.on_csi_resource_check(now),
            Event::Deliver(msg) => self.deliver(msg, now),
        }
        Ok(())
    }

    fn on_ss_block(&mut self, now: Duration) -> SimResult<()> {
        // position inside the burst set, zeroed by Rearm
        let slot = self.ue.sweep().blocks_since_update();
        let gnb = self.config.gnb;
        let tx = self.gnb.sweep().current_beam();
        let rx = self.ue.sweep().current_beam();
        let sample = self.channel.compute_sinr(gnb, BeamPairKey::new(tx, rx));
        trace!(slot, tx, rx, avg_sinr = sample.avg(), "SS block");
        self.ue.add_sinr(gnb, tx, rx, sample);

        let last_in_set = slot as usize + 1 >= self.timing.pattern.len();
        let delay = self.ue.sweep_mut().next_burst_time(&self.timing, slot, now)?;
        self.events.schedule(delay, &self.ue_owner, Event::SsBlock);

        self.ue.sweep_mut().increase_blocks();
        self.gnb.sweep_mut().increase_blocks();
        self.gnb.sweep_mut().step();
        self.counters.ss_blocks += 1;

        if last_in_set {
            self.ue.sweep_mut().step();
            if self.ue.sweep().at_cycle_start() {
                self.on_sweep_complete(now)?;
            }
        }
        Ok(())
    }

    fn on_sweep_complete(&mut self, now: Duration) -> SimResult<()> {
        self.counters.sweeps_completed += 1;
        let outcome = self.ue.update_best(now);
        if let Some(delay) = outcome.clear_after {
            self.events.schedule(delay, &self.ue_owner, Event::ClearMeasurements);
        }

        if outcome.best.is_null() {
            warn!(sweep = self.counters.sweeps_completed, "Sweep finished without a usable pair");
        } else {
            if self.ue.active_pair().is_none() {
                self.ue.activate(&outcome.best, &mut self.channel);
            }
            if self.config.csi_reporting {
                if !self.ue.reporting_enabled() {
                    self.start_reporting(now);
                }
                let messages = self.ue.notify_peers();
                self.push(messages);
            }
        }

        let drift = self.config.drift;
        if !drift.is_zero() {
            self.channel.drift(self.config.gnb, drift.tx, drift.rx)?;
            debug!(path = ?self.channel.path(self.config.gnb), "Path drifted");
        }
        Ok(())
    }

    fn start_reporting(&mut self, now: Duration) {
        self.ue.enable_reporting();
        self.gnb.enable_reporting();
        self.ue.find_candidates(now);

        let period = self.ue.reporting_period().as_duration();
        if period.is_zero() {
            return;
        }
        self.events.schedule(period, &self.ue_owner, Event::CsiRefresh);
        // gNB allocates the resource one slot ahead of each reporting instant
        let check = period.saturating_sub(self.timing.scs.slot_period());
        self.events.schedule(check, &self.gnb_owner, Event::CsiResourceCheck);
    }

    fn on_csi_refresh(&mut self, now: Duration) {
        let outcome = self.ue.csi_refresh(&mut self.channel, now);
        self.counters.csi_refreshes += 1;
        if outcome.switched_to.is_some() {
            self.counters.beam_switches += 1;
        }
        self.push(outcome.messages);
        if let Some(next) = outcome.next_in {
            self.events.schedule(next, &self.ue_owner, Event::CsiRefresh);
        }
    }

    fn on_csi_resource_check(&mut self, now: Duration) {
        let due = self.gnb.due_lists(now);
        for (peer, list) in &due {
            trace!(peer = %peer, candidates = list.len(), "CSI resource due");
        }
        self.counters.csi_resources_served += due.len() as u64;
        self.gnb.advance_timers(due.keys());

        let period = self.gnb.reporting_period().as_duration();
        if !period.is_zero() {
            self.events.schedule(period, &self.gnb_owner, Event::CsiResourceCheck);
        }
    }

    fn push(&mut self, messages: Vec<SyncMessage>) {
        for msg in messages {
            let owner = if msg.to == self.config.gnb {
                &self.gnb_owner
            } else {
                &self.ue_owner
            };
            self.events.schedule(Duration::ZERO, owner, Event::Deliver(msg));
        }
    }

    fn deliver(&mut self, msg: SyncMessage, now: Duration) {
        let applied = if msg.to == self.config.gnb {
            self.gnb.apply(msg, now)
        } else if msg.to == self.config.ue {
            self.ue.apply(msg, now)
        } else {
            warn!(to = %msg.to, "No node for sync message");
            false
        };
        if applied {
            self.counters.messages_delivered += 1;
        }
    }
}

fn sweep_codebook(manager: &BeamManager, grid: GridGeometry) -> SimResult<Arc<Codebook>> {
    let codebook = manager
        .sweep()
        .codebook()
        .cloned()
        .ok_or_else(|| SimError::InvalidScenario(format!("{:?} codebook missing", manager.side())))?;
    if codebook.len() != grid.num_beams() || codebook.num_elements() != grid.num_beams() {
        return Err(SimError::InvalidScenario(format!(
            "{:?} codebook is {}x{}, grid has {} beams",
            manager.side(),
            codebook.len(),
            codebook.num_elements(),
            grid.num_beams()
        )));
    }
    Ok(codebook)
}
