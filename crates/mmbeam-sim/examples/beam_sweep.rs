//! # Beam Sweep Demo
//!
//! One gNB, one UE: exhaustive SS sweep, best-pair selection, CSI reporting
//! and tracking-list synchronization.
//!
//! ## Run
//! ```bash
//! cargo run -p mmbeam-sim --example beam_sweep
//! cargo run -p mmbeam-sim --example beam_sweep -- --strategy 5 --drift 0.5
//! cargo run -p mmbeam-sim --example beam_sweep -- --config scenario.yaml
//! ```

use mmbeam_core::observe::{init_logging, LogConfig};
use mmbeam_sim::scenario::{PathDrift, ScenarioConfig, ScenarioEngine};
use std::path::Path;

fn arg<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match arg(&args, &["--config", "-c"]) {
        Some(path) => ScenarioConfig::load_from(Path::new(path))?,
        None => ScenarioConfig::default(),
    };
    if let Some(strategy) = arg(&args, &["--strategy", "-s"]) {
        config.beam.candidates.strategy = strategy.parse()?;
    }
    if let Some(step) = arg(&args, &["--drift"]) {
        config.drift = PathDrift {
            tx: (step.parse()?, 0.0),
            rx: (0.0, 0.0),
        };
    }
    let logging = if args.iter().any(|a| a == "--verbose" || a == "-v") {
        LogConfig::development()
    } else {
        config.beam.logging.clone()
    };
    init_logging(&logging);

    println!("=== mmWave Beam Sweep ===\n");
    println!("Scenario: {}", config.name);
    println!("  Duration: {} ms", config.duration_ms);
    println!("  Strategy: {:?}", config.beam.strategy_params().strategy);
    println!(
        "  Grids: tx {}x{}, rx {}x{}",
        config.beam.grid.tx.width,
        config.beam.grid.tx.height,
        config.beam.grid.rx.width,
        config.beam.grid.rx.height
    );
    println!("  Expected sweeps: {}", config.expected_sweeps()?);

    let mut engine = ScenarioEngine::new(config)?;
    let report = engine.run()?;

    println!("\nResults:");
    println!("  SS blocks:        {}", report.ss_blocks);
    println!("  Sweeps completed: {}", report.sweeps_completed);
    match report.best_pair {
        Some(pair) => println!(
            "  Best pair:        {} ({:.1} dB)",
            pair,
            10.0 * report.best_avg_sinr.log10()
        ),
        None => println!("  Best pair:        none"),
    }
    if let Some(pair) = report.active_pair {
        println!("  Active pair:      {}", pair);
    }
    if let Some(pair) = report.optimal_pair {
        println!("  Channel optimum:  {}", pair);
    }
    if let Some(steps) = report.pointing_error {
        println!("  Pointing error:   {} grid steps", steps);
    }
    println!("  Beam switches:    {}", report.beam_switches);
    println!("  Tracked (UE/gNB): {}/{}", report.ue_tracked, report.gnb_tracked);
    println!("  Sync messages:    {}", report.messages_delivered);
    println!("  CSI refreshes:    {}", report.csi_refreshes);
    println!(
        "  Events:           {} delivered, {} discarded",
        report.events.delivered, report.events.discarded
    );

    Ok(())
}
