use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use harq_lab_abstract::{MacNodeId, SimConfig, Tick};
use harq_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "LTE MAC H-ARQ simulator")]
struct Args {
    /// Load a scenario from disk.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Override the channel seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the tick limit of the run.
    #[arg(long)]
    ticks: Option<Tick>,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("harq-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario = scenario_runner::load_scenario(path)?;
        let mut config = SimConfig::default();
        scenario.config.apply_to(&mut config);
        args.apply_overrides(&mut config);
        scenario_runner::run_loaded_scenario(&scenario, config)?
    } else {
        run_default_sim(&args)?
    };

    print_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn apply_overrides(&self, config: &mut SimConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(ticks) = self.ticks {
            config.max_ticks = ticks;
        }
    }
}

fn run_default_sim(args: &Args) -> Result<SimulationReport> {
    let mut config = SimConfig {
        bler_dl: 0.1,
        bler_ul: 0.2,
        bler_d2d: 0.3,
        seed: 42,
        max_ticks: 2_000,
        ..Default::default()
    };
    args.apply_overrides(&mut config);

    let mut sim = build_default_sim(config)?;
    info!("Starting default headless simulation…");
    sim.run_until_complete()?;
    info!("Simulation complete.");
    Ok(sim.export_report())
}

/// One cell with two UEs: downlink, uplink, a D2D pair and a multicast group.
fn build_default_sim(config: SimConfig) -> Result<Simulator> {
    let enb = MacNodeId(1);
    let ue_a = MacNodeId(2);
    let ue_b = MacNodeId(3);
    let group = MacNodeId(100);

    let mut sim = Simulator::new(config)?;
    sim.add_enb(enb)?;
    sim.add_ue(ue_a, enb)?;
    sim.add_ue(ue_b, enb)?;
    sim.add_group(group, vec![ue_a, ue_b]);

    sim.schedule_app_send(0, enb, ue_a, 6_000);
    sim.schedule_app_send(0, enb, ue_b, 3_000);
    sim.schedule_app_send(10, ue_a, enb, 2_000);
    sim.schedule_app_send(20, ue_b, ue_a, 1_500);
    sim.schedule_app_send(30, ue_a, group, 800);
    Ok(sim)
}

fn print_summary(report: &SimulationReport) {
    info!(
        "Finished after {} ticks: {} pdus ({} bytes) delivered, {} transmissions ({} retransmissions), {} discarded",
        report.duration_ticks,
        report.delivered.len(),
        report.delivered_bytes,
        report.transmissions,
        report.retransmissions,
        report.discarded
    );
    for metric in &report.metrics {
        info!(
            "  {:<28} n={:<5} mean={:.4}",
            metric.name, metric.count, metric.mean
        );
    }
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
