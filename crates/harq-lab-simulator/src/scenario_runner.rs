use anyhow::{Context, Result, anyhow, bail};
use harq_lab_abstract::{NodeKind, SimConfig, TestAction, TestAssertion, TestScenario};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario file")
}

/// Build the topology and schedule every action. eNBs are added before UEs
/// so that attachment can be checked.
pub fn build_simulator(scenario: &TestScenario, config: SimConfig) -> Result<Simulator> {
    let mut sim = Simulator::new(config)?;

    for node in scenario.nodes.iter().filter(|n| n.kind == NodeKind::Enb) {
        sim.add_enb(node.id)?;
    }
    for node in scenario.nodes.iter().filter(|n| n.kind == NodeKind::Ue) {
        let cell = node
            .cell
            .ok_or_else(|| anyhow!("UE {} has no serving cell", node.id))?;
        sim.add_ue(node.id, cell)?;
    }
    for group in &scenario.groups {
        sim.add_group(group.id, group.members.clone());
    }

    for action in &scenario.actions {
        match action {
            TestAction::AppSend {
                tick,
                from,
                to,
                bytes,
            } => sim.schedule_app_send(*tick, *from, *to, *bytes),
            TestAction::CorruptNext { from, to, count } => {
                sim.add_corrupt_next(*from, *to, *count);
            }
            TestAction::Detach { tick, node } => sim.schedule_detach(*tick, *node),
            TestAction::ModeSwitch { tick, tx, rx } => sim.schedule_mode_switch(*tick, *tx, *rx),
        }
    }
    Ok(sim)
}

pub fn run_scenario(path: &Path) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    run_loaded_scenario(&scenario, config)
}

/// Run `scenario` with an already resolved `config` (CLI overrides applied)
/// and check its assertions.
pub fn run_loaded_scenario(scenario: &TestScenario, config: SimConfig) -> Result<SimulationReport> {
    info!("Running Scenario: {}", scenario.name);
    info!("Description: {}", scenario.description);

    let mut sim = build_simulator(scenario, config)?;

    let max_ticks = scenario
        .assertions
        .iter()
        .find_map(|a| {
            if let TestAssertion::MaxTicks { ticks } = a {
                Some(*ticks)
            } else {
                None
            }
        })
        .unwrap_or(sim.config().max_ticks);

    // Run loop
    while sim.step()? {
        if sim.current_time() > max_ticks {
            bail!("Test timed out after {} ticks", max_ticks);
        }
    }

    check_assertions(&sim, &scenario.assertions)?;

    info!("Test Scenario Passed!");
    Ok(sim.export_report())
}

fn check_assertions(sim: &Simulator, assertions: &[TestAssertion]) -> Result<()> {
    for assertion in assertions {
        match assertion {
            TestAssertion::DeliveredCount { to, min, max } => {
                let count = sim
                    .delivered
                    .iter()
                    .filter(|d| to.is_none_or(|to| d.node == to))
                    .count();
                if count < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} pdus delivered, expected min {}",
                        count,
                        min
                    ));
                }
                if let Some(max) = max
                    && count > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: {} pdus delivered, expected max {}",
                        count,
                        max
                    ));
                }
            }
            TestAssertion::DeliveredBytes { to, min } => {
                let bytes = sim.delivered_bytes(*to);
                if bytes < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} bytes delivered, expected min {}",
                        bytes,
                        min
                    ));
                }
            }
            TestAssertion::DiscardedCount { min, max } => {
                let discarded = sim.discarded();
                if discarded < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} pdus discarded, expected min {}",
                        discarded,
                        min
                    ));
                }
                if let Some(max) = max
                    && discarded > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: {} pdus discarded, expected max {}",
                        discarded,
                        max
                    ));
                }
            }
            TestAssertion::TransmissionCount { min, max } => {
                if sim.transmissions < *min {
                    return Err(anyhow!(
                        "Assertion Failed: {} transmissions, expected min {}",
                        sim.transmissions,
                        min
                    ));
                }
                if let Some(max) = max
                    && sim.transmissions > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: {} transmissions, expected max {}",
                        sim.transmissions,
                        max
                    ));
                }
            }
            TestAssertion::MetricMean { name, min, max } => {
                let mean = sim
                    .metrics
                    .mean(name)
                    .ok_or_else(|| anyhow!("Assertion Failed: no samples for metric {}", name))?;
                if let Some(min) = min
                    && mean < *min
                {
                    return Err(anyhow!(
                        "Assertion Failed: mean of {} is {:.3}, expected min {}",
                        name,
                        mean,
                        min
                    ));
                }
                if let Some(max) = max
                    && mean > *max
                {
                    return Err(anyhow!(
                        "Assertion Failed: mean of {} is {:.3}, expected max {}",
                        name,
                        mean,
                        max
                    ));
                }
            }
            TestAssertion::MaxTicks { .. } => {} // Already checked
        }
    }
    Ok(())
}
