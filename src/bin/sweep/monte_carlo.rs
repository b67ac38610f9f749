// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Monte Carlo Sweep
//
// Each scenario runs N times with seeds base..base+N, drawing origin mandi,
// intensity and duration from a ChaCha8Rng. Every run also drives a fresh
// ledger with random transfers and audits it.

use std::sync::Arc;
use std::time::Instant;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use mandi_engine::conservation::audit_state;
use mandi_engine::simulation::{simulate, ShockRequest, ShockType, SimulationResult};
use mandi_engine::stress::HIGH_RISK_ABOVE;
use mandi_engine::{MarketGraph, MarketState};

use crate::report::*;
use crate::scenarios::Scenario;

const LEVEL1_SHARE: f64 = 0.6;
const LEVEL2_SHARE: f64 = 0.3;

/// Run a single scenario iteration with a specific seed.
pub fn run_single(scenario: &Scenario, graph: &Arc<MarketGraph>, seed: u64) -> SweepResult {
    let start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let markets = graph.markets();
    let origin = &markets[rng.gen_range(0..markets.len())];
    let intensity = rng.gen_range(scenario.intensity.0..=scenario.intensity.1);
    let duration = rng.gen_range(scenario.duration.0..=scenario.duration.1);
    let shock = (scenario.shock)();
    let request = ShockRequest::new(&origin.id, shock.clone(), intensity, duration);

    let mut failures = Vec::new();

    let sim = match simulate(graph, &request) {
        Ok(sim) => Some(sim),
        Err(e) => {
            failures.push(format!("simulate: {e}"));
            None
        }
    };
    // Same market and parameters with no modelled effect: the drift the
    // baseline demand/supply ratio produces on its own.
    let drift = ShockRequest::new(&origin.id, ShockType::Other("none".to_string()), intensity, duration);
    if let (Some(sim), Ok(base)) = (&sim, simulate(graph, &drift)) {
        check_simulation(scenario, &shock, sim, &base, &mut failures);
    }

    let ledger = run_ledger(scenario, graph, &mut rng);
    if scenario.criteria.require_conservation && !ledger.conservation_holds {
        failures.push("ledger conservation audit failed".to_string());
    }

    let (price_impact, previous_stress, new_stress, affected_count) = sim
        .as_ref()
        .map(|s| (s.price_impact, s.previous_stress_score, s.new_stress_score, s.affected_mandis.len()))
        .unwrap_or((0.0, 0, 0, 0));

    if !failures.is_empty() {
        warn!(scenario = scenario.name, seed, failures = ?failures, "run failed");
    }

    SweepResult {
        scenario: scenario.label.to_string(),
        seed,
        pass: failures.is_empty(),
        failures,
        mandi_id: origin.id.clone(),
        shock_type: shock.as_str().to_string(),
        intensity,
        duration,
        price_impact,
        previous_stress,
        new_stress,
        stress_delta: new_stress as f64 - previous_stress as f64,
        affected_count,
        high_risk_after: new_stress > HIGH_RISK_ABOVE,
        transfers_executed: ledger.executed,
        transfers_rejected: ledger.rejected,
        quantity_moved: ledger.quantity_moved,
        conservation_holds: ledger.conservation_holds,
        elapsed_us: start.elapsed().as_micros(),
    }
}

fn check_simulation(
    scenario: &Scenario,
    shock: &ShockType,
    sim: &SimulationResult,
    drift: &SimulationResult,
    failures: &mut Vec<String>,
) {
    let c = &scenario.criteria;

    if c.require_price_above_drift && sim.predicted_price < drift.predicted_price {
        failures.push(format!(
            "price {} below unshocked drift {}",
            sim.predicted_price, drift.predicted_price
        ));
    }
    if c.require_arrivals_unchanged && sim.predicted_arrivals != sim.original_arrivals {
        failures.push(format!(
            "arrivals moved {} -> {}",
            sim.original_arrivals, sim.predicted_arrivals
        ));
    }
    if shock.is_supply_shock() && sim.predicted_arrivals > sim.original_arrivals {
        failures.push("supply shock increased arrivals".to_string());
    }
    if matches!(shock, ShockType::Other(_)) && sim.predicted_price != drift.predicted_price {
        failures.push(format!("unmodelled shock diverged from drift: {}", sim.predicted_price));
    }

    for a in &sim.affected_mandis {
        let share = if a.ripple_level == 1 { LEVEL1_SHARE } else { LEVEL2_SHARE };
        let gap = (a.price_change - sim.price_impact * share).abs();
        if gap > c.ripple_tolerance {
            failures.push(format!(
                "{} (level {}) moved {} vs origin {}",
                a.mandi_id, a.ripple_level, a.price_change, sim.price_impact
            ));
        }
    }
}

struct LedgerRun {
    executed: usize,
    rejected: usize,
    quantity_moved: u64,
    conservation_holds: bool,
}

/// Random transfers along existing connections, then a conservation audit.
fn run_ledger(scenario: &Scenario, graph: &Arc<MarketGraph>, rng: &mut ChaCha8Rng) -> LedgerRun {
    let state = MarketState::new(Arc::clone(graph));
    let connections = graph.connections();
    let mut run = LedgerRun { executed: 0, rejected: 0, quantity_moved: 0, conservation_holds: true };

    if !connections.is_empty() {
        for _ in 0..scenario.transfers {
            let edge = &connections[rng.gen_range(0..connections.len())];
            let (src, dst) = if rng.gen_bool(0.5) { (&edge.from, &edge.to) } else { (&edge.to, &edge.from) };
            let Ok(source) = state.snapshot(src) else {
                run.rejected += 1;
                continue;
            };
            let cap = (source.arrivals / 4).max(1);
            let quantity = rng.gen_range(1..=cap);

            match state.execute_transfer(src, dst, &source.commodity, quantity) {
                Ok(outcome) => {
                    run.executed += 1;
                    run.quantity_moved += outcome.quantity;
                }
                Err(e) => {
                    debug!(from = %src, to = %dst, quantity, error = %e, "transfer rejected");
                    run.rejected += 1;
                }
            }
        }
    }

    run.conservation_holds = match (state.live_markets(), state.full_history()) {
        (Ok(live), Ok(history)) => audit_state(graph.markets(), &live, &history).is_ok(),
        _ => false,
    };
    run
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats.
pub fn run_monte_carlo(
    scenario: &Scenario,
    graph: &Arc<MarketGraph>,
    n_runs: usize,
    base_seed: u64,
) -> MonteCarloReport {
    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        results.push(run_single(scenario, graph, base_seed + i as u64));
    }
    aggregate(scenario, results)
}

fn aggregate(scenario: &Scenario, results: Vec<SweepResult>) -> MonteCarloReport {
    let n = results.len();
    let rate = |f: fn(&SweepResult) -> bool| {
        if n == 0 {
            0.0
        } else {
            results.iter().filter(|r| f(r)).count() as f64 / n as f64
        }
    };
    let stats = |f: fn(&SweepResult) -> f64| Stats::from_samples(&results.iter().map(f).collect::<Vec<_>>());

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        category: scenario.category.to_string(),
        n_runs: n,
        pass_rate: rate(|r| r.pass),
        high_risk_rate: rate(|r| r.high_risk_after),
        price_impact: stats(|r| r.price_impact),
        new_stress: stats(|r| r.new_stress as f64),
        stress_delta: stats(|r| r.stress_delta),
        affected_count: stats(|r| r.affected_count as f64),
        quantity_moved: stats(|r| r.quantity_moved as f64),
        elapsed_us: stats(|r| r.elapsed_us as f64),
        individual_runs: results,
    }
}
