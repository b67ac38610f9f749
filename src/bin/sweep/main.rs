// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Shock Sweep Runner
//
// Monte Carlo shock sweeps over a mandi network, seedable PRNG, JSON report.
//
// Usage:
//   cargo run --release --bin sweep                        # All scenarios (30 runs each)
//   cargo run --release --bin sweep -- --runs 5            # Quick mode
//   cargo run --release --bin sweep -- SUPPLY              # Filter by name/label/category
//   cargo run --release --bin sweep -- --seed 42           # Custom base seed
//   cargo run --release --bin sweep -- --data ./data       # Market data directory
//   cargo run --release --bin sweep -- --config sweep.json # EngineConfig file

mod monte_carlo;
mod report;
mod scenarios;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mandi_engine::source::{JsonGraphSource, MarketGraphSource};
use mandi_engine::{EngineConfig, MandiResult};

use report::*;
use scenarios::*;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    data_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        runs: 30,
        seed: 0,
        data_dir: None,
        config: None,
        filter: None,
    };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--runs" => {
                i += 1;
                if i < args.len() {
                    cli.runs = args[i].parse().unwrap_or(30);
                }
            }
            "--seed" => {
                i += 1;
                if i < args.len() {
                    cli.seed = args[i].parse().unwrap_or(0);
                }
            }
            "--data" => {
                i += 1;
                if i < args.len() {
                    cli.data_dir = Some(PathBuf::from(&args[i]));
                }
            }
            "--config" => {
                i += 1;
                if i < args.len() {
                    cli.config = Some(PathBuf::from(&args[i]));
                }
            }
            arg if !arg.starts_with('-') => {
                cli.filter = Some(arg.to_string());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

fn load_config(cli: &CliArgs) -> MandiResult<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    Ok(config)
}

fn write_report(report: &SweepReport) -> MandiResult<PathBuf> {
    let dir = std::path::Path::new("sweep-results");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("sweep-{}.json", report.timestamp));
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    Ok(path)
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = parse_args();

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(2);
        }
    };
    let graph = match JsonGraphSource::from_files(config.market_path(), config.connectivity_path())
        .and_then(|source| source.load_graph())
    {
        Ok(g) if !g.is_empty() => Arc::new(g),
        Ok(_) => {
            error!(path = %config.market_path().display(), "market data has no mandis");
            std::process::exit(2);
        }
        Err(e) => {
            error!(error = %e, "failed to load market data");
            std::process::exit(2);
        }
    };

    let all_scenarios = scenarios();
    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios.iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower)
                          || s.label.to_lowercase().contains(&f_lower)
                          || s.category.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    info!(
        markets = graph.markets().len(),
        connections = graph.connections().len(),
        scenarios = to_run.len(),
        runs = cli.runs,
        seed = cli.seed,
        "starting sweep"
    );

    println!("\n  Mandi Shock Sweep v{}", env!("CARGO_PKG_VERSION"));
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  {:<34} {:>5} {:>14} {:>12} {:>8} {:>6} {:>7}",
        "Scenario", "Pass%", "Impact%", "NewStress", "HighRisk", "Hops", "Time");
    println!("  {}", "-".repeat(92));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = monte_carlo::run_monte_carlo(scenario, &graph, cli.runs, cli.seed);

        let pass_pct = report.pass_rate * 100.0;
        let status = if report.pass_rate >= 1.0 { "PASS" } else { "FAIL" };

        println!("  {:<34} {:>4}% {:>7.2}±{:<5.2} {:>12.1} {:>7.0}% {:>6.1} {:>5.0}us  {}",
            report.label,
            pass_pct as u32,
            report.price_impact.mean, report.price_impact.half_width(),
            report.new_stress.mean,
            report.high_risk_rate * 100.0,
            report.affected_count.mean,
            report.elapsed_us.mean,
            status,
        );

        mc_reports.push(report);
    }

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= 1.0).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(92));
    println!("  Total: {}  Passed: {}  Failed: {}  Suite time: {:.2}s\n",
        total, passed, failed, suite_start.elapsed().as_secs_f64());

    // ─── Write JSON Report ──────────────────────────────────────────────

    let report = SweepReport {
        timestamp: chrono::Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string(),
        version: env!("CARGO_PKG_VERSION"),
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        markets: graph.markets().len(),
        connections: graph.connections().len(),
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        scenarios: mc_reports,
    };

    match write_report(&report) {
        Ok(path) => println!("  Results saved to: {}\n", path.display()),
        Err(e) => error!(error = %e, "failed to write sweep report"),
    }

    if failed > 0 {
        std::process::exit(1);
    }
}
