// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Sweep Scenarios

use mandi_engine::simulation::ShockType;

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub shock: fn() -> ShockType,
    /// Inclusive intensity range drawn per run.
    pub intensity: (u32, u32),
    /// Inclusive duration range (days) drawn per run.
    pub duration: (u32, u32),
    /// Random transfers executed against a fresh ledger per run.
    pub transfers: usize,
    pub criteria: PassCriteria,
}

pub struct PassCriteria {
    /// Allowed gap between a ripple price change and its decayed origin impact.
    pub ripple_tolerance: f64,
    pub require_conservation: bool,
    /// Shocked price must not fall below the unshocked drift price.
    pub require_price_above_drift: bool,
    /// Target arrivals must stay exactly as loaded.
    pub require_arrivals_unchanged: bool,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            ripple_tolerance: 0.01,
            require_conservation: true,
            require_price_above_drift: true,
            require_arrivals_unchanged: false,
        }
    }
}

fn rain() -> ShockType {
    ShockType::Rain
}

fn supply_drop() -> ShockType {
    ShockType::SupplyDrop
}

fn transport() -> ShockType {
    ShockType::Transport
}

fn demand_spike() -> ShockType {
    ShockType::DemandSpike
}

fn hailstorm() -> ShockType {
    ShockType::Other("hailstorm".to_string())
}

// ─── Scenario Table ─────────────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "MONSOON_RAIN",
            label: "Monsoon rain (heavy, 1-2 weeks)",
            category: "supply",
            shock: rain,
            intensity: (40, 90),
            duration: (3, 14),
            transfers: 4,
            criteria: PassCriteria::default(),
        },
        Scenario {
            name: "SUPPLY_DROP_MILD",
            label: "Supply drop (mild, short)",
            category: "supply",
            shock: supply_drop,
            intensity: (5, 30),
            duration: (1, 7),
            transfers: 4,
            criteria: PassCriteria::default(),
        },
        Scenario {
            name: "SUPPLY_DROP_SEVERE",
            label: "Supply drop (severe, long)",
            category: "supply",
            shock: supply_drop,
            intensity: (60, 100),
            duration: (7, 30),
            transfers: 8,
            criteria: PassCriteria::default(),
        },
        Scenario {
            name: "TRANSPORT_STRIKE",
            label: "Transport strike",
            category: "supply",
            shock: transport,
            intensity: (30, 80),
            duration: (1, 10),
            transfers: 4,
            criteria: PassCriteria::default(),
        },
        Scenario {
            name: "FESTIVAL_DEMAND",
            label: "Festival demand spike",
            category: "demand",
            shock: demand_spike,
            intensity: (20, 70),
            duration: (3, 10),
            transfers: 4,
            criteria: PassCriteria { require_arrivals_unchanged: true, ..PassCriteria::default() },
        },
        Scenario {
            name: "UNMODELLED_SHOCK",
            label: "Unmodelled shock (pass-through)",
            category: "control",
            shock: hailstorm,
            intensity: (1, 100),
            duration: (1, 30),
            transfers: 2,
            criteria: PassCriteria { require_arrivals_unchanged: true, ..PassCriteria::default() },
        },
    ]
}
