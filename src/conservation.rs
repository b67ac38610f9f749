// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Conservation Audit

//! Conservation of arrivals across the ledger.
//!
//! ```text
//! source_prev - source_new == quantity == dest_new - dest_prev
//! ```
//!
//! holds for every transfer, and for every commodity
//!
//! ```text
//! live_total == baseline_total + sum(update_new - update_prev)
//! ```
//!
//! since transfers only move stock and operator updates are the only way
//! stock enters or leaves the system. Arrivals are integers, so both checks
//! are exact.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::market_state::StateHistoryEntry;
use crate::types::Market;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConservationError {
    #[error("ledger entry {index}: {side} moved {moved} but transfer quantity is {quantity}")]
    TransferImbalance {
        index: usize,
        side: &'static str,
        moved: i128,
        quantity: u64,
    },

    #[error("commodity '{commodity}': live total {actual}, ledger implies {expected}")]
    TotalMismatch {
        commodity: String,
        expected: i128,
        actual: i128,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub entries_checked: usize,
    pub transfers_checked: usize,
    pub quantity_moved: u64,
    /// Net arrivals added by operator updates, per lower-cased commodity.
    pub net_update_delta: BTreeMap<String, i128>,
}

/// Check every transfer entry moves exactly its quantity on both sides.
pub fn audit_ledger(history: &[StateHistoryEntry]) -> Result<AuditReport, ConservationError> {
    let mut report = AuditReport { entries_checked: history.len(), ..AuditReport::default() };

    for (index, entry) in history.iter().enumerate() {
        match entry {
            StateHistoryEntry::MarketUpdate(u) => {
                *report.net_update_delta.entry(u.commodity.to_lowercase()).or_default() +=
                    u.new_arrivals as i128 - u.previous_arrivals as i128;
            }
            StateHistoryEntry::TransferExecution(t) => {
                let out = t.source.previous_arrivals as i128 - t.source.new_arrivals as i128;
                let inn = t.destination.new_arrivals as i128 - t.destination.previous_arrivals as i128;
                for (side, moved) in [("source", out), ("destination", inn)] {
                    if moved != t.quantity as i128 {
                        return Err(ConservationError::TransferImbalance {
                            index,
                            side,
                            moved,
                            quantity: t.quantity,
                        });
                    }
                }
                report.transfers_checked += 1;
                report.quantity_moved = report.quantity_moved.saturating_add(t.quantity);
            }
        }
    }
    Ok(report)
}

fn totals(markets: &[Market]) -> BTreeMap<String, i128> {
    let mut out = BTreeMap::new();
    for c in markets.iter().flat_map(|m| &m.commodities) {
        *out.entry(c.name.to_lowercase()).or_default() += c.arrivals as i128;
    }
    out
}

/// Audit the ledger, then reconcile live per-commodity totals against the
/// baseline plus the ledger's net operator updates.
pub fn audit_state(
    baseline: &[Market],
    live: &[Market],
    history: &[StateHistoryEntry],
) -> Result<AuditReport, ConservationError> {
    let report = audit_ledger(history)?;
    let base = totals(baseline);
    let now = totals(live);

    let mut names: Vec<&String> = base.keys().chain(now.keys()).collect();
    names.sort();
    names.dedup();
    for name in names {
        let expected = base.get(name).copied().unwrap_or(0)
            + report.net_update_delta.get(name).copied().unwrap_or(0);
        let actual = now.get(name).copied().unwrap_or(0);
        if expected != actual {
            return Err(ConservationError::TotalMismatch { commodity: name.clone(), expected, actual });
        }
    }
    Ok(report)
}
