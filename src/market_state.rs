// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Live Market State & Append-Only Ledger

//! Live, mutable copy of the market graph plus the ledger of every change.
//!
//! The baseline graph is never touched. On first access the book clones the
//! baseline markets; from then on only [`MarketState::apply_arrivals_update`]
//! and [`MarketState::execute_transfer`] change it, each appending exactly one
//! [`StateHistoryEntry`]. Every operation validates in full before the first
//! write and runs under a single lock, so a reader never sees half a transfer.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MandiError, MandiResult};
use crate::graph::MarketGraph;
use crate::pricing::{elasticity_price, pct_change, round2};
use crate::stress::{commodity_stress, StressResult};
use crate::types::{Commodity, CommodityUpdate, Market};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

// ─── Ledger Entries ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketUpdateRecord {
    pub timestamp: DateTime<Utc>,
    pub date: String,
    pub mandi_id: String,
    pub mandi_name: String,
    pub commodity: String,
    pub previous_price: f64,
    pub new_price: f64,
    pub previous_arrivals: u64,
    pub new_arrivals: u64,
    pub previous_supply: u64,
    pub new_supply: u64,
    pub base_demand: u64,
    pub optional_context: Option<String>,
    pub rain_flag: bool,
    pub festival_flag: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSide {
    pub mandi_id: String,
    pub mandi_name: String,
    pub previous_arrivals: u64,
    pub new_arrivals: u64,
    pub previous_price: f64,
    pub new_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub timestamp: DateTime<Utc>,
    pub date: String,
    pub commodity: String,
    pub quantity: u64,
    pub source: TransferSide,
    pub destination: TransferSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateHistoryEntry {
    MarketUpdate(MarketUpdateRecord),
    TransferExecution(TransferRecord),
}

impl StateHistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MarketUpdate(r) => r.timestamp,
            Self::TransferExecution(r) => r.timestamp,
        }
    }

    /// Whether the entry touched `market_id`.
    pub fn involves(&self, market_id: &str) -> bool {
        match self {
            Self::MarketUpdate(r) => r.mandi_id == market_id,
            Self::TransferExecution(r) => {
                r.source.mandi_id == market_id || r.destination.mandi_id == market_id
            }
        }
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalsUpdateOutcome {
    pub mandi_id: String,
    pub mandi_name: String,
    pub commodity: String,
    pub is_primary: bool,
    pub previous_price: f64,
    pub new_price: f64,
    pub price_change: f64,
    pub previous_arrivals: u64,
    pub new_arrivals: u64,
    pub arrivals_change: f64,
    pub stress: StressResult,
    pub history_length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub commodity: String,
    pub quantity: u64,
    pub source: TransferSide,
    pub destination: TransferSide,
    pub source_price_change: f64,
    pub dest_price_change: f64,
    pub history_length: usize,
}

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LiveBook {
    /// `None` until first touched, then a deep copy of the baseline.
    markets: Option<Vec<Market>>,
    history: Vec<StateHistoryEntry>,
}

pub struct MarketState {
    baseline: Arc<MarketGraph>,
    book: Mutex<LiveBook>,
    clock: Clock,
}

impl std::fmt::Debug for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketState")
            .field("baseline_markets", &self.baseline.markets().len())
            .finish_non_exhaustive()
    }
}

/// Largest arrivals figure a commodity may hold. Balances and audits carry
/// arrivals as signed 64-bit values, so the ceiling is `i64::MAX`.
pub const MAX_ARRIVALS: u64 = i64::MAX as u64;

/// Whole, positive arrivals figure from raw operator input.
///
/// Accepts JSON numbers and numeric strings. Fractions, zero, negatives and
/// anything above [`MAX_ARRIVALS`] are rejected.
pub fn parse_arrivals(raw: &serde_json::Value) -> MandiResult<u64> {
    let value = match raw {
        serde_json::Value::Null => {
            return Err(MandiError::InvalidArrivals("arrivals is required".into()))
        }
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(v) => return check_arrivals(v),
            None => n.as_f64(),
        },
        serde_json::Value::String(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<u64>() {
                return check_arrivals(v);
            }
            s.parse::<f64>().ok()
        }
        _ => None,
    };
    let value = value
        .filter(|v| v.is_finite())
        .ok_or_else(|| MandiError::InvalidArrivals("arrivals must be a numeric value".into()))?;
    if value <= 0.0 {
        return Err(MandiError::InvalidArrivals("arrivals must be greater than 0".into()));
    }
    if value.fract() != 0.0 {
        return Err(MandiError::InvalidArrivals(format!("arrivals must be a whole number, got {value}")));
    }
    // 2^63 is the first float above MAX_ARRIVALS.
    if value >= 9_223_372_036_854_775_808.0 {
        return Err(too_many_arrivals());
    }
    check_arrivals(value as u64)
}

fn check_arrivals(value: u64) -> MandiResult<u64> {
    match value {
        0 => Err(MandiError::InvalidArrivals("arrivals must be greater than 0".into())),
        v if v > MAX_ARRIVALS => Err(too_many_arrivals()),
        v => Ok(v),
    }
}

fn too_many_arrivals() -> MandiError {
    MandiError::InvalidArrivals(format!("arrivals must not exceed {MAX_ARRIVALS}"))
}

impl MarketState {
    pub fn new(baseline: Arc<MarketGraph>) -> Self {
        Self::with_clock(baseline, Arc::new(Utc::now))
    }

    /// State whose ledger timestamps come from `clock`.
    pub fn with_clock(baseline: Arc<MarketGraph>, clock: Clock) -> Self {
        Self { baseline, book: Mutex::new(LiveBook::default()), clock }
    }

    pub fn baseline(&self) -> &MarketGraph {
        &self.baseline
    }

    /// Current date according to the state's clock.
    pub fn today(&self) -> NaiveDate {
        (self.clock)().date_naive()
    }

    fn lock(&self) -> MandiResult<MutexGuard<'_, LiveBook>> {
        self.book
            .lock()
            .map_err(|_| MandiError::StateUnavailable("market state lock poisoned".into()))
    }

    /// Record a new arrivals figure for one commodity at one market.
    pub fn apply_arrivals_update(
        &self,
        market_id: &str,
        commodity: &str,
        new_arrivals: u64,
        context: Option<&str>,
    ) -> MandiResult<ArrivalsUpdateOutcome> {
        check_arrivals(new_arrivals)?;

        let now = (self.clock)();
        let date = now.format("%Y-%m-%d").to_string();

        let mut guard = self.lock()?;
        let book = &mut *guard;
        let markets = book.markets.get_or_insert_with(|| self.baseline.markets().to_vec());

        let market = markets
            .iter_mut()
            .find(|m| m.id == market_id)
            .ok_or_else(|| MandiError::MarketNotFound(market_id.to_string()))?;
        let idx = resolve_commodity(market, commodity)?;

        let c = &market.commodities[idx];
        let previous_price = c.current_price;
        let previous_arrivals = c.arrivals;
        let previous_supply = c.base_supply;
        let base_demand = c.base_demand;
        let is_primary = c.is_primary;
        let commodity_name = c.name.clone();
        let new_price = elasticity_price(previous_price, new_arrivals as f64, base_demand as f64);

        book.history.push(StateHistoryEntry::MarketUpdate(MarketUpdateRecord {
            timestamp: now,
            date: date.clone(),
            mandi_id: market.id.clone(),
            mandi_name: market.name.clone(),
            commodity: commodity_name.clone(),
            previous_price,
            new_price,
            previous_arrivals,
            new_arrivals,
            previous_supply,
            new_supply: new_arrivals,
            base_demand,
            optional_context: context.map(str::to_string),
            rain_flag: market.rain_flag,
            festival_flag: market.festival_flag,
        }));

        market.record_commodity_update(
            idx,
            CommodityUpdate { previous_price, new_price, previous_arrivals, new_arrivals },
        );
        market.append_history(&date, new_price, new_arrivals);

        info!(
            mandi = %market.id,
            commodity = %commodity_name,
            previous_price,
            new_price,
            previous_arrivals,
            new_arrivals,
            "market update applied"
        );

        Ok(ArrivalsUpdateOutcome {
            mandi_id: market.id.clone(),
            mandi_name: market.name.clone(),
            commodity: commodity_name,
            is_primary,
            previous_price,
            new_price,
            price_change: round2(pct_change(new_price, previous_price)),
            previous_arrivals,
            new_arrivals,
            arrivals_change: round2(pct_change(new_arrivals as f64, previous_arrivals as f64)),
            stress: commodity_stress(market, &market.commodities[idx]),
            history_length: book.history.len(),
        })
    }

    /// Move `quantity` of a commodity from one market to another.
    ///
    /// The destination need not carry the commodity yet; it is created there
    /// with no prior arrivals, the source's price, and `quantity` as demand.
    pub fn execute_transfer(
        &self,
        source_id: &str,
        dest_id: &str,
        commodity: &str,
        quantity: u64,
    ) -> MandiResult<TransferOutcome> {
        if quantity == 0 {
            return Err(MandiError::InvalidQuantity(0));
        }
        if source_id == dest_id {
            return Err(MandiError::SameMarket(source_id.to_string()));
        }

        let now = (self.clock)();
        let date = now.format("%Y-%m-%d").to_string();

        let mut guard = self.lock()?;
        let book = &mut *guard;
        let markets = book.markets.get_or_insert_with(|| self.baseline.markets().to_vec());

        let si = markets
            .iter()
            .position(|m| m.id == source_id)
            .ok_or_else(|| MandiError::MarketNotFound(source_id.to_string()))?;
        let di = markets
            .iter()
            .position(|m| m.id == dest_id)
            .ok_or_else(|| MandiError::MarketNotFound(dest_id.to_string()))?;

        let s_idx = resolve_commodity(&markets[si], commodity)?;
        let src = &markets[si].commodities[s_idx];
        if quantity > src.arrivals {
            return Err(MandiError::InsufficientSupply { requested: quantity, available: src.arrivals });
        }
        let commodity_name = src.name.clone();

        // Source side.
        let s_prev_price = src.current_price;
        let s_prev_arrivals = src.arrivals;
        let s_new_arrivals = s_prev_arrivals - quantity;
        // No demand on record: treat current arrivals as demand.
        let s_demand = if src.base_demand == 0 { src.arrivals } else { src.base_demand };
        let s_new_price = elasticity_price(s_prev_price, s_new_arrivals as f64, s_demand as f64);

        // Destination side; a missing commodity is seeded from the source.
        let d_idx = markets[di].commodity_index(&commodity_name);
        let (d_prev_price, d_prev_arrivals, d_demand) = match d_idx {
            Some(i) => {
                let c = &markets[di].commodities[i];
                let demand = if c.base_demand == 0 { quantity } else { c.base_demand };
                (c.current_price, c.arrivals, demand)
            }
            None => (s_prev_price, 0, quantity),
        };
        let d_new_arrivals = d_prev_arrivals
            .checked_add(quantity)
            .filter(|v| *v <= MAX_ARRIVALS)
            .ok_or_else(|| MandiError::ArrivalsOverflow {
                market_id: markets[di].id.clone(),
                current: d_prev_arrivals,
                added: quantity,
                max: MAX_ARRIVALS,
            })?;
        let d_new_price = elasticity_price(d_prev_price, d_new_arrivals as f64, d_demand as f64);

        let source = TransferSide {
            mandi_id: markets[si].id.clone(),
            mandi_name: markets[si].name.clone(),
            previous_arrivals: s_prev_arrivals,
            new_arrivals: s_new_arrivals,
            previous_price: s_prev_price,
            new_price: s_new_price,
        };
        let destination = TransferSide {
            mandi_id: markets[di].id.clone(),
            mandi_name: markets[di].name.clone(),
            previous_arrivals: d_prev_arrivals,
            new_arrivals: d_new_arrivals,
            previous_price: d_prev_price,
            new_price: d_new_price,
        };

        // Validation is over; everything below is infallible.
        book.history.push(StateHistoryEntry::TransferExecution(TransferRecord {
            timestamp: now,
            date: date.clone(),
            commodity: commodity_name.clone(),
            quantity,
            source: source.clone(),
            destination: destination.clone(),
        }));

        let src_market = &mut markets[si];
        src_market.record_commodity_update(
            s_idx,
            CommodityUpdate {
                previous_price: s_prev_price,
                new_price: s_new_price,
                previous_arrivals: s_prev_arrivals,
                new_arrivals: s_new_arrivals,
            },
        );
        src_market.append_history(&date, s_new_price, s_new_arrivals);

        let dst_market = &mut markets[di];
        let d_idx = match d_idx {
            Some(i) => i,
            None => {
                debug!(mandi = %dst_market.id, commodity = %commodity_name, "seeding commodity at destination");
                dst_market.commodities.push(Commodity {
                    name: commodity_name.clone(),
                    is_primary: false,
                    current_price: d_prev_price,
                    previous_price: d_prev_price,
                    arrivals: 0,
                    previous_arrivals: 0,
                    base_demand: d_demand,
                    base_supply: 0,
                    volatility: 0.0,
                });
                dst_market.commodities.len() - 1
            }
        };
        dst_market.record_commodity_update(
            d_idx,
            CommodityUpdate {
                previous_price: d_prev_price,
                new_price: d_new_price,
                previous_arrivals: d_prev_arrivals,
                new_arrivals: d_new_arrivals,
            },
        );
        dst_market.append_history(&date, d_new_price, d_new_arrivals);

        info!(
            source = %source.mandi_id,
            destination = %destination.mandi_id,
            commodity = %commodity_name,
            quantity,
            "transfer executed"
        );

        Ok(TransferOutcome {
            commodity: commodity_name,
            quantity,
            source_price_change: round2(pct_change(s_new_price, s_prev_price)),
            dest_price_change: round2(pct_change(d_new_price, d_prev_price)),
            source,
            destination,
            history_length: book.history.len(),
        })
    }

    /// Live state of one market.
    pub fn snapshot(&self, market_id: &str) -> MandiResult<Market> {
        let guard = self.lock()?;
        let found = match &guard.markets {
            Some(markets) => markets.iter().find(|m| m.id == market_id).cloned(),
            None => self.baseline.market(market_id).cloned(),
        };
        found.ok_or_else(|| MandiError::MarketNotFound(market_id.to_string()))
    }

    pub fn live_markets(&self) -> MandiResult<Vec<Market>> {
        let guard = self.lock()?;
        Ok(match &guard.markets {
            Some(markets) => markets.clone(),
            None => self.baseline.markets().to_vec(),
        })
    }

    /// Live markets and the ledger, read under one lock.
    pub fn live_with_history(&self) -> MandiResult<(Vec<Market>, Vec<StateHistoryEntry>)> {
        let guard = self.lock()?;
        let markets = match &guard.markets {
            Some(markets) => markets.clone(),
            None => self.baseline.markets().to_vec(),
        };
        Ok((markets, guard.history.clone()))
    }

    /// Live markets over the baseline connections, for running any engine
    /// against the current state.
    pub fn live_graph(&self) -> MandiResult<MarketGraph> {
        let markets = self.live_markets()?;
        Ok(MarketGraph::new(markets, self.baseline.connections().to_vec()))
    }

    /// The whole ledger, oldest first.
    pub fn full_history(&self) -> MandiResult<Vec<StateHistoryEntry>> {
        Ok(self.lock()?.history.clone())
    }

    pub fn history_len(&self) -> MandiResult<usize> {
        Ok(self.lock()?.history.len())
    }

    /// Ledger entries touching one market, oldest first.
    pub fn history_for(&self, market_id: &str) -> MandiResult<Vec<StateHistoryEntry>> {
        Ok(self
            .lock()?
            .history
            .iter()
            .filter(|e| e.involves(market_id))
            .cloned()
            .collect())
    }

    /// Drop all live changes and the ledger.
    pub fn reset(&self) -> MandiResult<()> {
        let mut guard = self.lock()?;
        *guard = LiveBook::default();
        info!("market state reset");
        Ok(())
    }
}

fn resolve_commodity(market: &Market, name: &str) -> MandiResult<usize> {
    if name.trim().is_empty() {
        if let Some(i) = market.commodities.iter().position(|c| c.is_primary) {
            return Ok(i);
        }
    }
    market.commodity_index(name).ok_or_else(|| MandiError::CommodityNotFound {
        market_id: market.id.clone(),
        commodity: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Connection;
    use chrono::TimeZone;

    fn fixed_clock() -> Clock {
        Arc::new(|| Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).single().expect("test: fixed time"))
    }

    fn graph() -> Arc<MarketGraph> {
        let a: Market = serde_json::from_str(
            r#"{
                "id": "A", "name": "Lasalgaon", "commodity": "Onion",
                "currentPrice": 1800.0, "previousPrice": 1750.0,
                "arrivals": 5000, "baseDemand": 5200,
                "commodities": [
                    {"name": "Onion", "isPrimary": true, "currentPrice": 1800.0, "previousPrice": 1750.0,
                     "arrivals": 5000, "baseDemand": 5200},
                    {"name": "Garlic", "currentPrice": 6000.0, "arrivals": 300}
                ]
            }"#,
        )
        .expect("test: parse A");
        let b: Market = serde_json::from_str(
            r#"{"id": "B", "name": "Pimpalgaon", "commodity": "Onion",
                "currentPrice": 1900.0, "arrivals": 1000, "baseDemand": 1100}"#,
        )
        .expect("test: parse B");
        let c: Market = serde_json::from_str(
            r#"{"id": "C", "name": "Vashi", "commodity": "Tomato",
                "currentPrice": 2400.0, "arrivals": 2000}"#,
        )
        .expect("test: parse C");
        Arc::new(MarketGraph::new(vec![a, b, c], vec![Connection::new("A", "B")]))
    }

    fn state() -> MarketState {
        MarketState::with_clock(graph(), fixed_clock())
    }

    #[test]
    fn transfer_moves_quantity_and_logs_once() {
        let st = state();
        let out = st.execute_transfer("A", "B", "onion", 300).expect("test: transfer");
        assert_eq!(out.source.new_arrivals, 4700);
        assert_eq!(out.destination.new_arrivals, 1300);
        assert_eq!(st.history_len().expect("test: len"), 1);

        let a = st.snapshot("A").expect("test: snapshot");
        let b = st.snapshot("B").expect("test: snapshot");
        assert_eq!(a.commodity("Onion").map(|c| c.arrivals), Some(4700));
        assert_eq!(b.commodity("Onion").map(|c| c.arrivals), Some(1300));
        // primary mirror on both sides
        assert_eq!(a.arrivals, 4700);
        assert_eq!(b.arrivals, 1300);
        assert_eq!(b.current_price, out.destination.new_price);
        assert!(out.source.new_price > out.source.previous_price);
        assert!(out.destination.new_price < out.destination.previous_price);
        // baseline untouched
        assert_eq!(st.baseline().market("A").map(|m| m.arrivals), Some(5000));
    }

    #[test]
    fn transfer_seeds_missing_destination_commodity() {
        let st = state();
        let out = st.execute_transfer("A", "C", "Garlic", 100).expect("test: transfer");
        assert_eq!(out.destination.previous_arrivals, 0);
        assert_eq!(out.destination.previous_price, 6000.0);
        // demand == quantity == supply, so the seeded price holds
        assert_eq!(out.destination.new_price, 6000.0);
        assert_eq!(out.dest_price_change, 0.0);

        let c = st.snapshot("C").expect("test: snapshot");
        let garlic = c.commodity("garlic").expect("test: garlic");
        assert!(!garlic.is_primary);
        assert_eq!(garlic.arrivals, 100);
        assert_eq!(c.arrivals, 2000, "primary tomato untouched");
        assert_eq!(c.commodity, "Tomato");
    }

    #[test]
    fn failed_transfers_change_nothing() {
        let st = state();
        let cases = [
            st.execute_transfer("A", "B", "Onion", 0),
            st.execute_transfer("A", "A", "Onion", 10),
            st.execute_transfer("A", "Z", "Onion", 10),
            st.execute_transfer("A", "B", "Potato", 10),
            st.execute_transfer("A", "B", "Onion", 5001),
        ];
        assert!(matches!(cases[0], Err(MandiError::InvalidQuantity(0))));
        assert!(matches!(cases[1], Err(MandiError::SameMarket(_))));
        assert!(matches!(cases[2], Err(MandiError::MarketNotFound(_))));
        assert!(matches!(cases[3], Err(MandiError::CommodityNotFound { .. })));
        assert!(matches!(
            cases[4],
            Err(MandiError::InsufficientSupply { requested: 5001, available: 5000 })
        ));
        assert!(cases.iter().all(|r| r.as_ref().err().map_or(false, MandiError::is_client_error)));
        assert_eq!(st.history_len().expect("test: len"), 0);
        assert_eq!(st.live_markets().expect("test: live"), graph().markets().to_vec());
    }

    #[test]
    fn arrivals_update_reprices_and_mirrors_primary() {
        let st = state();
        let out = st
            .apply_arrivals_update("A", "Onion", 4000, Some("rain in Nashik"))
            .expect("test: update");
        // 1800 * (5200/4000)^0.4
        let expected = elasticity_price(1800.0, 4000.0, 5200.0);
        assert_eq!(out.new_price, expected);
        assert_eq!(out.previous_arrivals, 5000);
        assert_eq!(out.arrivals_change, -20.0);
        assert!(out.is_primary);

        let a = st.snapshot("A").expect("test: snapshot");
        assert_eq!(a.current_price, expected);
        assert_eq!(a.previous_price, 1800.0);
        assert_eq!(a.arrivals, 4000);
        assert_eq!(a.base_supply, 4000);
        assert_eq!(a.price_history.last().map(|p| p.date.as_str()), Some("2026-03-14"));
        assert_eq!(a.arrivals_history.last().map(|p| p.arrivals), Some(4000));

        match &st.full_history().expect("test: history")[0] {
            StateHistoryEntry::MarketUpdate(r) => {
                assert_eq!(r.optional_context.as_deref(), Some("rain in Nashik"));
                assert_eq!(r.base_demand, 5200);
                assert_eq!(r.date, "2026-03-14");
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn secondary_update_leaves_market_level() {
        let st = state();
        st.apply_arrivals_update("A", "garlic", 150, None).expect("test: update");
        let a = st.snapshot("A").expect("test: snapshot");
        assert_eq!(a.arrivals, 5000);
        assert_eq!(a.current_price, 1800.0);
        assert_eq!(a.commodity("Garlic").map(|c| c.arrivals), Some(150));
    }

    #[test]
    fn ledger_is_append_only_and_resettable() {
        let st = state();
        st.apply_arrivals_update("A", "Onion", 4800, None).expect("test: update");
        let first = st.full_history().expect("test: history");
        st.execute_transfer("B", "A", "Onion", 200).expect("test: transfer");
        st.apply_arrivals_update("C", "", 1500, None).expect("test: update");
        let all = st.full_history().expect("test: history");
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], first[0]);
        assert_eq!(st.history_for("B").expect("test: history").len(), 1);

        st.reset().expect("test: reset");
        assert_eq!(st.history_len().expect("test: len"), 0);
        assert_eq!(st.snapshot("A").expect("test: snapshot").arrivals, 5000);
    }

    #[test]
    fn update_rejects_zero_and_unknowns() {
        let st = state();
        assert!(matches!(st.apply_arrivals_update("A", "Onion", 0, None), Err(MandiError::InvalidArrivals(_))));
        assert!(matches!(st.apply_arrivals_update("Q", "Onion", 10, None), Err(MandiError::MarketNotFound(_))));
        assert!(matches!(
            st.apply_arrivals_update("B", "Garlic", 10, None),
            Err(MandiError::CommodityNotFound { .. })
        ));
        assert_eq!(st.history_len().expect("test: len"), 0);
    }

    #[test]
    fn parse_arrivals_accepts_numbers_and_numeric_strings() {
        use serde_json::json;
        assert_eq!(parse_arrivals(&json!(1200)).expect("test: parse"), 1200);
        assert_eq!(parse_arrivals(&json!(" 850 ")).expect("test: parse"), 850);
        assert_eq!(parse_arrivals(&json!(640.0)).expect("test: parse"), 640);
        assert_eq!(parse_arrivals(&json!("2e3")).expect("test: parse"), 2000);
        assert_eq!(parse_arrivals(&json!(MAX_ARRIVALS)).expect("test: parse"), MAX_ARRIVALS);
        for bad in [json!(null), json!("abc"), json!(0), json!(-5), json!(true), json!("0.4")] {
            assert!(matches!(parse_arrivals(&bad), Err(MandiError::InvalidArrivals(_))), "{bad}");
        }
    }

    #[test]
    fn parse_arrivals_rejects_fractions() {
        use serde_json::json;
        for bad in [json!(99.9), json!("12.5"), json!(" 0.5 "), json!(1000.25)] {
            let err = parse_arrivals(&bad).expect_err("test: fraction");
            assert!(err.to_string().contains("whole number"), "{bad}: {err}");
        }
    }

    #[test]
    fn parse_arrivals_rejects_figures_past_the_ceiling() {
        use serde_json::json;
        for bad in [
            json!(u64::MAX),
            json!("18446744073709551615"),
            json!(MAX_ARRIVALS + 1),
            json!(1e30),
            json!("1e30"),
            json!("99999999999999999999999"),
        ] {
            assert!(matches!(parse_arrivals(&bad), Err(MandiError::InvalidArrivals(_))), "{bad}");
        }
        let st = state();
        assert!(matches!(
            st.apply_arrivals_update("B", "Onion", u64::MAX, None),
            Err(MandiError::InvalidArrivals(_))
        ));
        assert_eq!(st.history_len().expect("test: len"), 0);
    }

    #[test]
    fn transfer_past_the_ceiling_is_rejected_before_any_write() {
        let st = state();
        st.apply_arrivals_update("B", "Onion", MAX_ARRIVALS, None).expect("test: update");
        let before = st.live_markets().expect("test: live");

        let err = st.execute_transfer("A", "B", "Onion", 300).expect_err("test: overflow");
        assert!(matches!(
            err,
            MandiError::ArrivalsOverflow { current: MAX_ARRIVALS, added: 300, .. }
        ));
        assert!(err.is_client_error());

        // The lock survives and nothing moved.
        assert_eq!(st.history_len().expect("test: len"), 1);
        assert_eq!(st.live_markets().expect("test: live"), before);
        let out = st.execute_transfer("B", "A", "Onion", 300).expect("test: reverse transfer");
        assert_eq!(out.destination.new_arrivals, 5300);
    }

    #[test]
    fn history_entries_serialize_with_type_tag() {
        let st = state();
        st.execute_transfer("A", "B", "Onion", 10).expect("test: transfer");
        let json = serde_json::to_value(st.full_history().expect("test: history")).expect("test: ser");
        assert_eq!(json[0]["type"], "transfer_execution");
        assert_eq!(json[0]["source"]["mandiId"], "A");
        assert_eq!(json[0]["quantity"], 10);
    }
}
