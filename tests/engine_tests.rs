#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use mandi_engine::explain::SignalType;
    use mandi_engine::market_state::StateHistoryEntry;
    use mandi_engine::pricing::elasticity_price;
    use mandi_engine::simulation::{ShockRequest, ShockType};
    use mandi_engine::stress::{classify, StressStatus};
    use mandi_engine::{EngineConfig, ErrorKind, MandiEngine, MandiError, Market, MarketState};

    const MARKETS: &str = include_str!("../data/mandiData.json");
    const CONNECTIONS: &str = include_str!("../data/connectivity.json");

    fn engine() -> MandiEngine {
        let engine = MandiEngine::from_json(MARKETS, CONNECTIONS, EngineConfig::default())
            .expect("test: bundled data loads");
        let clock = Arc::new(|| {
            Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0)
                .single()
                .expect("test: valid timestamp")
        });
        let state = MarketState::with_clock(engine.graph_handle(), clock);
        engine.with_state(state)
    }

    /// Two single-commodity Onion markets, A with 5000 qtl and B with 1000.
    fn onion_pair() -> MandiEngine {
        let markets = r#"{"mandis": [
            {"id": "A", "name": "Market A", "commodity": "Onion", "currentPrice": 1500.0,
             "arrivals": 5000, "baseDemand": 5000},
            {"id": "B", "name": "Market B", "commodity": "Onion", "currentPrice": 1800.0,
             "arrivals": 1000, "baseDemand": 1000}
        ]}"#;
        let connections = r#"{"connections": [{"from": "A", "to": "B", "cost_per_qt": 60}]}"#;
        MandiEngine::from_json(markets, connections, EngineConfig::default()).expect("test: fixture loads")
    }

    // ========== Stress Engine ==========

    #[test]
    fn test_bundled_network_loads() {
        let e = engine();
        assert_eq!(e.graph().markets().len(), 6);
        assert_eq!(e.graph().connections().len(), 8);
        let overview = e.stress_overview_core().expect("test: overview");
        assert_eq!(overview.total_mandis, 6);
        assert_eq!(
            overview.high_risk_count + overview.watch_count + overview.normal_count,
            overview.total_mandis
        );
    }

    #[test]
    fn test_stress_is_deterministic() {
        let e = engine();
        let a = e.stress_overview_core().expect("test: overview");
        let b = e.stress_overview_core().expect("test: overview");
        for (x, y) in a.mandis.iter().zip(&b.mandis) {
            assert_eq!(x.stress, y.stress);
        }
    }

    #[test]
    fn test_classification_boundaries() {
        assert_eq!(classify(65), StressStatus::Watch);
        assert_eq!(classify(66), StressStatus::HighRisk);
        assert_eq!(classify(35), StressStatus::Normal);
        assert_eq!(classify(36), StressStatus::Watch);
    }

    #[test]
    fn test_azadpur_scores_high_risk() {
        // +10% price, -15% arrivals, volatile history, rain flag
        let detail = engine().market_detail_core("mandi-001").expect("test: detail");
        let s = detail.stress;
        assert_eq!(s.price_change_pct, 10.0);
        assert_eq!(s.arrival_change_pct, -15.0);
        assert!(s.volatility > 10.0);
        assert_eq!(s.breakdown.price_stress, 35);
        assert_eq!(s.breakdown.supply_stress, 30);
        assert_eq!(s.breakdown.instability_stress, 20);
        assert_eq!(s.breakdown.external_stress, 10);
        assert_eq!(s.stress_score, 95);
        assert_eq!(s.status, StressStatus::HighRisk);
    }

    #[test]
    fn test_score_of_65_stays_watch() {
        let detail = engine().market_detail_core("mandi-005").expect("test: detail");
        assert_eq!(detail.stress.stress_score, 65);
        assert_eq!(detail.stress.status, StressStatus::Watch);
    }

    #[test]
    fn test_detail_serializes_flat_market_fields() {
        let detail = engine().market_detail_core("mandi-001").expect("test: detail");
        let v = serde_json::to_value(&detail).expect("test: serialize");
        assert_eq!(v["name"], "Azadpur Mandi");
        assert_eq!(v["commodity"], "Tomato");
        assert_eq!(v["stress"]["status"], "high_risk");
        assert!(v["balance"]["commodities"].is_array());
    }

    #[test]
    fn test_unknown_market_is_not_found() {
        let err = engine().market_detail_core("mandi-999").expect_err("test: missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_client_error());
    }

    // ========== Shock Simulation ==========

    #[test]
    fn test_zero_supply_doubles_price() {
        assert_eq!(elasticity_price(100.0, 0.0, 500.0), 200.0);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let e = engine();
        let req = ShockRequest::new("mandi-001", ShockType::Rain, 70, 10);
        let a = e.simulate_core(&req).expect("test: simulate");
        let b = e.simulate_core(&req).expect("test: simulate");
        assert_eq!(a, b);
    }

    #[test]
    fn test_two_hop_ripple_decay() {
        let e = engine();
        let r = e
            .simulate_core(&ShockRequest::new("mandi-001", ShockType::SupplyDrop, 60, 7))
            .expect("test: simulate");
        assert!(r.price_impact > 0.0);

        let level = |n: u8| {
            let mut ids: Vec<&str> = r
                .affected_mandis
                .iter()
                .filter(|a| a.ripple_level == n)
                .map(|a| a.mandi_id.as_str())
                .collect();
            ids.sort();
            ids
        };
        assert_eq!(level(1), vec!["mandi-002", "mandi-004", "mandi-005"]);
        assert_eq!(level(2), vec!["mandi-003", "mandi-006"]);

        for a in &r.affected_mandis {
            let share = if a.ripple_level == 1 { 0.6 } else { 0.3 };
            assert!(
                (a.price_change - r.price_impact * share).abs() < 0.01,
                "{} moved {} for origin {}",
                a.mandi_id,
                a.price_change,
                r.price_impact
            );
        }
    }

    #[test]
    fn test_demand_spike_keeps_arrivals_and_supply() {
        let r = engine()
            .simulate_core(&ShockRequest::new("mandi-004", ShockType::DemandSpike, 50, 7))
            .expect("test: simulate");
        assert_eq!(r.predicted_arrivals, r.original_arrivals);
        assert_eq!(r.simulation_parameters.supply_after, r.simulation_parameters.supply_before);
        assert!(r.simulation_parameters.demand_after > r.simulation_parameters.demand_before);
    }

    #[test]
    fn test_read_engines_agree_after_live_update() {
        let e = engine();
        e.update_arrivals_core("mandi-006", "Onion", &serde_json::json!(1500), None)
            .expect("test: update");

        let detail = e.market_detail_core("mandi-006").expect("test: detail");
        let score = detail.stress.stress_score;
        assert!(score > 0, "halved arrivals must register");

        let overview = e.stress_overview_core().expect("test: overview");
        let row = overview.mandis.iter().find(|m| m.id == "mandi-006").expect("test: overview row");
        assert_eq!(row.stress, detail.stress);
        assert_eq!(row.arrivals, 1500);

        let sim = e
            .simulate_core(&ShockRequest::new("mandi-006", ShockType::Rain, 40, 5))
            .expect("test: simulate");
        assert_eq!(sim.previous_stress_score, score);
        assert_eq!(sim.original_arrivals, 1500);
        assert_eq!(sim.original_price, detail.market.current_price);

        let set = e.recommend_core("mandi-006", false).expect("test: recommend");
        assert_eq!(set.current_stress_score, score);

        let payload = e.network_core(None, None).expect("test: network");
        let node = payload.nodes.iter().find(|n| n.id == "mandi-006").expect("test: node");
        assert_eq!(node.msi, score);

        // The baseline graph itself is untouched.
        assert_eq!(e.graph().market("mandi-006").map(|m| m.arrivals), Some(3000));
    }

    #[test]
    fn test_out_of_range_intensity_rejected() {
        let err = engine()
            .simulate_core(&ShockRequest::new("mandi-001", ShockType::Rain, 0, 7))
            .expect_err("test: range");
        assert!(matches!(err, MandiError::OutOfRange { field: "intensity", .. }));
    }

    // ========== Recommendations ==========

    #[test]
    fn test_azadpur_pulls_from_calm_neighbour() {
        let set = engine().recommend_core("mandi-001", false).expect("test: recommend");
        let first = &set.recommendations[0];
        assert_eq!(first.action, "Pull Stock from Surplus Mandi");
        // Vashi and Kolar are calm; Vashi holds more stock.
        assert_eq!(first.source_mandi.as_deref(), Some("mandi-002"));
        assert_eq!(first.destination_mandi.as_deref(), Some("mandi-001"));
        // shortfall 3000 - 2550, well under a fifth of Vashi's 5200
        assert_eq!(first.metrics.quantity, Some(450));
        assert_eq!(first.metrics.cost_per_qt, Some(85.0));

        let last = set.recommendations.last().expect("test: non-empty");
        assert_eq!(last.action, "Continue Standard Monitoring");
        assert!(set.recommendations.iter().all(|r| r.ai_insight.is_none()));
    }

    #[test]
    fn test_recommendation_ids_are_sequential() {
        let set = engine().recommend_core("mandi-001", false).expect("test: recommend");
        for (i, r) in set.recommendations.iter().enumerate() {
            assert_eq!(r.id, format!("mandi-001-rec-{}", i + 1));
        }
    }

    // ========== Market State Ledger ==========

    #[test]
    fn test_onion_transfer_moves_exact_quantity() {
        let e = onion_pair();
        let out = e.transfer_core("A", "B", "Onion", 300).expect("test: transfer");
        assert_eq!(out.source.previous_arrivals, 5000);
        assert_eq!(out.source.new_arrivals, 4700);
        assert_eq!(out.destination.previous_arrivals, 1000);
        assert_eq!(out.destination.new_arrivals, 1300);
        assert!(out.source_price_change > 0.0);
        assert!(out.dest_price_change < 0.0);

        let history = e.history_core().expect("test: history");
        assert_eq!(history.len(), 1);
        assert!(matches!(&history[0], StateHistoryEntry::TransferExecution(t) if t.quantity == 300));
    }

    #[test]
    fn test_transfer_validation_precedes_mutation() {
        let e = onion_pair();
        assert!(matches!(
            e.transfer_core("A", "B", "Onion", 0),
            Err(MandiError::InvalidQuantity(0))
        ));
        assert!(matches!(
            e.transfer_core("A", "B", "Onion", -5),
            Err(MandiError::InvalidQuantity(-5))
        ));
        assert!(matches!(
            e.transfer_core("A", "A", "Onion", 10),
            Err(MandiError::SameMarket(_))
        ));
        assert!(matches!(
            e.transfer_core("B", "A", "Onion", 1001),
            Err(MandiError::InsufficientSupply { requested: 1001, available: 1000 })
        ));
        assert!(matches!(
            e.transfer_core("A", "B", "Garlic", 10),
            Err(MandiError::CommodityNotFound { .. })
        ));
        assert_eq!(e.history_core().expect("test: history").len(), 0);
        assert_eq!(e.balance_core("A").expect("test: balance").total_supply, 5000);
    }

    #[test]
    fn test_ledger_is_append_only() {
        let e = engine();
        e.update_arrivals_core("mandi-001", "Tomato", &serde_json::json!(2800), Some("fresh lorries"))
            .expect("test: update");
        let first = serde_json::to_value(&e.history_core().expect("test: history")[0]).expect("test: json");

        e.transfer_core("mandi-002", "mandi-001", "Tomato", 400).expect("test: transfer");
        e.update_arrivals_core("mandi-004", "", &serde_json::json!("3900"), None)
            .expect("test: update");
        e.transfer_core("mandi-003", "mandi-006", "Onion", 250).expect("test: transfer");

        let history = e.history_core().expect("test: history");
        assert_eq!(history.len(), 4);
        assert_eq!(serde_json::to_value(&history[0]).expect("test: json"), first);
        assert_eq!(first["type"], "market_update");
        assert_eq!(first["optionalContext"], "fresh lorries");
        assert!(history.windows(2).all(|w| w[0].timestamp() <= w[1].timestamp()));

        let azadpur = e.market_history_core("mandi-001").expect("test: market history");
        assert_eq!(azadpur.len(), 2);
        assert!(e.market_history_core("mandi-999").is_err());
    }

    #[test]
    fn test_primary_update_mirrors_market_fields() {
        let e = engine();
        let out = e
            .update_arrivals_core("mandi-001", "tomato", &serde_json::json!(2000), None)
            .expect("test: update");
        assert!(out.is_primary);
        assert!(out.new_price > out.previous_price);

        let m = e.state().snapshot("mandi-001").expect("test: snapshot");
        let c = m.primary_commodity().expect("test: primary");
        assert_eq!(m.current_price, c.current_price);
        assert_eq!(m.previous_price, c.previous_price);
        assert_eq!(m.arrivals, c.arrivals);
        assert_eq!(m.previous_arrivals, c.previous_arrivals);
        assert_eq!(m.arrivals, 2000);
        assert_eq!(m.price_history.last().map(|p| p.date.as_str()), Some("2026-03-15"));
    }

    #[test]
    fn test_secondary_update_leaves_market_fields() {
        let e = engine();
        let before = e.state().snapshot("mandi-001").expect("test: snapshot");
        e.update_arrivals_core("mandi-001", "Onion", &serde_json::json!(900), None)
            .expect("test: update");
        let after = e.state().snapshot("mandi-001").expect("test: snapshot");
        assert_eq!(after.current_price, before.current_price);
        assert_eq!(after.arrivals, before.arrivals);
        assert_eq!(after.commodity("Onion").map(|c| c.arrivals), Some(900));
    }

    #[test]
    fn test_bad_arrivals_rejected() {
        let e = engine();
        for raw in [serde_json::json!(0), serde_json::json!(-40), serde_json::json!("lots"), serde_json::Value::Null] {
            let err = e.update_arrivals_core("mandi-001", "Tomato", &raw, None).expect_err("test: invalid");
            assert!(matches!(err, MandiError::InvalidArrivals(_)), "{raw} gave {err}");
        }
        assert_eq!(e.history_core().expect("test: history").len(), 0);
    }

    #[test]
    fn test_fractional_and_oversized_arrivals_rejected() {
        let e = engine();
        for raw in [
            serde_json::json!("12.5"),
            serde_json::json!(2999.5),
            serde_json::json!(u64::MAX),
            serde_json::json!("18446744073709551615"),
        ] {
            let err = e.update_arrivals_core("mandi-001", "Tomato", &raw, None).expect_err("test: invalid");
            assert!(matches!(err, MandiError::InvalidArrivals(_)), "{raw} gave {err}");
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert_eq!(e.history_core().expect("test: history").len(), 0);
    }

    #[test]
    fn test_transfer_overflow_is_rejected_and_state_stays_usable() {
        let e = onion_pair();
        let ceiling = mandi_engine::market_state::MAX_ARRIVALS;
        e.update_arrivals_core("B", "Onion", &serde_json::json!(ceiling), None)
            .expect("test: update to ceiling");

        let err = e.transfer_core("A", "B", "Onion", 300).expect_err("test: overflow");
        assert!(matches!(err, MandiError::ArrivalsOverflow { .. }), "{err}");
        assert_eq!(err.kind(), ErrorKind::Validation);

        let history = e.history_core().expect("test: history after rejected transfer");
        assert_eq!(history.len(), 1);
        assert_eq!(e.balance_core("A").expect("test: balance").total_supply, 5000);
        assert!(e.balance_core("B").expect("test: balance").total_balance > 0);
        e.audit_core().expect("test: audit");
        e.transfer_core("A", "B", "Onion", 0).expect_err("test: still validating");
        e.transfer_core("B", "A", "Onion", 300).expect("test: transfer out of B");
    }

    #[test]
    fn test_conservation_audit_after_mixed_operations() {
        let e = engine();
        e.transfer_core("mandi-002", "mandi-001", "Tomato", 450).expect("test: transfer");
        e.transfer_core("mandi-004", "mandi-005", "Tomato", 400).expect("test: transfer");
        // Lasalgaon sends Onion to Kolar, which already carries it.
        e.transfer_core("mandi-003", "mandi-004", "Onion", 700).expect("test: transfer");
        e.update_arrivals_core("mandi-006", "Onion", &serde_json::json!(3300), None)
            .expect("test: update");

        let report = e.audit_core().expect("test: audit");
        assert_eq!(report.entries_checked, 4);
        assert_eq!(report.transfers_checked, 3);
        assert_eq!(report.quantity_moved, 1550);
        assert_eq!(report.net_update_delta.get("onion"), Some(&300));
    }

    #[test]
    fn test_reset_restores_baseline() {
        let e = engine();
        e.transfer_core("mandi-002", "mandi-001", "Onion", 100).expect("test: transfer");
        e.reset_core().expect("test: reset");
        assert_eq!(e.history_core().expect("test: history").len(), 0);
        let m = e.state().snapshot("mandi-002").expect("test: snapshot");
        assert_eq!(m.arrivals, 5200);
    }

    // ========== Concurrent Access ==========

    fn commodity_totals(markets: &[Market]) -> BTreeMap<String, u64> {
        let mut out = BTreeMap::new();
        for c in markets.iter().flat_map(|m| &m.commodities) {
            *out.entry(c.name.to_lowercase()).or_default() += c.arrivals;
        }
        out
    }

    #[test]
    fn test_concurrent_transfers_and_reads_stay_consistent() {
        const ROUNDS: usize = 150;
        let e = engine();
        let baseline = commodity_totals(e.graph().markets());
        let done = AtomicBool::new(false);
        let committed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            let lanes = [
                ("mandi-002", "mandi-003", "Onion"),
                ("mandi-003", "mandi-002", "Onion"),
                ("mandi-004", "mandi-005", "Tomato"),
                ("mandi-005", "mandi-004", "Tomato"),
            ];
            let writers: Vec<_> = lanes
                .iter()
                .map(|&(from, to, commodity)| {
                    let (e, committed) = (&e, &committed);
                    scope.spawn(move || {
                        for _ in 0..ROUNDS {
                            if e.transfer_core(from, to, commodity, 7).is_ok() {
                                committed.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    })
                })
                .collect();

            for _ in 0..2 {
                let (e, done, baseline) = (&e, &done, &baseline);
                scope.spawn(move || {
                    let mut last_len = 0;
                    while !done.load(Ordering::SeqCst) {
                        let (live, history) = e.state().live_with_history().expect("test: view");
                        assert_eq!(&commodity_totals(&live), baseline, "transfers never create or lose stock");
                        assert!(history.len() >= last_len, "ledger never shrinks");
                        last_len = history.len();

                        e.audit_core().expect("test: audit mid-run");
                        e.state().snapshot("mandi-002").expect("test: snapshot");
                        assert!(e.history_core().expect("test: history").len() >= last_len);
                    }
                });
            }

            for w in writers {
                w.join().expect("test: writer thread");
            }
            done.store(true, Ordering::SeqCst);
        });

        let history = e.history_core().expect("test: history");
        assert_eq!(history.len(), committed.load(Ordering::SeqCst));
        assert_eq!(history.len(), 4 * ROUNDS);
        let report = e.audit_core().expect("test: audit");
        assert_eq!(report.transfers_checked, 4 * ROUNDS);
        assert_eq!(report.quantity_moved, 7 * 4 * ROUNDS as u64);
        assert_eq!(commodity_totals(&e.state().live_markets().expect("test: live")), baseline);
    }

    // ========== Balance, Network, Forecast, Context ==========

    #[test]
    fn test_transfer_plan_covers_azadpur_tomato_deficit() {
        let plan = engine().transfer_plan_core().expect("test: plan");
        assert!(!plan.is_empty());
        assert!(plan.iter().all(|t| t.quantity > 0 && t.source_mandi != t.destination_mandi));
        let into_azadpur: u64 = plan
            .iter()
            .filter(|t| t.commodity == "Tomato" && t.destination_mandi == "mandi-001")
            .map(|t| t.quantity)
            .sum();
        assert_eq!(into_azadpur, 450);
    }

    #[test]
    fn test_network_payload_with_simulation_overlay() {
        let e = engine();
        let sim = e
            .simulate_core(&ShockRequest::new("mandi-001", ShockType::Rain, 80, 14))
            .expect("test: simulate");
        let payload = e.network_core(Some("mandi-001"), Some(&sim)).expect("test: network");
        assert_eq!(payload.nodes.len(), 6);
        assert_eq!(payload.edges.len(), 8);
        let origin = payload.nodes.iter().find(|n| n.id == "mandi-001").expect("test: origin node");
        assert_eq!(origin.msi, 95);
        assert!(origin.impact > 0.0 && origin.impact <= 1.0);
        assert!(payload.nodes.iter().all(|n| (0.0..=1.0).contains(&n.impact)));
        assert!(payload.nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));
    }

    #[test]
    fn test_forecast_follows_history_dates() {
        let f = engine().forecast_core("mandi-001", "Tomato", 7).expect("test: forecast");
        assert_eq!(f.points.len(), 7);
        assert_eq!(f.points[0].date, "2026-03-15");
        assert_eq!(f.points[6].date, "2026-03-21");
        assert!(f.points.iter().all(|p| p.predicted_price > 0.0));

        let err = engine().forecast_core("mandi-001", "Tomato", 31).expect_err("test: horizon");
        assert!(matches!(err, MandiError::OutOfRange { field: "horizon", .. }));
    }

    #[test]
    fn test_context_interpreter_flags_signals() {
        let out = engine().interpret_core("Truck strike on the highway ahead of Diwali");
        let kinds: Vec<SignalType> = out.signals.iter().map(|s| s.signal_type).collect();
        assert!(kinds.contains(&SignalType::LogisticsStress));
        assert!(kinds.contains(&SignalType::DemandPressure));
        assert!(!kinds.contains(&SignalType::SupplyStress));
    }

    #[test]
    fn test_engine_degrades_to_empty_on_missing_files() {
        let config = EngineConfig { data_dir: "/nonexistent/mandi".into(), ..EngineConfig::default() };
        let e = MandiEngine::from_config(config);
        assert!(e.graph().is_empty());
        assert_eq!(e.stress_overview_core().expect("test: overview").total_mandis, 0);
    }
}
