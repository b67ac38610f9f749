// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Mandi Stress Simulation Suite - Price Forecast

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{MandiError, MandiResult};
use crate::pricing::round2;
use crate::types::{Market, PricePoint};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Exponential moving average, oldest value first. Rounded to 2dp.
pub fn ema(series: &[f64], alpha: f64) -> f64 {
    let Some((&first, rest)) = series.split_first() else {
        return 0.0;
    };
    let value = rest.iter().fold(first, |acc, &x| alpha * x + (1.0 - alpha) * acc);
    round2(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub predicted_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub mandi_id: String,
    pub commodity: String,
    pub horizon: u32,
    pub ema: f64,
    /// Last day-on-day price change, in percent.
    pub recent_trend_pct: f64,
    pub points: Vec<ForecastPoint>,
}

/// Daily price forecast for one commodity at one market.
///
/// The primary commodity forecasts from the market's price history; any
/// other commodity from its current price alone. Day `i` blends an EMA
/// projection (weight `0.5 + 0.05 i`, capped at 1) with a trend projection
/// from the last observed price. Dates follow the last history date, or
/// `today` when the history carries no parseable date.
pub fn forecast(
    market: &Market,
    commodity: &str,
    horizon: u32,
    alpha: f64,
    max_horizon: u32,
    today: NaiveDate,
) -> MandiResult<Forecast> {
    if horizon < 1 || horizon > max_horizon {
        return Err(MandiError::OutOfRange {
            field: "horizon",
            min: 1,
            max: max_horizon as i64,
            value: horizon as i64,
        });
    }
    let c = market.commodity(commodity).ok_or_else(|| MandiError::CommodityNotFound {
        market_id: market.id.clone(),
        commodity: commodity.to_string(),
    })?;

    let history: Vec<PricePoint> = if c.is_primary && !market.price_history.is_empty() {
        market.price_history.clone()
    } else if c.current_price > 0.0 {
        vec![PricePoint { date: String::new(), price: c.current_price }]
    } else {
        Vec::new()
    };

    let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
    let ema_value = ema(&prices, alpha);
    let recent_trend = match prices.as_slice() {
        [.., prev, last] if *prev > 0.0 => (last - prev) / prev,
        _ => 0.0,
    };

    let base_date = history
        .last()
        .and_then(|p| NaiveDate::parse_from_str(&p.date, DATE_FORMAT).ok())
        .unwrap_or(today);

    let points = match prices.last() {
        Some(&last_price) => (1..=horizon)
            .map(|i| {
                let i_f = i as f64;
                let ema_weight = (0.5 + 0.05 * i_f).min(1.0);
                let trend_weight = 1.0 - ema_weight;
                let trend_projection = last_price * (1.0 + recent_trend * trend_weight * i_f * 0.3);
                let ema_projection = ema_value * (1.0 + recent_trend * 0.1 * i_f);
                let predicted = ema_weight * ema_projection + trend_weight * trend_projection;
                ForecastPoint {
                    date: (base_date + Duration::days(i as i64)).format(DATE_FORMAT).to_string(),
                    predicted_price: round2(predicted.max(0.0)),
                }
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(Forecast {
        mandi_id: market.id.clone(),
        commodity: c.name.clone(),
        horizon,
        ema: ema_value,
        recent_trend_pct: round2(recent_trend * 100.0),
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::market;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).expect("test: date")
    }

    fn with_history(prices: &[f64]) -> Market {
        let mut m = market("m");
        m.price_history = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| PricePoint { date: format!("2026-02-{:02}", i + 20), price })
            .collect();
        m
    }

    #[test]
    fn ema_matches_hand_computation() {
        assert_eq!(ema(&[], 0.25), 0.0);
        assert_eq!(ema(&[80.0], 0.25), 80.0);
        // 100 -> 0.25*120 + 0.75*100 = 105 -> 0.25*80 + 0.75*105 = 98.75
        assert_eq!(ema(&[100.0, 120.0, 80.0], 0.25), 98.75);
    }

    #[test]
    fn flat_history_forecasts_flat() {
        let m = with_history(&[100.0, 100.0, 100.0]);
        let f = forecast(&m, "Onion", 5, 0.25, 30, today()).expect("test: forecast");
        assert_eq!(f.points.len(), 5);
        assert!(f.points.iter().all(|p| p.predicted_price == 100.0));
        assert_eq!(f.points[0].date, "2026-02-23");
        assert_eq!(f.points[4].date, "2026-02-27");
    }

    #[test]
    fn rising_trend_projects_upward() {
        let m = with_history(&[100.0, 104.0, 110.0]);
        let f = forecast(&m, "onion", 7, 0.25, 30, today()).expect("test: forecast");
        assert_eq!(f.recent_trend_pct, 5.77);
        assert!(f.points.windows(2).all(|w| w[1].predicted_price >= w[0].predicted_price));
        assert!(f.points.iter().all(|p| p.predicted_price >= 0.0));
    }

    #[test]
    fn rejects_bad_horizon_and_commodity() {
        let m = with_history(&[100.0]);
        assert!(matches!(
            forecast(&m, "Onion", 0, 0.25, 30, today()),
            Err(MandiError::OutOfRange { field: "horizon", .. })
        ));
        assert!(matches!(
            forecast(&m, "Onion", 31, 0.25, 30, today()),
            Err(MandiError::OutOfRange { .. })
        ));
        assert!(matches!(
            forecast(&m, "Saffron", 3, 0.25, 30, today()),
            Err(MandiError::CommodityNotFound { .. })
        ));
    }

    #[test]
    fn undated_history_starts_from_today() {
        let m = market("m");
        let f = forecast(&m, "Onion", 2, 0.25, 30, today()).expect("test: forecast");
        assert_eq!(f.points[0].date, "2026-01-02");
        assert_eq!(f.points[0].predicted_price, 100.0);
    }
}
