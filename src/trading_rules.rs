use crate::indicators::calculate_atr_from_bars;
use crate::models::Bar;

/// Fraction of equity put at risk between entry and stop.
pub const RISK_FRACTION: f64 = 0.01;

/// Stops are placed this many ATRs below the entry close.
pub const ATR_STOP_MULTIPLIER: f64 = 2.0;

pub struct PositionSizingParams {
    pub equity: f64,
    pub available_cash: f64,
    pub price: f64,
    pub stop_price: f64,
}

/// Share count allowed by the fixed 1% risk rule, capped by what the cash
/// can pay for. Returns 0 when the stop sits on the price or any input is
/// unusable.
pub fn determine_position_size(params: PositionSizingParams) -> u64 {
    let PositionSizingParams {
        equity,
        available_cash,
        price,
        stop_price,
    } = params;

    if price <= 0.0
        || !price.is_finite()
        || !stop_price.is_finite()
        || !equity.is_finite()
        || !available_cash.is_finite()
    {
        return 0;
    }

    let risk_per_share = (price - stop_price).abs();
    if risk_per_share == 0.0 {
        return 0;
    }

    let risk_budget = equity.max(0.0) * RISK_FRACTION;
    let risk_sized = (risk_budget / risk_per_share).floor();
    let affordable = (available_cash.max(0.0) / price).floor();

    risk_sized.min(affordable).max(0.0) as u64
}

/// Sizes a position from raw arguments.
pub fn position_size(equity: f64, cash: f64, price: f64, stop_price: f64) -> u64 {
    determine_position_size(PositionSizingParams {
        equity,
        available_cash: cash,
        price,
        stop_price,
    })
}

/// Initial protective stop `close - 2 * ATR` for the last bar of `bars`.
/// `None` while ATR lacks history.
pub fn initial_stop_loss(bars: &[Bar], atr_period: usize) -> Option<f64> {
    let last = bars.last()?;
    let tail = &bars[bars.len().saturating_sub(atr_period + 1)..];
    let atr = calculate_atr_from_bars(tail, atr_period)
        .last()
        .copied()
        .flatten()?;
    if !atr.is_finite() {
        return None;
    }
    Some(last.close - ATR_STOP_MULTIPLIER * atr)
}

/// Whether the close has reached the stop.
pub fn stop_hit(close: f64, stop_price: Option<f64>) -> bool {
    stop_price.is_some_and(|stop| close <= stop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bar(offset: i64, high: f64, low: f64, close: f64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap() + Duration::days(offset);
        Bar::new(date, close, high, low, close, 1_000.0)
    }

    #[test]
    fn test_position_size_bound_by_risk() {
        assert_eq!(position_size(100_000.0, 50_000.0, 100.0, 95.0), 200);
    }

    #[test]
    fn test_position_size_bound_by_cash() {
        // risk allows 1000 shares, cash only 50
        assert_eq!(position_size(100_000.0, 5_000.0, 100.0, 99.0), 50);
    }

    #[test]
    fn test_position_size_zero_when_stop_equals_price() {
        assert_eq!(position_size(100_000.0, 50_000.0, 100.0, 100.0), 0);
    }

    #[test]
    fn test_position_size_uses_distance_for_stop_above_price() {
        assert_eq!(position_size(100_000.0, 50_000.0, 100.0, 105.0), 200);
    }

    #[test]
    fn test_position_size_rejects_unusable_inputs() {
        assert_eq!(position_size(100_000.0, 50_000.0, 0.0, -1.0), 0);
        assert_eq!(position_size(100_000.0, 50_000.0, f64::NAN, 95.0), 0);
        assert_eq!(position_size(100_000.0, -10.0, 100.0, 95.0), 0);
        assert_eq!(position_size(100_000.0, 50.0, 100.0, 95.0), 0);
    }

    #[test]
    fn test_initial_stop_loss_uses_trailing_atr() {
        let bars = vec![
            bar(0, 10.0, 9.0, 9.5),
            bar(1, 12.0, 10.5, 11.5),
            bar(2, 11.0, 8.0, 9.0),
        ];
        // ATR(2) on the last bar = (2.5 + 3.5) / 2
        let stop = initial_stop_loss(&bars, 2).unwrap();
        assert!((stop - (9.0 - 2.0 * 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_initial_stop_loss_waits_for_history() {
        let bars = vec![bar(0, 10.0, 9.0, 9.5)];
        assert!(initial_stop_loss(&bars, 2).is_none());
        assert!(initial_stop_loss(&[], 2).is_none());
    }

    #[test]
    fn test_stop_hit_on_touch() {
        assert!(stop_hit(95.0, Some(95.0)));
        assert!(!stop_hit(95.01, Some(95.0)));
        assert!(!stop_hit(10.0, None));
    }
}
