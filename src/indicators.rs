//! Rolling-window indicators. Every function returns a series aligned to its
//! input; `None` marks bars without enough history.

use crate::models::Bar;

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut sma_values = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return sma_values;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    sma_values[period - 1] = Some(window_sum / period as f64);
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        sma_values[i] = Some(window_sum / period as f64);
    }

    sma_values
}

/// True Range per bar. The first bar has no previous close, so its range is
/// just `high - low`.
pub fn calculate_true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let len = highs.len().min(lows.len()).min(closes.len());
    let mut tr_values = Vec::with_capacity(len);
    for i in 0..len {
        let range = highs[i] - lows[i];
        if i == 0 {
            tr_values.push(range);
            continue;
        }
        let prev_close = closes[i - 1];
        tr_values.push(
            range
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs()),
        );
    }
    tr_values
}

/// ATR as the simple mean of True Range over the trailing `period` bars.
pub fn calculate_atr(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    calculate_sma(&calculate_true_range(highs, lows, closes), period)
}

pub fn calculate_atr_from_bars(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    calculate_atr(&highs, &lows, &closes, period)
}

/// Rate of change as a fraction: `value[t] / value[t - period] - 1`.
pub fn calculate_roc(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut roc = vec![None; values.len()];
    if period == 0 {
        return roc;
    }
    for idx in period..values.len() {
        let previous = values[idx - period];
        if previous.abs() > f64::EPSILON {
            roc[idx] = Some(values[idx] / previous - 1.0);
        }
    }
    roc
}

fn rolling_extreme<F>(values: &[f64], period: usize, pick: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }
    for end in (period - 1)..values.len() {
        let start = end + 1 - period;
        let extreme = values[start + 1..=end]
            .iter()
            .fold(values[start], |acc, &v| pick(acc, v));
        result[end] = Some(extreme);
    }
    result
}

/// Rolling maximum over the trailing window ending at each bar. Breakout
/// checks read index `t - 1` so the level excludes the current bar.
pub fn calculate_highest(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_extreme(values, period, f64::max)
}

pub fn calculate_lowest(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_extreme(values, period, f64::min)
}

/// `+1` when `fast` crosses from at-or-below to above `slow` on a bar, `-1`
/// on the opposite cross, `0` otherwise.
pub fn crossover(fast: &[Option<f64>], slow: &[Option<f64>]) -> Vec<Option<i8>> {
    let len = fast.len().min(slow.len());
    let mut result = vec![None; len];
    for i in 1..len {
        let (Some(f_prev), Some(s_prev), Some(f_cur), Some(s_cur)) =
            (fast[i - 1], slow[i - 1], fast[i], slow[i])
        else {
            continue;
        };
        let signal = if f_prev <= s_prev && f_cur > s_cur {
            1
        } else if f_prev >= s_prev && f_cur < s_cur {
            -1
        } else {
            0
        };
        result[i] = Some(signal);
    }
    result
}

/// Value at `percentile` (0-100) of `values`, picked as
/// `sorted[floor(len * percentile / 100)]` with the index clamped to the end.
pub fn percentile_value(values: &[f64], percentile: f64) -> Option<f64> {
    if values.is_empty() || !percentile.is_finite() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((sorted.len() as f64 * percentile / 100.0).floor().max(0.0) as usize)
        .min(sorted.len() - 1);
    Some(sorted[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let value = actual.expect("indicator value unavailable");
        assert!(
            (value - expected).abs() < 1e-9,
            "expected {expected}, got {value}"
        );
    }

    #[test]
    fn sma_marks_warmup_bars_unavailable() {
        let sma = calculate_sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(sma.len(), 5);
        assert!(sma[0].is_none() && sma[1].is_none());
        assert_close(sma[2], 2.0);
        assert_close(sma[4], 4.0);
    }

    #[test]
    fn sma_with_short_history_is_all_unavailable() {
        assert!(calculate_sma(&[1.0, 2.0], 5).iter().all(Option::is_none));
        assert!(calculate_sma(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn atr_uses_previous_close_after_first_bar() {
        let highs = [10.0, 12.0, 11.0];
        let lows = [9.0, 10.5, 8.0];
        let closes = [9.5, 11.5, 9.0];
        let tr = calculate_true_range(&highs, &lows, &closes);
        assert!((tr[0] - 1.0).abs() < 1e-9);
        // gap up: |12 - 9.5| beats 12 - 10.5
        assert!((tr[1] - 2.5).abs() < 1e-9);
        assert!((tr[2] - 3.5).abs() < 1e-9);

        let atr = calculate_atr(&highs, &lows, &closes, 2);
        assert!(atr[0].is_none());
        assert_close(atr[1], 1.75);
        assert_close(atr[2], 3.0);
    }

    #[test]
    fn roc_is_fractional_change() {
        let roc = calculate_roc(&[100.0, 105.0, 110.0, 99.0], 2);
        assert!(roc[1].is_none());
        assert_close(roc[2], 0.1);
        assert_close(roc[3], 99.0 / 105.0 - 1.0);
    }

    #[test]
    fn roc_skips_zero_base() {
        let roc = calculate_roc(&[0.0, 1.0, 2.0], 1);
        assert!(roc[1].is_none());
        assert_close(roc[2], 1.0);
    }

    #[test]
    fn highest_and_lowest_track_trailing_window() {
        let values = [3.0, 1.0, 4.0, 1.5, 5.0, 0.5];
        let highest = calculate_highest(&values, 3);
        let lowest = calculate_lowest(&values, 3);
        assert!(highest[1].is_none());
        assert_close(highest[2], 4.0);
        assert_close(highest[3], 4.0);
        assert_close(highest[5], 5.0);
        assert_close(lowest[2], 1.0);
        assert_close(lowest[4], 1.5);
        assert_close(lowest[5], 0.5);
    }

    #[test]
    fn crossover_detects_both_directions() {
        let fast = [Some(1.0), Some(2.0), Some(3.0), Some(2.0), Some(1.0)];
        let slow = [Some(2.0), Some(2.0), Some(2.0), Some(2.0), Some(2.0)];
        let cross = crossover(&fast, &slow);
        assert_eq!(cross, vec![None, Some(0), Some(1), Some(0), Some(-1)]);
    }

    #[test]
    fn crossover_waits_for_both_series() {
        let fast = [Some(1.0), Some(3.0), Some(4.0)];
        let slow = [None, Some(2.0), Some(2.0)];
        assert_eq!(crossover(&fast, &slow), vec![None, None, Some(0)]);
    }

    #[test]
    fn percentile_matches_sorted_index_rule() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        assert_eq!(percentile_value(&values, 70.0), Some(8.0));
        assert_eq!(percentile_value(&values, 0.0), Some(1.0));
        assert_eq!(percentile_value(&values, 100.0), Some(10.0));
        assert_eq!(percentile_value(&[], 50.0), None);
    }
}
