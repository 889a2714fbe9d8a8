use super::{sized_entry, trailing};
use crate::error::EngineResult;
use crate::indicators::{calculate_highest, calculate_lowest};
use crate::models::*;
use crate::param_utils::{get_param_period, warn_unknown_params};
use crate::trading_rules::stop_hit;
use std::collections::HashMap;

const PARAMS: [&str; 3] = ["entry_period", "exit_period", "atr_period"];

pub struct DonchianBreakoutStrategy {
    entry_period: usize,
    exit_period: usize,
    atr_period: usize,
}

/// Channel value on the bar before the last one, i.e. the level built from
/// the prior window only.
fn prior_level(series: &[Option<f64>]) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    series[series.len() - 2]
}

impl DonchianBreakoutStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> EngineResult<Self> {
        warn_unknown_params(parameters, &PARAMS, "donchian_breakout");
        Ok(Self {
            entry_period: get_param_period(parameters, "entry_period", 20)?,
            exit_period: get_param_period(parameters, "exit_period", 10)?,
            atr_period: get_param_period(parameters, "atr_period", 14)?,
        })
    }

    fn prior_highest_high(&self, bars: &[Bar]) -> Option<f64> {
        let window = trailing(bars, self.entry_period + 1);
        let highs: Vec<f64> = window.iter().map(|b| b.high).collect();
        prior_level(&calculate_highest(&highs, self.entry_period))
    }

    fn prior_lowest_low(&self, bars: &[Bar]) -> Option<f64> {
        let window = trailing(bars, self.exit_period + 1);
        let lows: Vec<f64> = window.iter().map(|b| b.low).collect();
        prior_level(&calculate_lowest(&lows, self.exit_period))
    }
}

impl super::Strategy for DonchianBreakoutStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::DonchianBreakout
    }

    fn decide(&mut self, bars: &[Bar], state: &BrokerState) -> Decision {
        let Some(current) = bars.last() else {
            return Decision::Hold;
        };

        if state.is_flat() {
            return match self.prior_highest_high(bars) {
                Some(level) if current.close > level => {
                    sized_entry(bars, self.atr_period, state)
                }
                _ => Decision::Hold,
            };
        }

        let broke_down = self
            .prior_lowest_low(bars)
            .is_some_and(|level| current.close < level);
        if broke_down || stop_hit(current.close, state.entry_stop_price) {
            Decision::ExitLong
        } else {
            Decision::Hold
        }
    }

    fn get_min_data_points(&self) -> usize {
        (self.entry_period + 1).max(self.atr_period)
    }
}
