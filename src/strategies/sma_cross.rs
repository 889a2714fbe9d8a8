use super::{closes, sized_entry, trailing};
use crate::error::EngineResult;
use crate::indicators::{calculate_sma, crossover};
use crate::models::*;
use crate::param_utils::{get_param_period, warn_unknown_params};
use crate::trading_rules::stop_hit;
use std::collections::HashMap;

const PARAMS: [&str; 3] = ["fast", "slow", "atr_period"];

pub struct SmaCrossStrategy {
    fast: usize,
    slow: usize,
    atr_period: usize,
}

impl SmaCrossStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> EngineResult<Self> {
        warn_unknown_params(parameters, &PARAMS, "sma_cross");
        Ok(Self {
            fast: get_param_period(parameters, "fast", 20)?,
            slow: get_param_period(parameters, "slow", 50)?,
            atr_period: get_param_period(parameters, "atr_period", 14)?,
        })
    }

    /// Crossover of the fast SMA over the slow SMA on the last bar.
    fn current_cross(&self, bars: &[Bar]) -> Option<i8> {
        // one extra bar so both averages also exist on the previous bar
        let window = trailing(bars, self.fast.max(self.slow) + 1);
        let closes = closes(window);
        let fast = calculate_sma(&closes, self.fast);
        let slow = calculate_sma(&closes, self.slow);
        crossover(&fast, &slow).last().copied().flatten()
    }
}

impl super::Strategy for SmaCrossStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::SmaCross
    }

    fn decide(&mut self, bars: &[Bar], state: &BrokerState) -> Decision {
        let Some(current) = bars.last() else {
            return Decision::Hold;
        };
        let cross = self.current_cross(bars);

        if state.is_flat() {
            if cross == Some(1) {
                return sized_entry(bars, self.atr_period, state);
            }
            return Decision::Hold;
        }

        if cross == Some(-1) || stop_hit(current.close, state.entry_stop_price) {
            Decision::ExitLong
        } else {
            Decision::Hold
        }
    }

    fn get_min_data_points(&self) -> usize {
        (self.fast.max(self.slow) + 1).max(self.atr_period)
    }
}
