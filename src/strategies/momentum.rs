use super::{closes, sized_entry, trailing};
use crate::error::EngineResult;
use crate::indicators::{calculate_roc, percentile_value};
use crate::models::*;
use crate::param_utils::{get_param_f64_in_range, get_param_period, warn_unknown_params};
use crate::trading_rules::stop_hit;
use std::collections::{HashMap, VecDeque};

const PARAMS: [&str; 3] = ["lookback", "percentile_threshold", "atr_period"];

/// Roughly one trading year of ROC observations.
const HISTORY_CAPACITY: usize = 252;
const MIN_OBSERVATIONS: usize = 60;

pub struct MomentumStrategy {
    lookback: usize,
    percentile_threshold: f64,
    atr_period: usize,
    roc_history: VecDeque<f64>,
}

impl MomentumStrategy {
    pub fn new(parameters: &HashMap<String, f64>) -> EngineResult<Self> {
        warn_unknown_params(parameters, &PARAMS, "momentum");
        Ok(Self {
            lookback: get_param_period(parameters, "lookback", 60)?,
            percentile_threshold: get_param_f64_in_range(
                parameters,
                "percentile_threshold",
                70.0,
                0.0,
                100.0,
            )?,
            atr_period: get_param_period(parameters, "atr_period", 14)?,
            roc_history: VecDeque::with_capacity(HISTORY_CAPACITY),
        })
    }

    fn current_roc(&self, bars: &[Bar]) -> Option<f64> {
        let window = trailing(bars, self.lookback + 1);
        calculate_roc(&closes(window), self.lookback)
            .last()
            .copied()
            .flatten()
    }

    fn record(&mut self, roc: f64) {
        if self.roc_history.len() >= HISTORY_CAPACITY {
            self.roc_history.pop_front();
        }
        self.roc_history.push_back(roc);
    }

    fn threshold(&self) -> Option<f64> {
        if self.roc_history.len() < MIN_OBSERVATIONS {
            return None;
        }
        let (front, back) = self.roc_history.as_slices();
        let history: Vec<f64> = front.iter().chain(back).copied().collect();
        percentile_value(&history, self.percentile_threshold)
    }
}

impl super::Strategy for MomentumStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Momentum
    }

    fn decide(&mut self, bars: &[Bar], state: &BrokerState) -> Decision {
        let Some(current) = bars.last() else {
            return Decision::Hold;
        };
        let roc = self.current_roc(bars);
        if let Some(value) = roc {
            self.record(value);
        }

        if state.is_flat() {
            let (Some(roc), Some(threshold)) = (roc, self.threshold()) else {
                return Decision::Hold;
            };
            if roc > threshold && roc > 0.0 {
                return sized_entry(bars, self.atr_period, state);
            }
            return Decision::Hold;
        }

        let negative = roc.is_some_and(|value| value < 0.0);
        if negative || stop_hit(current.close, state.entry_stop_price) {
            Decision::ExitLong
        } else {
            Decision::Hold
        }
    }

    fn get_min_data_points(&self) -> usize {
        (self.lookback + MIN_OBSERVATIONS).max(self.atr_period + 1)
    }
}
