use crate::error::EngineResult;
use crate::models::*;
use crate::trading_rules::{initial_stop_loss, position_size};

/// Per-bar decision logic. `bars` ends at the current bar, so a strategy can
/// never see the future. Called exactly once per bar, in order.
pub trait Strategy {
    fn strategy_type(&self) -> StrategyType;
    fn decide(&mut self, bars: &[Bar], state: &BrokerState) -> Decision;
    /// Bars needed before the strategy can produce its first entry.
    fn get_min_data_points(&self) -> usize;
}

#[path = "strategies/sma_cross.rs"]
pub mod sma_cross;

pub use sma_cross::SmaCrossStrategy;

#[path = "strategies/donchian.rs"]
pub mod donchian;

pub use donchian::DonchianBreakoutStrategy;

#[path = "strategies/momentum.rs"]
pub mod momentum;

pub use momentum::MomentumStrategy;

pub fn create_strategy(config: &StrategyConfig) -> EngineResult<Box<dyn Strategy + Send>> {
    match config.resolve_type()? {
        StrategyType::SmaCross => Ok(Box::new(SmaCrossStrategy::new(&config.parameters)?)),
        StrategyType::DonchianBreakout => Ok(Box::new(DonchianBreakoutStrategy::new(
            &config.parameters,
        )?)),
        StrategyType::Momentum => Ok(Box::new(MomentumStrategy::new(&config.parameters)?)),
    }
}

/// The last `count` bars (or fewer at the start of the series).
pub(crate) fn trailing(bars: &[Bar], count: usize) -> &[Bar] {
    &bars[bars.len().saturating_sub(count)..]
}

pub(crate) fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Long entry at the current close with an ATR stop, sized by the risk rule.
/// Holds when ATR is not available yet or the sizer allows no shares.
pub(crate) fn sized_entry(bars: &[Bar], atr_period: usize, state: &BrokerState) -> Decision {
    let Some(current) = bars.last() else {
        return Decision::Hold;
    };
    let Some(stop_price) = initial_stop_loss(bars, atr_period) else {
        return Decision::Hold;
    };
    let size = position_size(state.equity, state.buying_power, current.close, stop_price);
    if size == 0 {
        return Decision::Hold;
    }
    Decision::EnterLong { size, stop_price }
}
