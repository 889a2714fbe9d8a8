use crate::broker::Broker;
use crate::config::EngineSettings;
use crate::error::{BacktestError, EngineResult};
use crate::models::*;
use crate::performance::PerformanceCalculator;
use crate::strategy::{create_strategy, Strategy};
use log::{debug, info, warn};

pub struct Engine {
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Runs `config` over `bars`, one bar at a time. Validation failures
    /// abort before any bar is processed.
    pub fn backtest(&self, bars: &[Bar], config: &StrategyConfig) -> EngineResult<BacktestResult> {
        validate_bars(bars)?;
        self.settings.validate()?;
        let mut strategy = create_strategy(config)?;
        let strategy_type = strategy.strategy_type();

        info!(
            "Backtesting {} over {} bars ({} to {})",
            strategy_type,
            bars.len(),
            bars[0].date,
            bars[bars.len() - 1].date
        );
        if let Some(min_data_points) = warm_up_shortfall(strategy.as_ref(), bars) {
            warn!(
                "{} needs {} bars before it can trade, got {}",
                strategy_type,
                min_data_points,
                bars.len()
            );
        }

        let mut broker = Broker::new(self.settings.initial_cash, self.settings.commission_rate);
        for (index, bar) in bars.iter().enumerate() {
            let state = broker.state(bar.close);
            let decision = strategy.decide(&bars[..=index], &state);
            if decision != Decision::Hold {
                debug!("{} {}: {:?}", strategy_type, bar.date, decision);
            }
            broker.execute(bar, decision);
            broker.record_snapshot(bar);
        }

        let ledger = broker.into_ledger();
        let metrics = PerformanceCalculator::calculate_performance(
            &ledger.trades,
            &ledger.daily_positions,
            self.settings.initial_cash,
            ledger.final_equity,
            self.settings.risk_free_rate,
            self.settings.periods_per_year,
        );

        info!(
            "{} finished: {} trades, total return {:.2}%, final equity {:.2}",
            strategy_type,
            metrics.total_trades,
            metrics.total_return * 100.0,
            ledger.final_equity
        );

        Ok(BacktestResult {
            strategy_type,
            initial_cash: self.settings.initial_cash,
            final_cash: ledger.cash,
            final_equity: ledger.final_equity,
            open_position: ledger.open_position,
            metrics,
            trades: ledger.trades,
            daily_positions: ledger.daily_positions,
        })
    }
}

/// Backtest with default metric settings and the given account parameters.
pub fn run(
    bars: &[Bar],
    config: &StrategyConfig,
    initial_cash: f64,
    commission_rate: f64,
) -> EngineResult<BacktestResult> {
    Engine::new(EngineSettings::new(initial_cash, commission_rate)).backtest(bars, config)
}

/// The strategy's warm-up length when `bars` is too short to cover it.
fn warm_up_shortfall(strategy: &(dyn Strategy + Send), bars: &[Bar]) -> Option<usize> {
    let min_data_points = strategy.get_min_data_points();
    (bars.len() < min_data_points).then_some(min_data_points)
}

/// Checks ordering and price sanity of a bar series.
pub fn validate_bars(bars: &[Bar]) -> EngineResult<()> {
    if bars.is_empty() {
        return Err(BacktestError::InvalidInput(
            "bar series is empty".to_string(),
        ));
    }

    for (index, bar) in bars.iter().enumerate() {
        for (name, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
            ("volume", bar.volume),
        ] {
            if !value.is_finite() {
                return Err(BacktestError::MissingField(name.to_string()));
            }
        }
        if bar.low > bar.high {
            return Err(BacktestError::InvalidInput(format!(
                "bar {} ({}) has low {} above high {}",
                index, bar.date, bar.low, bar.high
            )));
        }
        if index > 0 && bar.date <= bars[index - 1].date {
            return Err(BacktestError::InvalidInput(format!(
                "bar dates must be strictly increasing ({} follows {})",
                bar.date,
                bars[index - 1].date
            )));
        }
    }
    Ok(())
}

/// Converts incoming records, failing on the first one with a missing field.
pub fn bars_from_raw(raw_bars: Vec<RawBar>) -> EngineResult<Vec<Bar>> {
    raw_bars.into_iter().map(Bar::try_from).collect()
}
