use crate::commands::backtest::summary_line;
use crate::commands::snapshot::ensure_bar_file;
use crate::config::EngineSettings;
use crate::market_data::load_bars;
use crate::models::{Bar, BacktestResult, StrategyConfig, StrategyType};
use crate::runner::spawn_backtest;
use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;

/// Runs every strategy with default parameters on the same series, in
/// parallel. Results come back in [`StrategyType::ALL`] order.
pub async fn compare_strategies(
    bars: Arc<Vec<Bar>>,
    settings: EngineSettings,
) -> Result<Vec<BacktestResult>> {
    let mut in_flight: FuturesUnordered<_> = StrategyType::ALL
        .iter()
        .enumerate()
        .map(|(index, strategy_type)| {
            let handle = spawn_backtest(
                Arc::clone(&bars),
                StrategyConfig::new(strategy_type.as_str()),
                settings,
            );
            async move { (index, handle.await) }
        })
        .collect();

    let mut slots: Vec<Option<BacktestResult>> = vec![None; StrategyType::ALL.len()];
    while let Some((index, joined)) = in_flight.next().await {
        slots[index] = Some(joined??);
    }
    Ok(slots.into_iter().flatten().collect())
}

pub async fn run(data_file: &Path, settings: EngineSettings) -> Result<()> {
    ensure_bar_file(data_file).await?;
    let bars = Arc::new(load_bars(data_file)?);
    info!(
        "Comparing {} strategies on {} bars",
        StrategyType::ALL.len(),
        bars.len()
    );

    let results = compare_strategies(bars, settings).await?;
    if results.iter().all(|r| r.metrics.total_trades == 0) {
        warn!("No strategy closed a trade on this series");
    }

    println!(
        "\n{:<18} {:>10} {:>8} {:>10} {:>9} {:>7} {:>14}",
        "strategy", "return %", "sharpe", "max dd %", "win %", "trades", "final equity"
    );
    for result in &results {
        println!(
            "{:<18} {:>10.2} {:>8} {:>10.2} {:>9} {:>7} {:>14.2}",
            result.strategy_type.as_str(),
            result.total_return() * 100.0,
            result
                .sharpe()
                .map(|s| format!("{:.3}", s))
                .unwrap_or_else(|| "n/a".to_string()),
            result.max_drawdown() * 100.0,
            result
                .win_rate()
                .map(|w| format!("{:.1}", w * 100.0))
                .unwrap_or_else(|| "n/a".to_string()),
            result.metrics.total_trades,
            result.final_equity
        );
        info!("{}", summary_line(result));
    }
    Ok(())
}
