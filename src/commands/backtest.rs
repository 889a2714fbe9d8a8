use crate::commands::snapshot::ensure_bar_file;
use crate::config::EngineSettings;
use crate::market_data::load_bars;
use crate::models::{BacktestResult, StrategyConfig};
use crate::param_utils::parse_param_assignments;
use crate::runner::spawn_backtest;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

pub async fn run(
    data_file: &Path,
    strategy_type: &str,
    params: &[String],
    settings: EngineSettings,
    output: Option<&Path>,
) -> Result<()> {
    ensure_bar_file(data_file).await?;
    let bars = Arc::new(load_bars(data_file)?);

    let config = StrategyConfig {
        strategy_type: strategy_type.to_string(),
        parameters: parse_param_assignments(params)?,
    };
    let result = spawn_backtest(bars, config, settings)
        .await
        .context("Backtest task failed to complete")??;

    let payload =
        serde_json::to_string_pretty(&result).context("Failed to serialize backtest result")?;
    match output {
        Some(path) => {
            tokio::fs::write(path, payload)
                .await
                .with_context(|| format!("Failed to write result to {}", path.display()))?;
            info!("Backtest result written to {}", path.display());
        }
        None => println!("{}", payload),
    }
    info!("{}", summary_line(&result));
    Ok(())
}

fn format_ratio(value: Option<f64>, scale: f64, suffix: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v * scale, suffix),
        None => "n/a".to_string(),
    }
}

/// One-line human summary of a finished run.
pub fn summary_line(result: &BacktestResult) -> String {
    format!(
        "{}: return {:.2}%, sharpe {}, max drawdown {:.2}%, win rate {}, trades {}, final equity {:.2}",
        result.strategy_type,
        result.total_return() * 100.0,
        format_ratio(result.sharpe(), 1.0, ""),
        result.max_drawdown() * 100.0,
        format_ratio(result.win_rate(), 100.0, "%"),
        result.metrics.total_trades,
        result.final_equity
    )
}
