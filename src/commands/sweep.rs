use crate::commands::snapshot::ensure_bar_file;
use crate::config::EngineSettings;
use crate::error::{BacktestError, EngineResult};
use crate::market_data::load_bars;
use crate::models::{BacktestResult, StrategyConfig};
use crate::runner::run_batch;
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One axis of the sweep: a parameter name and the values to try.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    pub name: String,
    pub values: Vec<f64>,
}

/// Parses `name=v1,v2,...` axis definitions.
pub fn parse_grid(definitions: &[String]) -> EngineResult<Vec<GridAxis>> {
    let mut axes: Vec<GridAxis> = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let (name, raw_values) = definition.split_once('=').ok_or_else(|| {
            BacktestError::InvalidParameter(format!("expected name=v1,v2,..., got '{}'", definition))
        })?;
        let name = name.trim();
        if axes.iter().any(|axis| axis.name == name) {
            return Err(BacktestError::InvalidParameter(format!(
                "{} appears more than once in the grid",
                name
            )));
        }
        let values = raw_values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>().map_err(|_| {
                    BacktestError::InvalidParameter(format!(
                        "{} must be a number (value: {})",
                        name, v
                    ))
                })
            })
            .collect::<EngineResult<Vec<f64>>>()?;
        if values.is_empty() {
            return Err(BacktestError::InvalidParameter(format!(
                "{} has no values to sweep",
                name
            )));
        }
        axes.push(GridAxis {
            name: name.to_string(),
            values,
        });
    }
    Ok(axes)
}

/// Cartesian product of the axes; the last axis varies fastest.
pub fn expand_grid(axes: &[GridAxis]) -> Vec<HashMap<String, f64>> {
    let mut combinations = vec![HashMap::new()];
    for axis in axes {
        combinations = combinations
            .into_iter()
            .flat_map(|base| {
                axis.values.iter().map(move |&value| {
                    let mut params = base.clone();
                    params.insert(axis.name.clone(), value);
                    params
                })
            })
            .collect();
    }
    combinations
}

/// Orders by Sharpe ratio, best first. Runs without a Sharpe ratio go last,
/// ties keep their grid order.
pub fn rank_results(results: &mut [(HashMap<String, f64>, BacktestResult)]) {
    results.sort_by(|(_, a), (_, b)| match (a.sharpe(), b.sharpe()) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

fn format_params(params: &HashMap<String, f64>) -> String {
    let mut entries: Vec<_> = params.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn run(
    data_file: &Path,
    strategy_type: &str,
    grid: &[String],
    top_n: usize,
    settings: EngineSettings,
) -> Result<()> {
    ensure_bar_file(data_file).await?;
    let bars = Arc::new(load_bars(data_file)?);
    let axes = parse_grid(grid)?;
    let combinations = expand_grid(&axes);
    let configs: Vec<StrategyConfig> = combinations
        .iter()
        .map(|parameters| StrategyConfig {
            strategy_type: strategy_type.to_string(),
            parameters: parameters.clone(),
        })
        .collect();
    info!(
        "Sweeping {} parameter combinations for {}",
        configs.len(),
        strategy_type
    );

    let pb = ProgressBar::new(configs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let outcomes = tokio::task::spawn_blocking({
        let pb = pb.clone();
        move || run_batch(bars, configs, settings, |done, _| pb.set_position(done as u64))
    })
    .await??;

    let mut failures = 0;
    let mut ranked = Vec::with_capacity(outcomes.len());
    for (params, outcome) in combinations.into_iter().zip(outcomes) {
        match outcome {
            Ok(result) => ranked.push((params, result)),
            Err(err) => {
                failures += 1;
                warn!("Skipping [{}]: {}", format_params(&params), err);
            }
        }
    }
    if failures > 0 {
        pb.finish_with_message("Sweep completed with errors");
    } else {
        pb.finish_with_message("Sweep completed");
    }
    if ranked.is_empty() {
        return Err(anyhow!("No parameter combination produced a result"));
    }

    rank_results(&mut ranked);
    println!(
        "\n=== TOP {} PARAMETER SETS ===\n",
        std::cmp::min(top_n, ranked.len())
    );
    for (i, (params, result)) in ranked.iter().take(top_n).enumerate() {
        println!("Rank {}:", i + 1);
        println!(
            "  Sharpe Ratio: {}",
            result
                .sharpe()
                .map(|s| format!("{:.4}", s))
                .unwrap_or_else(|| "n/a".to_string())
        );
        println!("  Total Return: {:.2}%", result.total_return() * 100.0);
        println!("  Max Drawdown: {:.2}%", result.max_drawdown() * 100.0);
        println!("  Total Trades: {}", result.metrics.total_trades);
        println!("  Parameters: {}", format_params(params));
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PerformanceMetrics, StrategyType};

    fn result_with_sharpe(sharpe: Option<f64>) -> BacktestResult {
        BacktestResult {
            strategy_type: StrategyType::SmaCross,
            initial_cash: 1_000.0,
            final_cash: 1_000.0,
            final_equity: 1_000.0,
            open_position: 0.0,
            metrics: PerformanceMetrics {
                total_return: 0.0,
                sharpe,
                max_drawdown: 0.0,
                win_rate: None,
                avg_trade_return: None,
                total_trades: 0,
                winning_trades: 0,
                losing_trades: 0,
            },
            trades: Vec::new(),
            daily_positions: Vec::new(),
        }
    }

    #[test]
    fn test_parse_grid_axes() {
        let axes = parse_grid(&["fast=5, 10,20".to_string(), "slow=50".to_string()]).unwrap();
        assert_eq!(axes[0].name, "fast");
        assert_eq!(axes[0].values, vec![5.0, 10.0, 20.0]);
        assert_eq!(axes[1].values, vec![50.0]);
        assert!(parse_grid(&["fast".to_string()]).is_err());
        assert!(parse_grid(&["fast=".to_string()]).is_err());
        assert!(parse_grid(&["fast=1".to_string(), "fast=2".to_string()]).is_err());
    }

    #[test]
    fn test_expand_grid_is_cartesian() {
        let axes = parse_grid(&["fast=5,10".to_string(), "slow=20,30,40".to_string()]).unwrap();
        let combos = expand_grid(&axes);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[0]["fast"], 5.0);
        assert_eq!(combos[0]["slow"], 20.0);
        assert_eq!(combos[1]["slow"], 30.0);
        assert_eq!(combos[5]["fast"], 10.0);
        assert_eq!(expand_grid(&[]).len(), 1);
    }

    #[test]
    fn test_rank_puts_missing_sharpe_last() {
        let mut ranked = vec![
            (HashMap::new(), result_with_sharpe(None)),
            (HashMap::new(), result_with_sharpe(Some(0.5))),
            (HashMap::new(), result_with_sharpe(Some(1.5))),
        ];
        rank_results(&mut ranked);
        let order: Vec<Option<f64>> = ranked.iter().map(|(_, r)| r.sharpe()).collect();
        assert_eq!(order, vec![Some(1.5), Some(0.5), None]);
    }
}
