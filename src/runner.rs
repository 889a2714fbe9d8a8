//! Scheduling of independent backtests. Each run is synchronous and owns its
//! strategy and broker; only the bar series is shared, read-only.

use crate::config::EngineSettings;
use crate::engine::Engine;
use crate::error::EngineResult;
use crate::models::{Bar, BacktestResult, StrategyConfig};
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tokio::task::JoinHandle;

struct BacktestJob {
    index: usize,
    config: StrategyConfig,
}

struct BacktestJobResult {
    index: usize,
    result: EngineResult<BacktestResult>,
}

/// Hands one run to tokio's blocking pool. The caller decides whether to
/// await the handle, abort it, or drop it.
pub fn spawn_backtest(
    bars: Arc<Vec<Bar>>,
    config: StrategyConfig,
    settings: EngineSettings,
) -> JoinHandle<EngineResult<BacktestResult>> {
    tokio::task::spawn_blocking(move || Engine::new(settings).backtest(bars.as_slice(), &config))
}

/// Runs every config against the same bars on a worker-thread pool and
/// returns the results in submission order. `on_complete` is called on the
/// calling thread as each run finishes.
pub fn run_batch<F>(
    bars: Arc<Vec<Bar>>,
    configs: Vec<StrategyConfig>,
    settings: EngineSettings,
    mut on_complete: F,
) -> Result<Vec<EngineResult<BacktestResult>>>
where
    F: FnMut(usize, &EngineResult<BacktestResult>),
{
    let total = configs.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let num_workers = std::cmp::min(total, std::cmp::max(1, num_cpus::get()));
    info!("Running {} backtests on {} worker threads", total, num_workers);

    let (task_tx, task_rx): (Sender<BacktestJob>, Receiver<BacktestJob>) = bounded(total);
    let (result_tx, result_rx): (Sender<BacktestJobResult>, Receiver<BacktestJobResult>) =
        bounded(total);

    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let rx = task_rx.clone();
        let result_tx = result_tx.clone();
        let bars = bars.clone();

        let handle = thread::spawn(move || {
            let engine = Engine::new(settings);
            while let Ok(job) = rx.recv() {
                let start = Instant::now();
                let result = engine.backtest(bars.as_slice(), &job.config);
                if let Err(err) = &result {
                    warn!(
                        "Backtest {} ({}) failed after {:.2}s: {}",
                        job.index,
                        job.config.strategy_type,
                        start.elapsed().as_secs_f64(),
                        err
                    );
                }
                let message = BacktestJobResult {
                    index: job.index,
                    result,
                };
                if result_tx.send(message).is_err() {
                    break;
                }
            }
        });
        handles.push(handle);
    }
    drop(result_tx);

    for (index, config) in configs.into_iter().enumerate() {
        task_tx.send(BacktestJob { index, config })?;
    }
    drop(task_tx);

    let mut slots: Vec<Option<EngineResult<BacktestResult>>> = (0..total).map(|_| None).collect();
    let mut completed = 0;
    while completed < total {
        let Ok(message) = result_rx.recv() else {
            warn!("Result channel closed unexpectedly. Some results may be lost.");
            break;
        };
        completed += 1;
        on_complete(completed, &message.result);
        slots[message.index] = Some(message.result);
    }

    for handle in handles {
        if handle.join().is_err() {
            warn!("Backtest worker panicked");
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| slot.ok_or_else(|| anyhow!("Backtest {} produced no result", index)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BacktestError;
    use crate::models::StrategyType;
    use chrono::{Duration, NaiveDate};

    fn wave_bars(count: usize) -> Arc<Vec<Bar>> {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        Arc::new(
            (0..count)
                .map(|i| {
                    let close = 100.0 + 10.0 * (i as f64 / 9.0).sin() + i as f64 * 0.05;
                    Bar::new(
                        start + Duration::days(i as i64),
                        close,
                        close + 1.0,
                        close - 1.0,
                        close,
                        1_000.0,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_batch_preserves_submission_order() {
        let bars = wave_bars(200);
        let configs: Vec<StrategyConfig> = StrategyType::ALL
            .iter()
            .map(|t| StrategyConfig::new(t.as_str()))
            .chain(std::iter::once(StrategyConfig::new("unknown")))
            .collect();
        let mut progress = Vec::new();
        let results = run_batch(bars.clone(), configs, EngineSettings::default(), |done, _| {
            progress.push(done)
        })
        .unwrap();

        assert_eq!(progress, vec![1, 2, 3, 4]);
        assert_eq!(results.len(), 4);
        for (result, expected) in results.iter().zip(StrategyType::ALL) {
            assert_eq!(result.as_ref().unwrap().strategy_type, expected);
        }
        assert_eq!(
            results[3].as_ref().unwrap_err(),
            &BacktestError::UnknownStrategy("unknown".to_string())
        );
    }

    #[test]
    fn test_batch_matches_sequential_runs() {
        let bars = wave_bars(150);
        let config = StrategyConfig::new("sma_cross")
            .with_param("fast", 5.0)
            .with_param("slow", 20.0);
        let settings = EngineSettings::default();
        let batch = run_batch(bars.clone(), vec![config.clone()], settings, |_, _| {}).unwrap();
        let sequential = Engine::new(settings).backtest(&bars, &config).unwrap();
        assert_eq!(batch[0].as_ref().unwrap(), &sequential);
    }

    #[tokio::test]
    async fn test_spawned_backtest_completes() {
        let bars = wave_bars(120);
        let handle = spawn_backtest(
            bars.clone(),
            StrategyConfig::new("donchian_breakout"),
            EngineSettings::default(),
        );
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.daily_positions.len(), 120);
    }
}
