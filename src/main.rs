use anyhow::Result;
use backtest_engine::{
    commands::{backtest, compare, snapshot, sweep},
    config::EngineSettings,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

const DEFAULT_BAR_FILE: &str = "data/bars.bin";

#[derive(Parser)]
#[command(name = "backtest-engine")]
#[command(about = "Bar-by-bar strategy backtester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Account overrides. Unset values fall back to INITIAL_CASH /
/// COMMISSION_RATE from the environment, then to built-in defaults.
#[derive(Args)]
struct AccountArgs {
    /// Starting cash for the simulated account
    #[arg(long)]
    initial_cash: Option<f64>,
    /// Commission charged on each fill as a fraction of notional
    #[arg(long)]
    commission_rate: Option<f64>,
    /// Annual risk-free rate used by the Sharpe ratio
    #[arg(long)]
    risk_free_rate: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one strategy over a bar file and print the result as JSON
    Backtest {
        /// Strategy type (sma_cross, donchian_breakout, momentum)
        strategy: String,
        /// Path to a JSON bar file or a bar snapshot
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        /// Strategy parameter as name=value, repeatable
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Write the JSON result here instead of stdout
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Run every strategy with default parameters and print a comparison table
    Compare {
        /// Path to a JSON bar file or a bar snapshot
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Backtest a grid of parameter values and rank them by Sharpe ratio
    Sweep {
        /// Strategy type (sma_cross, donchian_breakout, momentum)
        strategy: String,
        /// Grid axis as name=v1,v2,..., repeatable
        #[arg(short, long = "grid", value_name = "NAME=V1,V2", required = true)]
        grid: Vec<String>,
        /// Number of top parameter sets to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        /// Path to a JSON bar file or a bar snapshot
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: Option<PathBuf>,
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Convert a JSON bar file into a binary bar snapshot
    Snapshot {
        /// JSON bar file to read
        input: PathBuf,
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Cli { command } = Cli::parse();

    match command {
        Commands::Backtest {
            strategy,
            data_file,
            params,
            output,
            account,
        } => {
            let settings = resolve_settings(&account)?;
            let data_path = resolve_bar_file_path(data_file);
            backtest::run(&data_path, &strategy, &params, settings, output.as_deref()).await?;
        }
        Commands::Compare { data_file, account } => {
            let settings = resolve_settings(&account)?;
            compare::run(&resolve_bar_file_path(data_file), settings).await?;
        }
        Commands::Sweep {
            strategy,
            grid,
            top,
            data_file,
            account,
        } => {
            let settings = resolve_settings(&account)?;
            let data_path = resolve_bar_file_path(data_file);
            sweep::run(&data_path, &strategy, &grid, top, settings).await?;
        }
        Commands::Snapshot { input, output } => {
            let output_path = resolve_bar_file_path(output);
            snapshot::run(&input, &output_path).await?;
        }
    }

    Ok(())
}

fn resolve_settings(account: &AccountArgs) -> Result<EngineSettings> {
    let mut settings = EngineSettings::from_env()?;
    if let Some(initial_cash) = account.initial_cash {
        settings.initial_cash = initial_cash;
    }
    if let Some(commission_rate) = account.commission_rate {
        settings.commission_rate = commission_rate;
    }
    if let Some(risk_free_rate) = account.risk_free_rate {
        settings.risk_free_rate = risk_free_rate;
    }
    info!(
        "Account: initial cash {:.2}, commission rate {}, risk-free rate {}",
        settings.initial_cash, settings.commission_rate, settings.risk_free_rate
    );
    Ok(settings)
}

fn resolve_bar_file_path(cli_value: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_value {
        return path;
    }

    PathBuf::from(DEFAULT_BAR_FILE)
}
