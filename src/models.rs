use crate::error::{BacktestError, EngineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// One OHLCV observation. Bars handed to the engine are already validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Incoming bar record as supplied by a data collaborator. Any field may be
/// absent; conversion into [`Bar`] names the first one that is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBar {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
}

fn require_field(value: Option<f64>, name: &str) -> EngineResult<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(BacktestError::MissingField(name.to_string())),
    }
}

impl TryFrom<RawBar> for Bar {
    type Error = BacktestError;

    fn try_from(raw: RawBar) -> EngineResult<Self> {
        let date = raw
            .date
            .ok_or_else(|| BacktestError::MissingField("date".to_string()))?;
        Ok(Bar {
            date,
            open: require_field(raw.open, "open")?,
            high: require_field(raw.high, "high")?,
            low: require_field(raw.low, "low")?,
            close: require_field(raw.close, "close")?,
            volume: require_field(raw.volume, "volume")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SmaCross,
    DonchianBreakout,
    Momentum,
}

impl StrategyType {
    pub const ALL: [StrategyType; 3] = [
        StrategyType::SmaCross,
        StrategyType::DonchianBreakout,
        StrategyType::Momentum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::SmaCross => "sma_cross",
            StrategyType::DonchianBreakout => "donchian_breakout",
            StrategyType::Momentum => "momentum",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = BacktestError;

    fn from_str(raw: &str) -> EngineResult<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sma_cross" => Ok(StrategyType::SmaCross),
            "donchian_breakout" => Ok(StrategyType::DonchianBreakout),
            "momentum" => Ok(StrategyType::Momentum),
            _ => Err(BacktestError::UnknownStrategy(raw.to_string())),
        }
    }
}

/// Strategy name plus its numeric parameters. The name stays a string until
/// the run resolves it so an unknown type can be reported verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy_type: String,
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
}

impl StrategyConfig {
    pub fn new(strategy_type: impl Into<String>) -> Self {
        Self {
            strategy_type: strategy_type.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    pub fn resolve_type(&self) -> EngineResult<StrategyType> {
        self.strategy_type.parse()
    }
}

/// What a strategy wants to do on the current bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Hold,
    EnterLong { size: u64, stop_price: f64 },
    ExitLong,
}

/// Broker view handed to the strategy each bar. `equity` is marked at the
/// current close before the bar's execution is applied; `buying_power` is the
/// cash left for notional once the entry commission is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrokerState {
    pub cash: f64,
    pub buying_power: f64,
    pub equity: f64,
    pub position_size: f64,
    pub entry_price: Option<f64>,
    pub entry_stop_price: Option<f64>,
}

impl BrokerState {
    pub fn is_flat(&self) -> bool {
        self.position_size <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A closed round trip. `date`, `side` and `price` describe the closing leg;
/// `commission` is the total paid on both legs and `pnl` is net of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub side: TradeSide,
    pub price: f64,
    pub size: f64,
    pub commission: f64,
    pub pnl: f64,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPosition {
    pub date: NaiveDate,
    pub position_size: f64,
    pub cash: f64,
    pub equity: f64,
    pub drawdown: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub sharpe: Option<f64>,
    pub max_drawdown: f64,
    pub win_rate: Option<f64>,
    pub avg_trade_return: Option<f64>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_type: StrategyType,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub final_equity: f64,
    /// Shares still held after the last bar; open positions are not force-closed.
    pub open_position: f64,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub daily_positions: Vec<DailyPosition>,
}

impl BacktestResult {
    pub fn total_return(&self) -> f64 {
        self.metrics.total_return
    }

    pub fn sharpe(&self) -> Option<f64> {
        self.metrics.sharpe
    }

    pub fn max_drawdown(&self) -> f64 {
        self.metrics.max_drawdown
    }

    pub fn win_rate(&self) -> Option<f64> {
        self.metrics.win_rate
    }

    pub fn avg_trade_return(&self) -> Option<f64> {
        self.metrics.avg_trade_return
    }
}
