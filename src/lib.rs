pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod models;
pub mod param_utils;
pub mod performance;
pub mod runner;
pub mod strategy;
pub mod trading_rules;

pub mod commands {
    pub mod backtest;
    pub mod compare;
    pub mod snapshot;
    pub mod sweep;
}

pub use engine::{run, Engine};
pub use error::BacktestError;
