use crate::error::{BacktestError, EngineResult};
use anyhow::{anyhow, Result};
use std::collections::HashMap;

pub const INITIAL_CASH_KEY: &str = "INITIAL_CASH";
pub const COMMISSION_RATE_KEY: &str = "COMMISSION_RATE";
pub const RISK_FREE_RATE_KEY: &str = "RISK_FREE_RATE";
pub const PERIODS_PER_YEAR_KEY: &str = "PERIODS_PER_YEAR";

const SETTING_KEYS: [&str; 4] = [
    INITIAL_CASH_KEY,
    COMMISSION_RATE_KEY,
    RISK_FREE_RATE_KEY,
    PERIODS_PER_YEAR_KEY,
];

/// Account and metric settings shared by every run of an [`crate::Engine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub initial_cash: f64,
    /// Fraction of notional charged on each fill.
    pub commission_rate: f64,
    /// Annual rate, converted per period inside the Sharpe ratio.
    pub risk_free_rate: f64,
    pub periods_per_year: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_cash: 100_000.0,
            commission_rate: 0.001,
            risk_free_rate: 0.0,
            periods_per_year: 252,
        }
    }
}

impl EngineSettings {
    pub fn new(initial_cash: f64, commission_rate: f64) -> Self {
        Self {
            initial_cash,
            commission_rate,
            ..Self::default()
        }
    }

    /// Builds settings from string key/value pairs. Absent keys keep their
    /// defaults; present ones must parse and pass range checks.
    pub fn from_settings_map(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Self::default();
        let initial_cash =
            optional_setting_f64(settings, INITIAL_CASH_KEY, Some(0.0), None)?
                .unwrap_or(defaults.initial_cash);
        let commission_rate =
            optional_setting_f64(settings, COMMISSION_RATE_KEY, Some(0.0), Some(1.0))?
                .unwrap_or(defaults.commission_rate);
        let risk_free_rate = optional_setting_f64(settings, RISK_FREE_RATE_KEY, None, None)?
            .unwrap_or(defaults.risk_free_rate);
        let periods_per_year = optional_setting_usize(settings, PERIODS_PER_YEAR_KEY, 1)?
            .unwrap_or(defaults.periods_per_year);

        if initial_cash <= 0.0 {
            return Err(anyhow!(
                "Setting {} must be > 0 (value: {})",
                INITIAL_CASH_KEY,
                initial_cash
            ));
        }

        Ok(Self {
            initial_cash,
            commission_rate,
            risk_free_rate,
            periods_per_year,
        })
    }

    /// Reads the same keys from the process environment.
    pub fn from_env() -> Result<Self> {
        let settings: HashMap<String, String> = SETTING_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self::from_settings_map(&settings)
    }

    /// Checks the account settings a run depends on.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.initial_cash.is_finite() || self.initial_cash <= 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "initial_cash must be a positive finite number (value: {})",
                self.initial_cash
            )));
        }
        if !self.commission_rate.is_finite() || self.commission_rate < 0.0 {
            return Err(BacktestError::InvalidParameter(format!(
                "commission_rate must be >= 0 (value: {})",
                self.commission_rate
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::InvalidParameter(format!(
                "risk_free_rate must be finite (value: {})",
                self.risk_free_rate
            )));
        }
        if self.periods_per_year == 0 {
            return Err(BacktestError::InvalidParameter(
                "periods_per_year must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn optional_setting<'a>(settings: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    settings
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn optional_setting_f64(
    settings: &HashMap<String, String>,
    key: &str,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<Option<f64>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() {
        return Err(anyhow!("Setting {} must be finite (value: {})", key, raw));
    }
    if let Some(min_value) = min {
        if value < min_value {
            return Err(anyhow!(
                "Setting {} must be >= {} (value: {})",
                key,
                min_value,
                raw
            ));
        }
    }
    if let Some(max_value) = max {
        if value > max_value {
            return Err(anyhow!(
                "Setting {} must be <= {} (value: {})",
                key,
                max_value,
                raw
            ));
        }
    }
    Ok(Some(value))
}

fn optional_setting_usize(
    settings: &HashMap<String, String>,
    key: &str,
    min: usize,
) -> Result<Option<usize>> {
    let Some(raw) = optional_setting(settings, key) else {
        return Ok(None);
    };
    let value = raw
        .parse::<f64>()
        .map_err(|_| anyhow!("Setting {} must be a number (value: {})", key, raw))?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(anyhow!(
            "Setting {} must be an integer (value: {})",
            key,
            raw
        ));
    }
    if value < min as f64 {
        return Err(anyhow!(
            "Setting {} must be >= {} (value: {})",
            key,
            min,
            raw
        ));
    }
    Ok(Some(value as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_map_uses_defaults() {
        let parsed = EngineSettings::from_settings_map(&HashMap::new()).unwrap();
        assert_eq!(parsed, EngineSettings::default());
    }

    #[test]
    fn test_parses_all_keys() {
        let parsed = EngineSettings::from_settings_map(&settings(&[
            ("INITIAL_CASH", "25000"),
            ("COMMISSION_RATE", " 0.0005 "),
            ("RISK_FREE_RATE", "0.02"),
            ("PERIODS_PER_YEAR", "52"),
        ]))
        .unwrap();
        assert_eq!(parsed.initial_cash, 25_000.0);
        assert_eq!(parsed.commission_rate, 0.0005);
        assert_eq!(parsed.risk_free_rate, 0.02);
        assert_eq!(parsed.periods_per_year, 52);
    }

    #[test]
    fn test_rejects_bad_values() {
        for (key, value) in [
            ("INITIAL_CASH", "0"),
            ("INITIAL_CASH", "abc"),
            ("COMMISSION_RATE", "-0.1"),
            ("PERIODS_PER_YEAR", "2.5"),
            ("RISK_FREE_RATE", "inf"),
        ] {
            let err = EngineSettings::from_settings_map(&settings(&[(key, value)])).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }
    }

    #[test]
    fn test_validate_reports_invalid_parameter() {
        assert!(matches!(
            EngineSettings::new(-1.0, 0.0).validate(),
            Err(BacktestError::InvalidParameter(_))
        ));
        assert!(matches!(
            EngineSettings::new(f64::NAN, 0.0).validate(),
            Err(BacktestError::InvalidParameter(_))
        ));
        assert!(matches!(
            EngineSettings::new(1_000.0, -0.01).validate(),
            Err(BacktestError::InvalidParameter(_))
        ));
        assert!(EngineSettings::new(1_000.0, 0.0).validate().is_ok());
    }
}
