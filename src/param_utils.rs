use crate::error::{BacktestError, EngineResult};
use log::warn;
use std::collections::HashMap;

/// Extract a parameter as f64 with a default value
pub fn get_param_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Extract a window length. Must be a finite whole number of at least one bar.
pub fn get_param_period(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
) -> EngineResult<usize> {
    let Some(raw) = params.get(key).copied() else {
        return Ok(default);
    };
    if !raw.is_finite() || raw.fract() != 0.0 || raw < 1.0 {
        return Err(BacktestError::InvalidParameter(format!(
            "{} must be a whole number >= 1 (value: {})",
            key, raw
        )));
    }
    Ok(raw as usize)
}

/// Extract a finite parameter constrained to `[min, max]`.
pub fn get_param_f64_in_range(
    params: &HashMap<String, f64>,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> EngineResult<f64> {
    let value = get_param_f64(params, key, default);
    if !value.is_finite() || value < min || value > max {
        return Err(BacktestError::InvalidParameter(format!(
            "{} must be between {} and {} (value: {})",
            key, min, max, value
        )));
    }
    Ok(value)
}

/// Log parameters the strategy does not read so typos do not go unnoticed.
pub fn warn_unknown_params(params: &HashMap<String, f64>, known: &[&str], strategy: &str) {
    let mut unknown: Vec<&String> = params
        .keys()
        .filter(|key| !known.contains(&key.as_str()))
        .collect();
    if unknown.is_empty() {
        return;
    }
    unknown.sort();
    warn!(
        "Ignoring unknown parameter(s) for {}: {:?}",
        strategy, unknown
    );
}

/// Parse `name=value` pairs as given on the command line.
pub fn parse_param_assignments(pairs: &[String]) -> EngineResult<HashMap<String, f64>> {
    let mut params = HashMap::new();
    for pair in pairs {
        let (name, raw) = pair.split_once('=').ok_or_else(|| {
            BacktestError::InvalidParameter(format!("expected name=value, got '{}'", pair))
        })?;
        let value = raw.trim().parse::<f64>().map_err(|_| {
            BacktestError::InvalidParameter(format!("{} must be a number (value: {})", name, raw))
        })?;
        params.insert(name.trim().to_string(), value);
    }
    Ok(params)
}
