use crate::engine::validate_bars;
use crate::market_data::{load_json_bars, save_snapshot};
use anyhow::{anyhow, Context, Result};
use log::info;
use std::path::Path;
use tokio::fs;

pub async fn ensure_bar_file(path: &Path) -> Result<()> {
    if fs::metadata(path).await.is_ok() {
        return Ok(());
    }

    Err(anyhow!(
        "Bar file not found at {}. Provide a JSON bar array or a snapshot written by `snapshot`.",
        path.display()
    ))
}

/// Converts a JSON bar file into a binary snapshot after validating it.
pub async fn run(input_path: &Path, output_path: &Path) -> Result<()> {
    ensure_bar_file(input_path).await?;
    info!(
        "Generating bar snapshot at {} from {}",
        output_path.display(),
        input_path.display()
    );

    let bars = load_json_bars(input_path)?;
    validate_bars(&bars).with_context(|| format!("Invalid bar series in {}", input_path.display()))?;
    save_snapshot(output_path, &bars)?;

    info!(
        "Bar snapshot with {} bars successfully written to {}",
        bars.len(),
        output_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::load_bars;

    #[tokio::test]
    async fn test_converts_json_to_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bars.json");
        let output = dir.path().join("bars.bin");
        std::fs::write(
            &input,
            r#"[{"date":"2022-02-01","open":5,"high":6,"low":4,"close":5.5,"volume":100},
                {"date":"2022-02-02","open":5.5,"high":6.5,"low":5,"close":6,"volume":120}]"#,
        )
        .unwrap();

        run(&input, &output).await.unwrap();
        let bars = load_bars(&output).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].high, 6.0);
    }

    #[tokio::test]
    async fn test_refuses_unordered_series() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bars.json");
        std::fs::write(
            &input,
            r#"[{"date":"2022-02-02","open":5,"high":6,"low":4,"close":5.5,"volume":100},
                {"date":"2022-02-01","open":5.5,"high":6.5,"low":5,"close":6,"volume":120}]"#,
        )
        .unwrap();
        let output = dir.path().join("bars.bin");
        assert!(run(&input, &output).await.is_err());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_bar_file(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Bar file not found"));
    }
}
