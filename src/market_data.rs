use crate::engine::bars_from_raw;
use crate::models::{Bar, RawBar};
use anyhow::{anyhow, Context, Result};
use chrono::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const BAR_SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct BarSnapshot {
    version: u32,
    generated_at: DateTime<Utc>,
    bars: Vec<Bar>,
}

fn is_snapshot_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bin"))
}

/// Loads bars from a `.bin` snapshot or, for any other extension, a JSON
/// array of bar records.
pub fn load_bars<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let bars = if is_snapshot_path(path) {
        load_snapshot(path)?
    } else {
        load_json_bars(path)?
    };
    info!("Loaded {} bars from {}", bars.len(), path.display());
    Ok(bars)
}

pub fn load_json_bars<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open bar file at {}", path.display()))?;
    let raw: Vec<RawBar> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse bar JSON in {}", path.display()))?;
    let bars = bars_from_raw(raw)
        .with_context(|| format!("Invalid bar record in {}", path.display()))?;
    Ok(bars)
}

pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open bar snapshot at {}", path.display()))?;
    let snapshot: BarSnapshot = bincode::deserialize_from(BufReader::new(file))
        .context("Snapshot decode failed")?;

    if snapshot.version != BAR_SNAPSHOT_VERSION {
        return Err(anyhow!(
            "Bar snapshot version mismatch (found {}, expected {})",
            snapshot.version,
            BAR_SNAPSHOT_VERSION
        ));
    }
    Ok(snapshot.bars)
}

pub fn save_snapshot<P: AsRef<Path>>(path: P, bars: &[Bar]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create snapshot directory {}", parent.display())
            })?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Unable to create bar snapshot at {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let snapshot = BarSnapshot {
        version: BAR_SNAPSHOT_VERSION,
        generated_at: Utc::now(),
        bars: bars.to_vec(),
    };
    bincode::serialize_into(&mut writer, &snapshot).context("Failed to serialize bar snapshot")?;
    writer
        .flush()
        .context("Failed to flush bar snapshot to disk")?;
    Ok(())
}
