//! CSV output formatting
//!
//! Writes the per-second time series, one row per second with a header row.
//! The file content is the series' `Display` rendering, so the file and the
//! console table share one row format.

use crate::stats::time_series::TimeSeries;
use crate::Result;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `series` to `path`, creating parent directories as needed
pub fn write_time_series(path: &Path, series: &TimeSeries) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create time series file {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(series.to_string().as_bytes())
        .with_context(|| format!("Failed to write time series file {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write time series file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::time_series::TimeSeriesSampler;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_write_time_series() {
        let mut sampler = TimeSeriesSampler::new();
        sampler.add(Utc.timestamp_opt(1_000, 0).unwrap(), Duration::from_millis(3));
        sampler.add(Utc.timestamp_opt(1_002, 0).unwrap(), Duration::from_millis(5));
        let series = sampler.finish();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("timeseries.csv");
        write_time_series(&path, &series).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, series.to_string());
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "1001,0.000,0.000,0.000,0");
    }

    #[test]
    fn test_write_time_series_unwritable_path() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = write_time_series(&blocker.join("timeseries.csv"), &TimeSeries::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to"));
    }
}
