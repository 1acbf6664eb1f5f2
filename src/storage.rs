//! Persist burden records and summaries, and manage the local download cache.

use crate::models::{SummaryRow, TbRecord};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Save burden records as CSV with header.
///
/// Numeric columns are the sorted union of the column names present in the
/// rows, so tables with ragged maps still align.
pub fn save_csv<P: AsRef<Path>>(records: &[TbRecord], path: P) -> Result<()> {
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.values.keys().map(String::as_str))
        .collect();

    let mut wtr = WriterBuilder::new().from_path(path)?;
    let mut header = vec!["country", "iso3", "g_whoregion", "year"];
    header.extend(columns.iter().copied());
    wtr.write_record(&header)?;
    for r in records {
        let mut row = vec![
            r.country.clone(),
            r.iso3.clone(),
            r.g_whoregion.clone(),
            r.year.to_string(),
        ];
        for col in &columns {
            row.push(match r.value(col) {
                Some(v) => v.to_string(),
                None => String::new(),
            });
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save burden records as pretty JSON array.
pub fn save_json<P: AsRef<Path>>(records: &[TbRecord], path: P) -> Result<()> {
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(records)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Save summary rows as CSV, naming the value columns after the metric:
/// `area, year, {metric}, {metric}_lo, {metric}_hi`.
pub fn save_summary_csv<P: AsRef<Path>>(
    rows: &[SummaryRow],
    metric: &str,
    path: P,
) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.serialize((
        "area",
        "year",
        metric,
        format!("{metric}_lo"),
        format!("{metric}_hi"),
    ))?;
    for r in rows {
        wtr.serialize((&r.area, r.year, r.value, r.lo, r.hi))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save summary rows as pretty JSON array.
pub fn save_summary_json<P: AsRef<Path>>(rows: &[SummaryRow], path: P) -> Result<()> {
    let mut f = File::create(path)?;
    let s = serde_json::to_string_pretty(rows)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}

/// Root of the local download cache.
pub fn cache_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir().context("no cache directory on this platform")?;
    Ok(base.join("tbi-rs"))
}

/// Return the cached body of `name`, fetching and caching it when absent or
/// when `refresh` is set. The cache file is written atomically.
pub fn cached_text<F>(name: &str, refresh: bool, fetch: F) -> Result<String>
where
    F: FnOnce() -> Result<String>,
{
    let dir = cache_dir()?;
    let path = dir.join(name);
    if !refresh && path.exists() {
        return fs::read_to_string(&path)
            .with_context(|| format!("read cached {}", path.display()));
    }

    let body = fetch()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(body.as_bytes())?;
    tmp.persist(&path)
        .with_context(|| format!("write cache {}", path.display()))?;
    Ok(body)
}
