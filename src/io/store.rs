//! Persisted per-basin snow-line series.
//!
//! One CSV per basin, `decadal_SLA_<basin>.csv`, columns
//! `Year-Month-Day,SLA_East,SLA_North,SLA_South,SLA_West`; an empty field is
//! an explicit null. The store is append-only: persisted records are never
//! rewritten, only dates newer than the persisted maximum are added.

use crate::types::{SlaRecord, SnowError, SnowResult};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use regex::Regex;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "decadal_SLA_";
const HEADERS: [&str; 5] = [
    "Year-Month-Day",
    "SLA_East",
    "SLA_North",
    "SLA_South",
    "SLA_West",
];

/// Historical snow-line store rooted at one directory
pub struct SlaStore {
    dir: PathBuf,
}

impl SlaStore {
    pub fn open<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Basin names are embedded in file names; strip everything unsafe
    fn sanitize(basin: &str) -> String {
        let re = Regex::new(r"[^A-Za-z0-9_\-]").expect("static pattern");
        re.replace_all(basin, "").into_owned()
    }

    fn path_for(&self, basin: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.csv", FILE_PREFIX, Self::sanitize(basin)))
    }

    /// Load the persisted series for a basin, sorted by date with duplicate
    /// dates collapsed (first record wins, matching the historical export).
    ///
    /// A missing or unreadable store is empty history, not an error: the
    /// caller recomputes the full series at higher cost.
    pub fn load(&self, basin: &str) -> SnowResult<Vec<SlaRecord>> {
        let path = self.path_for(basin);
        if !path.exists() {
            log::warn!(
                "no persisted series for basin '{}' at {}; treating history as empty",
                basin,
                path.display()
            );
            return Ok(Vec::new());
        }

        let mut reader = ReaderBuilder::new().has_headers(true).from_path(&path)?;
        let headers = reader.headers()?.clone();
        let index_of = |name: &str| -> SnowResult<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SnowError::Store(format!("column '{}' missing in {}", name, path.display())))
        };
        let date_col = index_of(HEADERS[0])?;
        let value_cols = [
            index_of(HEADERS[1])?,
            index_of(HEADERS[2])?,
            index_of(HEADERS[3])?,
            index_of(HEADERS[4])?,
        ];

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let date_field = row.get(date_col).unwrap_or_default();
            let date = NaiveDate::parse_from_str(date_field, "%Y-%m-%d").map_err(|e| {
                SnowError::Store(format!("bad date '{}' in {}: {}", date_field, path.display(), e))
            })?;
            let mut values = [None; 4];
            for (slot, &col) in values.iter_mut().zip(value_cols.iter()) {
                let field = row.get(col).unwrap_or_default().trim();
                if !field.is_empty() {
                    let parsed: f64 = field.parse().map_err(|_| {
                        SnowError::Store(format!("bad value '{}' in {}", field, path.display()))
                    })?;
                    *slot = Some(parsed);
                }
            }
            records.push(SlaRecord {
                date,
                east: values[0],
                north: values[1],
                south: values[2],
                west: values[3],
            });
        }

        records.sort_by_key(|r| r.date);
        records.dedup_by_key(|r| r.date);
        log::debug!("loaded {} records for basin '{}'", records.len(), basin);
        Ok(records)
    }

    /// Append records newer than the persisted maximum date; earlier dates
    /// are silently skipped (persisted history is immutable). Returns the
    /// number of records written.
    pub fn append(&self, basin: &str, records: &[SlaRecord]) -> SnowResult<usize> {
        let existing = self.load(basin)?;
        let last = existing.iter().map(|r| r.date).max();

        let mut fresh: Vec<&SlaRecord> = records
            .iter()
            .filter(|r| last.map_or(true, |d| r.date > d))
            .collect();
        fresh.sort_by_key(|r| r.date);
        if fresh.is_empty() {
            return Ok(0);
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(basin);
        let fresh_file = !path.exists();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh_file {
            writer.write_record(HEADERS)?;
        }
        for record in &fresh {
            let field = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
            writer.write_record([
                record.date.format("%Y-%m-%d").to_string(),
                field(record.east),
                field(record.north),
                field(record.south),
                field(record.west),
            ])?;
        }
        writer.flush()?;
        log::info!("appended {} records for basin '{}'", fresh.len(), basin);
        Ok(fresh.len())
    }

    /// Basins with a persisted series
    pub fn list_basins(&self) -> SnowResult<Vec<String>> {
        let re = Regex::new(r"^decadal_SLA_(.+)\.csv$").expect("static pattern");
        let mut basins = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return Ok(basins),
        };
        for entry in entries {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(caps) = re.captures(name) {
                    basins.push(caps[1].to_string());
                }
            }
        }
        basins.sort();
        Ok(basins)
    }
}
