//! Data loading: fetch the sales table and keep only the target year.
//!
//! The loader never retries on its own. Fetch and parse failures are
//! returned to the caller, whose retry policy decides what happens next.

mod record;
mod source;

pub use record::{Region, SalesRecord, REQUIRED_COLUMNS};
pub use source::{source_from_location, DataSource, FileSource, HttpSource};

use crate::error::{Error, Result};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

/// Rows of a single year. Cheap to clone; the rows themselves are never mutated.
#[derive(Debug, Clone)]
pub struct FilteredDataset {
    year: i32,
    rows: Arc<[SalesRecord]>,
}

impl FilteredDataset {
    /// Keep only the records released in `year`. Records with no year are dropped.
    pub fn from_records(records: impl IntoIterator<Item = SalesRecord>, year: i32) -> Self {
        let rows: Arc<[SalesRecord]> = records
            .into_iter()
            .filter(|record| record.year == Some(year))
            .collect();

        Self { year, rows }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn rows(&self) -> &[SalesRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse the raw CSV table.
///
/// Columns are matched by header name. A missing required column is a
/// schema mismatch and fails the whole fetch.
pub fn parse_csv<R: Read>(reader: R) -> Result<Vec<SalesRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Fetch(format!(
            "Source is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<SalesRecord>, _>>()?;
    Ok(records)
}

/// Fetch the full table from `source` and filter it down to `year`.
pub async fn load(source: &dyn DataSource, year: i32) -> Result<FilteredDataset> {
    info!("Fetching sales data from {}", source.location());
    let bytes = source.fetch().await?;
    debug!("Fetched {} bytes", bytes.len());

    let records = parse_csv(bytes.as_slice())?;
    let total = records.len();
    let dataset = FilteredDataset::from_records(records, year);

    info!(
        "Loaded {} of {} rows for year {}",
        dataset.len(),
        total,
        year
    );
    Ok(dataset)
}
