//! Row type for the sales table and the CSV cell conventions it is read with.

use serde::{Deserialize, Deserializer, Serialize};

/// Marker the upstream table uses for unknown text values.
const MISSING_MARKER: &str = "N/A";

/// One release of one title on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(rename = "Name", default, deserialize_with = "text_cell")]
    pub title: Option<String>,

    #[serde(rename = "Platform", default, deserialize_with = "text_cell")]
    pub platform: Option<String>,

    #[serde(rename = "Year", default, deserialize_with = "year_cell")]
    pub year: Option<i32>,

    #[serde(rename = "Genre", default, deserialize_with = "text_cell")]
    pub genre: Option<String>,

    #[serde(rename = "Publisher", default, deserialize_with = "text_cell")]
    pub publisher: Option<String>,

    #[serde(rename = "NA_Sales", default, deserialize_with = "sales_cell")]
    pub na_sales: f64,

    #[serde(rename = "EU_Sales", default, deserialize_with = "sales_cell")]
    pub eu_sales: f64,

    #[serde(rename = "JP_Sales", default, deserialize_with = "sales_cell")]
    pub jp_sales: f64,

    #[serde(rename = "Other_Sales", default, deserialize_with = "sales_cell")]
    pub other_sales: f64,

    #[serde(rename = "Global_Sales", default, deserialize_with = "sales_cell")]
    pub global_sales: f64,
}

/// Sales regions present in the table. Figures are in millions of units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    NorthAmerica,
    Europe,
    Japan,
    Other,
    Global,
}

impl Region {
    pub fn sales(self, record: &SalesRecord) -> f64 {
        match self {
            Region::NorthAmerica => record.na_sales,
            Region::Europe => record.eu_sales,
            Region::Japan => record.jp_sales,
            Region::Other => record.other_sales,
            Region::Global => record.global_sales,
        }
    }
}

/// Columns every source must carry. Anything else (e.g. `Rank`) is ignored.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Name",
    "Platform",
    "Year",
    "Genre",
    "Publisher",
    "NA_Sales",
    "EU_Sales",
    "JP_Sales",
    "Other_Sales",
    "Global_Sales",
];

fn is_missing(value: &str) -> bool {
    value.is_empty() || value == MISSING_MARKER
}

fn text_cell<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|value| value.trim().to_string())
        .filter(|value| !is_missing(value)))
}

fn year_cell<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if is_missing(raw) {
        return Ok(None);
    }
    parse_year(raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid year: {raw:?}")))
}

/// Years arrive either as integers or as integral floats (`2006.0`).
fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(year) = raw.parse::<i32>() {
        return Some(year);
    }
    let value = raw.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Empty sales cells are unknown, not zero: they read as NaN, which
/// aggregation skips and every comparison rejects.
fn sales_cell<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
