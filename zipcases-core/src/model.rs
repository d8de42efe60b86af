//! Domain data structures for regions, zip codes, and case values.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Presentation format of date column labels.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Sentinel written for unknown, suppressed, or invalid counts.
pub const NA: &str = "NA";

/// Marker some sources use in place of a count.
pub const SUPPRESSED: &str = "Data Suppressed";

const FILE_SUFFIX: &str = "_cases.csv";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Identifier for a monitored region.
pub struct RegionId(pub String);

impl fmt::Display for RegionId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Metadata describing a region and its human-friendly name.
pub struct RegionMeta {
    /// Unique identifier.
    pub id: RegionId,
    /// Display name.
    pub name: String,
}

/// Where and how to collect counts for one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSource {
    /// Region name; derived from `file` when left empty.
    #[serde(default)]
    pub name: String,
    /// File name of the region's table inside the data directory.
    pub file: String,
    /// Layer description page carrying the last edit date.
    #[serde(default)]
    pub overview_url: Option<String>,
    /// Query URL returning the zip code features as JSON.
    pub data_url: String,
    /// Attribute holding the zip code.
    pub zip_field: String,
    /// Attribute holding the case count.
    pub case_field: String,
}

impl RegionSource {
    /// Name used in logs, falling back to the file name without `_cases.csv`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        match self.file.find(FILE_SUFFIX) {
            Some(index) if index > 0 => self.file.get(..index).unwrap_or(&self.file),
            _ => &self.file,
        }
    }

    /// Metadata for the plugin built from this source.
    #[must_use]
    pub fn meta(&self) -> RegionMeta {
        let name = self.display_name().to_owned();
        RegionMeta {
            id: RegionId(name.clone()),
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Zip code kept as an opaque string so leading zeros survive.
pub struct ZipCode(pub String);

impl ZipCode {
    /// Form used on disk and as the row sort key, inner quotes doubled.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Label of a date column, stored unquoted.
pub struct DateLabel(pub String);

impl From<NaiveDate> for DateLabel {
    fn from(date: NaiveDate) -> Self {
        DateLabel(date.format(DATE_FORMAT).to_string())
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Case count for one zip code on one date.
pub enum CaseValue {
    /// Non-negative count.
    Count(u64),
    /// Unknown, suppressed, negative, or missing.
    Na,
    /// Unparseable payload kept verbatim.
    ///
    /// Never `NA` and never a plain non-negative integer: [`CaseValue::from_raw_text`]
    /// maps those to the other variants, and a cell holding one reads back as
    /// [`CaseValue::Na`] or [`CaseValue::Count`].
    Text(String),
}

impl CaseValue {
    /// Map a signed count, treating negatives as invalid.
    #[must_use]
    pub fn from_count(count: i64) -> Self {
        u64::try_from(count).map_or(CaseValue::Na, CaseValue::Count)
    }

    /// Map a textual count as reported by a source.
    #[must_use]
    pub fn from_raw_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if raw == SUPPRESSED || trimmed == NA {
            return CaseValue::Na;
        }
        if let Ok(count) = trimmed.parse::<i64>() {
            return CaseValue::from_count(count);
        }
        trimmed
            .parse::<u64>()
            .map_or_else(|_err| CaseValue::Text(raw.to_owned()), CaseValue::Count)
    }

    /// Parse a cell read back from a table file.
    #[must_use]
    pub fn from_cell(cell: &str) -> Self {
        if cell == NA {
            return CaseValue::Na;
        }
        cell.parse::<u64>()
            .map_or_else(|_err| CaseValue::Text(cell.to_owned()), CaseValue::Count)
    }

    /// Render as an unescaped table cell.
    #[must_use]
    pub fn to_cell(&self) -> String {
        match self {
            CaseValue::Count(count) => count.to_string(),
            CaseValue::Na => NA.to_owned(),
            CaseValue::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// A zip code's value for the date being collected.
pub struct Observation {
    /// Row key.
    pub zip: ZipCode,
    /// Reported value.
    pub value: CaseValue,
}

impl Observation {
    /// Construct a new observation.
    #[must_use]
    pub fn new(zip: impl Into<String>, value: CaseValue) -> Self {
        Self {
            zip: ZipCode(zip.into()),
            value,
        }
    }
}
