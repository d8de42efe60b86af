//! Zip code by date table: parsing, serialization, and merging a new day of counts.
//!
//! The on-disk layout is a header of quoted dates behind an empty first column,
//! followed by one row per zip code:
//!
//! ```text
//! ,"04/16/2020","04/17/2020"
//! "68123",5,7
//! "68124",NA,NA
//! ```

use std::collections::{HashMap, HashSet};

use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};

use crate::model::{CaseValue, DateLabel, Observation, ZipCode};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
/// Errors raised while reading or merging a table.
pub enum TableError {
    /// A row ended up with the wrong number of values after merging.
    #[error("inconsistent number of data points for zip code {zip}: expected {expected}, found {found}")]
    Inconsistent {
        /// Offending row.
        zip: ZipCode,
        /// Values every row must carry.
        expected: usize,
        /// Values the row carries.
        found: usize,
    },
    /// The header does not start with the empty placeholder column.
    #[error("malformed header: first column must be empty")]
    MalformedHeader,
    /// The CSV layer failed to read or write a record.
    #[error("csv error: {0}")]
    Csv(String),
}

impl From<csv::Error> for TableError {
    fn from(err: csv::Error) -> Self {
        TableError::Csv(err.to_string())
    }
}

/// Whether a merge appended a new date column or replaced the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// The date was new and got its own column.
    Append,
    /// The date was already present; its column was replaced.
    Overwrite,
}

/// Sparse matrix of case values keyed by zip code and date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeSeriesTable {
    dates: Vec<DateLabel>,
    rows: Vec<(ZipCode, Vec<CaseValue>)>,
}

/// Result of merging one day of observations.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Updated table, ready to be written.
    pub table: TimeSeriesTable,
    /// Append or overwrite.
    pub mode: MergeMode,
    /// Zip codes seen for the first time.
    pub new_zips: Vec<ZipCode>,
    /// Known zip codes absent from today's observations.
    pub missing_zips: Vec<ZipCode>,
    /// Zip codes observed more than once; the last observation was kept.
    pub duplicate_zips: Vec<ZipCode>,
}

impl TimeSeriesTable {
    /// Build a table from parts. Rows are sorted but not checked for length.
    #[must_use]
    pub fn from_parts(dates: Vec<DateLabel>, rows: Vec<(ZipCode, Vec<CaseValue>)>) -> Self {
        let mut table = Self { dates, rows };
        table.sort_rows();
        table
    }

    /// Date columns in append order.
    #[must_use]
    pub fn dates(&self) -> &[DateLabel] {
        &self.dates
    }

    /// Rows in ascending order of the quoted zip code.
    #[must_use]
    pub fn rows(&self) -> &[(ZipCode, Vec<CaseValue>)] {
        &self.rows
    }

    /// Values recorded for a zip code.
    #[must_use]
    pub fn row(&self, zip: &ZipCode) -> Option<&[CaseValue]> {
        self.rows
            .iter()
            .find(|(key, _values)| key == zip)
            .map(|(_key, values)| values.as_slice())
    }

    /// Parse the persisted text form.
    ///
    /// Rows of differing lengths are accepted here; [`merge`] rejects them.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MalformedHeader`] when the first column of the
    /// header is not empty, or [`TableError::Csv`] when a record cannot be read.
    pub fn parse(text: &str) -> Result<Self, TableError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records = reader.records();

        let Some(header) = records.next().transpose()? else {
            return Ok(Self::default());
        };
        let mut header_fields = header.iter();
        if header_fields.next().is_some_and(|first| !first.is_empty()) {
            return Err(TableError::MalformedHeader);
        }
        let dates = header_fields.map(|label| DateLabel(label.to_owned())).collect();

        // A zip repeated in the file keeps its last row.
        let mut rows: HashMap<ZipCode, Vec<CaseValue>> = HashMap::new();
        for record in records {
            let record = record?;
            let mut fields = record.iter();
            let Some(zip) = fields.next() else {
                continue;
            };
            let values: Vec<CaseValue> = fields.map(CaseValue::from_cell).collect();
            rows.insert(ZipCode(zip.to_owned()), values);
        }

        Ok(Self::from_parts(dates, rows.into_iter().collect()))
    }

    /// Render the persisted text form: dates and zip codes always quoted,
    /// cells quoted only when they hold a delimiter, quote, or line break.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::Csv`] when a record cannot be encoded.
    pub fn to_csv(&self) -> Result<String, TableError> {
        let mut out = String::new();
        if !self.dates.is_empty() {
            out.push(',');
            out.push_str(&csv_line(
                QuoteStyle::Always,
                self.dates.iter().map(|date| date.0.as_str()),
            )?);
        }
        out.push('\n');

        for (zip, values) in &self.rows {
            out.push_str(&csv_line(QuoteStyle::Always, [zip.0.as_str()])?);
            if !values.is_empty() {
                let cells: Vec<String> = values.iter().map(CaseValue::to_cell).collect();
                out.push(',');
                out.push_str(&csv_line(QuoteStyle::Necessary, &cells)?);
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn sort_rows(&mut self) {
        self.rows.sort_by_cached_key(|(zip, _values)| zip.quoted());
    }
}

/// Merge one date's observations into an existing table, or into an empty one
/// when no table exists yet.
///
/// A date that already has a column replaces that column instead of adding a
/// second one. Zip codes new today are back-filled with `NA`, and known zip
/// codes missing today get `NA` for the date.
///
/// # Errors
///
/// Returns [`TableError::Inconsistent`] when any row does not end up with one
/// value per date column. Nothing should be written in that case.
pub fn merge(
    existing: Option<&TimeSeriesTable>,
    date: &DateLabel,
    observations: &[Observation],
) -> Result<MergeOutcome, TableError> {
    let (mut dates, existing_rows) = match existing {
        Some(table) => (table.dates.clone(), table.rows.as_slice()),
        None => (Vec::new(), &[][..]),
    };

    let overwrite = dates.contains(date);
    let prior_dates = dates.len() - usize::from(overwrite);
    let expected = prior_dates + 1;

    let mut rows: HashMap<ZipCode, Vec<CaseValue>> = existing_rows
        .iter()
        .map(|(zip, values)| {
            let mut values = values.clone();
            if overwrite {
                values.pop();
            }
            (zip.clone(), values)
        })
        .collect();

    let mut seen = HashSet::new();
    let mut new_zips = Vec::new();
    let mut duplicate_zips = Vec::new();

    for observation in observations {
        let zip = &observation.zip;
        let value = observation.value.clone();

        if seen.contains(zip) {
            if let Some(slot) = rows.get_mut(zip).and_then(|values| values.last_mut()) {
                *slot = value;
            }
            if !duplicate_zips.contains(zip) {
                duplicate_zips.push(zip.clone());
            }
            continue;
        }
        seen.insert(zip.clone());

        if let Some(values) = rows.get_mut(zip) {
            values.push(value);
        } else {
            let mut values = vec![CaseValue::Na; prior_dates];
            values.push(value);
            rows.insert(zip.clone(), values);
            new_zips.push(zip.clone());
        }
    }

    let mut missing_zips = Vec::new();
    for (zip, values) in &mut rows {
        if !seen.contains(zip) {
            missing_zips.push(zip.clone());
        }
        if values.len() < expected {
            values.push(CaseValue::Na);
        }
    }

    if !overwrite {
        dates.push(date.clone());
    }
    let table = TimeSeriesTable::from_parts(dates, rows.into_iter().collect());

    if let Some((zip, values)) = table
        .rows
        .iter()
        .find(|(_zip, values)| values.len() != expected)
    {
        return Err(TableError::Inconsistent {
            zip: zip.clone(),
            expected,
            found: values.len(),
        });
    }

    missing_zips.sort_by_cached_key(ZipCode::quoted);

    Ok(MergeOutcome {
        table,
        mode: if overwrite {
            MergeMode::Overwrite
        } else {
            MergeMode::Append
        },
        new_zips,
        missing_zips,
        duplicate_zips,
    })
}

/// Encode one record without its terminator.
fn csv_line<I, T>(style: QuoteStyle, fields: I) -> Result<String, TableError>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .quote_style(style)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    let bytes = writer
        .into_inner()
        .map_err(|err| TableError::Csv(err.to_string()))?;
    let mut line = String::from_utf8(bytes).map_err(|err| TableError::Csv(err.to_string()))?;
    if line.ends_with('\n') {
        line.pop();
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(label: &str) -> DateLabel {
        DateLabel(label.to_owned())
    }

    fn zip(code: &str) -> ZipCode {
        ZipCode(code.to_owned())
    }

    fn assert_rectangular(table: &TimeSeriesTable) {
        for (key, values) in table.rows() {
            assert_eq!(
                values.len(),
                table.dates().len(),
                "row {key} is not aligned with the header"
            );
        }
    }

    #[test]
    fn first_run_then_append() {
        let first = merge(
            None,
            &date("04/16/2020"),
            &[
                Observation::new("68123", CaseValue::Count(5)),
                Observation::new("68124", CaseValue::Na),
            ],
        )
        .expect("first merge");
        assert_eq!(first.mode, MergeMode::Append);
        assert_eq!(
            first.table.to_csv().expect("encode"),
            ",\"04/16/2020\"\n\"68123\",5\n\"68124\",NA\n"
        );

        let second = merge(
            Some(&first.table),
            &date("04/17/2020"),
            &[Observation::new("68123", CaseValue::Count(7))],
        )
        .expect("second merge");
        assert_eq!(
            second.table.to_csv().expect("encode"),
            ",\"04/16/2020\",\"04/17/2020\"\n\"68123\",5,7\n\"68124\",NA,NA\n"
        );
        assert_eq!(second.missing_zips, vec![zip("68124")]);
        assert_rectangular(&second.table);
    }

    #[test]
    fn same_day_rerun_replaces_last_column() {
        let table = TimeSeriesTable::parse(
            ",\"04/16/2020\",\"04/17/2020\"\n\"68123\",5,7\n\"68124\",1,2\n",
        )
        .expect("parse");

        let outcome = merge(
            Some(&table),
            &date("04/17/2020"),
            &[
                Observation::new("68123", CaseValue::Count(9)),
                Observation::new("68124", CaseValue::Count(3)),
            ],
        )
        .expect("overwrite merge");

        assert_eq!(outcome.mode, MergeMode::Overwrite);
        assert_eq!(outcome.table.dates().len(), 2);
        assert_eq!(outcome.table.rows().len(), 2);
        assert_eq!(
            outcome.table.row(&zip("68123")),
            Some(&[CaseValue::Count(5), CaseValue::Count(9)][..])
        );
        assert_eq!(
            outcome.table.row(&zip("68124")),
            Some(&[CaseValue::Count(1), CaseValue::Count(3)][..])
        );
    }

    #[test]
    fn new_zip_is_backfilled_with_na() {
        let table = TimeSeriesTable::parse(",\"04/15/2020\",\"04/16/2020\"\n\"68123\",1,2\n")
            .expect("parse");

        let outcome = merge(
            Some(&table),
            &date("04/17/2020"),
            &[
                Observation::new("68123", CaseValue::Count(3)),
                Observation::new("68028", CaseValue::Count(4)),
            ],
        )
        .expect("merge");

        assert_eq!(outcome.new_zips, vec![zip("68028")]);
        assert_eq!(
            outcome.table.row(&zip("68028")),
            Some(&[CaseValue::Na, CaseValue::Na, CaseValue::Count(4)][..])
        );
        assert_rectangular(&outcome.table);
    }

    #[test]
    fn new_zip_on_overwrite_is_backfilled_for_prior_dates_only() {
        let table = TimeSeriesTable::parse(",\"04/16/2020\",\"04/17/2020\"\n\"68123\",1,2\n")
            .expect("parse");

        let outcome = merge(
            Some(&table),
            &date("04/17/2020"),
            &[Observation::new("68999", CaseValue::Count(8))],
        )
        .expect("merge");

        assert_eq!(
            outcome.table.row(&zip("68999")),
            Some(&[CaseValue::Na, CaseValue::Count(8)][..])
        );
        assert_eq!(
            outcome.table.row(&zip("68123")),
            Some(&[CaseValue::Count(1), CaseValue::Na][..])
        );
    }

    #[test]
    fn rows_sorted_by_quoted_zip_with_leading_zeros_kept() {
        let outcome = merge(
            None,
            &date("04/16/2020"),
            &[
                Observation::new("19104", CaseValue::Count(1)),
                Observation::new("01002", CaseValue::Count(2)),
                Observation::new("1900", CaseValue::Count(3)),
            ],
        )
        .expect("merge");

        let keys: Vec<&str> = outcome
            .table
            .rows()
            .iter()
            .map(|(key, _values)| key.0.as_str())
            .collect();
        assert_eq!(keys, vec!["01002", "1900", "19104"]);
    }

    #[test]
    fn duplicate_observation_keeps_last_value() {
        let table = TimeSeriesTable::parse(",\"04/16/2020\"\n\"68123\",1\n").expect("parse");

        let outcome = merge(
            Some(&table),
            &date("04/17/2020"),
            &[
                Observation::new("68123", CaseValue::Count(4)),
                Observation::new("68123", CaseValue::Count(6)),
            ],
        )
        .expect("merge");

        assert_eq!(outcome.duplicate_zips, vec![zip("68123")]);
        assert_eq!(
            outcome.table.row(&zip("68123")),
            Some(&[CaseValue::Count(1), CaseValue::Count(6)][..])
        );
    }

    #[test]
    fn malformed_row_fails_consistency_check() {
        let table = TimeSeriesTable::parse(",\"04/15/2020\",\"04/16/2020\"\n\"68123\",1,2\n\"68124\",1\n")
            .expect("ragged tables still parse");

        let err = merge(
            Some(&table),
            &date("04/17/2020"),
            &[Observation::new("68123", CaseValue::Count(3))],
        )
        .expect_err("short row must be rejected");

        assert_eq!(
            err,
            TableError::Inconsistent {
                zip: zip("68124"),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn overlong_row_fails_consistency_check() {
        let table = TimeSeriesTable::from_parts(
            vec![date("04/16/2020")],
            vec![(
                zip("68123"),
                vec![CaseValue::Count(1), CaseValue::Count(2), CaseValue::Count(3)],
            )],
        );

        let err = merge(Some(&table), &date("04/17/2020"), &[])
            .expect_err("long row must be rejected");
        assert_eq!(
            err,
            TableError::Inconsistent {
                zip: zip("68123"),
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn text_values_survive_a_round_trip() {
        let outcome = merge(
            None,
            &date("04/16/2020"),
            &[
                Observation::new("85001", CaseValue::Text("1-5".to_owned())),
                Observation::new("85002", CaseValue::Text("a, b".to_owned())),
                Observation::new("85003", CaseValue::Text(" <5 ".to_owned())),
                Observation::new("85004", CaseValue::Text("say \"few\"".to_owned())),
            ],
        )
        .expect("merge");

        let reread = TimeSeriesTable::parse(&outcome.table.to_csv().expect("encode")).expect("parse");
        assert_eq!(reread, outcome.table);
    }

    #[test]
    fn rejects_header_without_placeholder() {
        assert_eq!(
            TimeSeriesTable::parse("\"04/16/2020\"\n"),
            Err(TableError::MalformedHeader)
        );
    }

    #[test]
    fn empty_text_is_empty_table() {
        let table = TimeSeriesTable::parse("").expect("parse");
        assert!(table.dates().is_empty());
        assert!(table.rows().is_empty());
    }

    #[test]
    fn zip_with_quote_survives_rewrite() {
        let first = merge(
            None,
            &date("04/16/2020"),
            &[Observation::new("68\"123", CaseValue::Count(5))],
        )
        .expect("first merge");
        let text = first.table.to_csv().expect("encode");
        assert_eq!(text, ",\"04/16/2020\"\n\"68\"\"123\",5\n");

        let reread = TimeSeriesTable::parse(&text).expect("parse");
        assert_eq!(reread, first.table);

        let second = merge(
            Some(&reread),
            &date("04/17/2020"),
            &[Observation::new("68\"123", CaseValue::Count(6))],
        )
        .expect("second merge");
        assert_eq!(
            second.table.row(&zip("68\"123")),
            Some(&[CaseValue::Count(5), CaseValue::Count(6)][..])
        );
    }

    #[test]
    fn windows_line_endings_and_blank_lines_are_read() {
        let table = TimeSeriesTable::parse(",\"04/16/2020\"\r\n\"68123\",5\r\n\r\n")
            .expect("parse");
        assert_eq!(table.dates(), &[date("04/16/2020")][..]);
        assert_eq!(table.row(&zip("68123")), Some(&[CaseValue::Count(5)][..]));
    }
}
