// Header-addressed tables for the loosely-shaped tracking splits.
//
// The shot-tracking and hustle sources vary in which columns they carry, so
// they stay untyped until a calculator asks for a specific column.

use csv::StringRecord;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("column `{column}` not present")]
    MissingColumn { column: String },

    #[error("column `{column}` holds non-numeric value `{value}`")]
    NotNumeric { column: String, value: String },
}

/// An in-memory CSV table. An empty table (no header, no rows) stands for an
/// absent source.
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl Table {
    pub fn empty() -> Self {
        Table::default()
    }

    pub fn from_parts(headers: StringRecord, rows: Vec<StringRecord>) -> Self {
        Table { headers, rows }
    }

    /// Build a table from string slices. Mostly useful for tests and fixtures.
    pub fn from_rows(headers: &[&str], rows: &[&[&str]]) -> Self {
        Table {
            headers: StringRecord::from(headers.to_vec()),
            rows: rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        }
    }

    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(rdr);
        let headers = reader.headers()?.clone();
        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        Ok(Table { headers, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    fn column_index(&self, column: &str) -> Result<usize, TableError> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| TableError::MissingColumn {
                column: column.to_string(),
            })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowRef<'_>> {
        self.rows.iter().map(move |record| RowRef {
            table: self,
            record,
        })
    }

    pub fn first(&self) -> Option<RowRef<'_>> {
        self.rows().next()
    }

    /// First row whose `column` equals `value` (after trimming).
    pub fn find(&self, column: &str, value: &str) -> Result<Option<RowRef<'_>>, TableError> {
        if self.is_empty() {
            return Ok(None);
        }
        let idx = self.column_index(column)?;
        Ok(self
            .rows
            .iter()
            .find(|r| r.get(idx).map(str::trim) == Some(value))
            .map(|record| RowRef {
                table: self,
                record,
            }))
    }

    /// Sum of a numeric column. Blank cells are skipped.
    pub fn sum(&self, column: &str) -> Result<f64, TableError> {
        let mut total = 0.0;
        for row in self.rows() {
            if let Some(v) = row.number(column)? {
                total += v;
            }
        }
        Ok(total)
    }

    /// A table holding only the row at `index`, with the same header.
    pub(crate) fn single_row(&self, index: usize) -> Table {
        Table {
            headers: self.headers.clone(),
            rows: self.rows.get(index).cloned().into_iter().collect(),
        }
    }
}

/// A borrowed row with header-based column access.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    record: &'a StringRecord,
}

impl<'a> RowRef<'a> {
    pub fn text(&self, column: &str) -> Result<&'a str, TableError> {
        let idx = self.table.column_index(column)?;
        Ok(self.record.get(idx).map(str::trim).unwrap_or(""))
    }

    /// Numeric cell. Blank, `NaN` and `None` cells are `Ok(None)`; anything
    /// else that fails to parse is an error.
    pub fn number(&self, column: &str) -> Result<Option<f64>, TableError> {
        let raw = self.text(column)?;
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw == "None" {
            return Ok(None);
        }
        let value: f64 = raw.parse().map_err(|_| TableError::NotNumeric {
            column: column.to_string(),
            value: raw.to_string(),
        })?;
        Ok(value.is_finite().then_some(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
