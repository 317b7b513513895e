use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::RawRow;

/// Rows of string cells, in the order the service returned them.
///
/// NULL or absent cells are stored as empty strings. No column names or
/// types are kept; when Athena echoes the header as the first row of a
/// `SELECT`, that row is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTable {
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Flatten raw service rows, mapping missing cells to `""`.
    pub fn from_raw_rows(raw: Vec<RawRow>) -> Self {
        let rows = raw
            .into_iter()
            .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vec<String>> {
        self.rows.iter()
    }
}

impl From<Vec<Vec<String>>> for ResultTable {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }
}

impl IntoIterator for ResultTable {
    type Item = Vec<String>;
    type IntoIter = std::vec::IntoIter<Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Tab-separated, one row per line.
impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            writeln!(f, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}
