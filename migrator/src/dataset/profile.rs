//! Pre-load statistics for a parsed table.

use std::collections::HashSet;
use std::fmt;

use crate::normalize::{is_missing, try_parse_decimal};

/// Inferred type of a column over its non-missing cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    /// Every cell is missing
    Empty,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
            ColumnType::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// Statistics for one column.
#[derive(Debug, Clone)]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
    pub missing: usize,
}

/// Statistics for a whole table, computed before duplicate removal.
#[derive(Debug, Clone)]
pub struct DatasetProfile {
    pub total_rows: usize,
    pub columns: Vec<ColumnProfile>,
    /// Rows identical to an earlier row across every column
    pub duplicate_rows: usize,
}

impl DatasetProfile {
    /// Profile `rows` laid out under `headers`.
    pub fn compute(headers: &[String], rows: &[Vec<String>]) -> Self {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let cells = rows.iter().map(|r| r.get(i).map_or("", String::as_str));
                profile_column(name, cells)
            })
            .collect();

        Self {
            total_rows: rows.len(),
            columns,
            duplicate_rows: count_duplicates(rows),
        }
    }

    /// Missing-value count for a column, if it exists.
    pub fn missing(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.name == column)
            .map(|c| c.missing)
    }
}

fn profile_column<'a>(name: &str, cells: impl Iterator<Item = &'a str>) -> ColumnProfile {
    let mut missing = 0;
    let mut all_int = true;
    let mut all_float = true;
    let mut all_bool = true;
    let mut seen = 0;

    for cell in cells {
        if is_missing(cell) {
            missing += 1;
            continue;
        }
        seen += 1;
        all_int = all_int && cell.trim().parse::<i64>().is_ok();
        all_float = all_float && try_parse_decimal(cell).is_ok();
        all_bool = all_bool && is_boolean(cell);
    }

    let column_type = if seen == 0 {
        ColumnType::Empty
    } else if all_int {
        ColumnType::Integer
    } else if all_float {
        ColumnType::Float
    } else if all_bool {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    };

    ColumnProfile {
        name: name.to_string(),
        column_type,
        missing,
    }
}

fn is_boolean(cell: &str) -> bool {
    matches!(
        cell.trim().to_lowercase().as_str(),
        "true" | "false"
    )
}

/// Cells a row is compared by for duplicate detection. Every missing
/// spelling (`""`, `NA`, `NaN`, ...) compares equal.
pub(crate) fn row_identity(row: &[String]) -> Vec<&str> {
    row.iter()
        .map(|cell| if is_missing(cell) { "" } else { cell.as_str() })
        .collect()
}

/// Count rows that repeat an earlier row.
pub fn count_duplicates(rows: &[Vec<String>]) -> usize {
    let mut seen: HashSet<Vec<&str>> = HashSet::with_capacity(rows.len());
    rows.iter().filter(|row| !seen.insert(row_identity(row))).count()
}
