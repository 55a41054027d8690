//! A small row-oriented table with typed cells.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text values read as null.
const NULL_MARKERS: &[&str] = &["", "null", "NULL", "Null", "NA", "N/A", "NaN", "nan", "None"];

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// A missing value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A whole number.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// Anything else.
    Str(String),
}

impl Cell {
    /// Infers the cell type of a raw text field.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if NULL_MARKERS.contains(&trimmed) {
            return Self::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return Self::Float(f);
            }
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => Self::Str(trimmed.to_string()),
        }
    }

    /// Returns true for [`Cell::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the numeric value, if the cell holds a number or a boolean.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Null | Self::Str(_) => None,
        }
    }

    /// Returns the name of the cell's type, as used in violation reports.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

/// Errors raised while building or reading a [`DataFrame`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The input has no header line.
    #[error("input has no header row")]
    MissingHeader,

    /// The header names the same column twice.
    #[error("duplicate column '{0}' in header")]
    DuplicateColumn(String),

    /// A row has the wrong number of fields.
    #[error("line {line}: expected {expected} fields, found {found}")]
    RaggedRow {
        /// One-based line number.
        line: usize,
        /// Number of header columns.
        expected: usize,
        /// Number of fields on the line.
        found: usize,
    },

    /// A quoted field was never closed.
    #[error("line {line}: unterminated quoted field")]
    UnterminatedQuote {
        /// One-based line number.
        line: usize,
    },

    /// A column lookup failed.
    #[error("column '{0}' not found")]
    UnknownColumn(String),

    /// A cell that must be numeric is not.
    #[error("column '{column}' row {row}: expected a number, found {found}")]
    NotNumeric {
        /// The column name.
        column: String,
        /// Zero-based row index.
        row: usize,
        /// The cell type that was found.
        found: String,
    },
}

/// A table of typed cells with named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFrame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl DataFrame {
    /// Creates a frame, checking every row has one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, FrameError> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(FrameError::DuplicateColumn(name.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(FrameError::RaggedRow {
                    line: i + 2,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Parses comma-separated text with a header line.
    ///
    /// Fields may be double-quoted; `""` inside quotes is a literal quote.
    /// Blank lines are skipped. Each field is typed with [`Cell::parse`],
    /// except quoted fields, which are always strings unless empty.
    pub fn from_csv_str(text: &str) -> Result<Self, FrameError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (header_idx, header) = lines.next().ok_or(FrameError::MissingHeader)?;
        let columns: Vec<String> = split_record(header, header_idx + 1)?
            .into_iter()
            .map(|(field, _)| field.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let fields = split_record(line, idx + 1)?;
            if fields.len() != columns.len() {
                return Err(FrameError::RaggedRow {
                    line: idx + 1,
                    expected: columns.len(),
                    found: fields.len(),
                });
            }
            let row = fields
                .into_iter()
                .map(|(field, quoted)| {
                    if quoted && !field.is_empty() {
                        Cell::Str(field)
                    } else {
                        Cell::parse(&field)
                    }
                })
                .collect();
            rows.push(row);
        }

        Self::new(columns, rows)
    }

    /// Renders the frame as comma-separated text with a header line.
    #[must_use]
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, self.columns.iter().map(String::as_str));
        for row in &self.rows {
            let rendered: Vec<String> = row.iter().map(ToString::to_string).collect();
            push_record(&mut out, rendered.iter().map(String::as_str));
        }
        out
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterates over the cells of one column.
    pub fn column(&self, name: &str) -> Result<impl Iterator<Item = &Cell> + '_, FrameError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Extracts one column as numbers; nulls and strings are errors.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>, FrameError> {
        self.column(name)?
            .enumerate()
            .map(|(row, cell)| {
                cell.as_f64().ok_or_else(|| FrameError::NotNumeric {
                    column: name.to_string(),
                    row,
                    found: cell.type_name().to_string(),
                })
            })
            .collect()
    }

    /// Extracts several columns as a row-major numeric matrix.
    pub fn numeric_matrix(&self, names: &[String]) -> Result<Vec<Vec<f64>>, FrameError> {
        let columns = names
            .iter()
            .map(|name| self.numeric_column(name))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((0..self.rows.len())
            .map(|i| columns.iter().map(|col| col[i]).collect())
            .collect())
    }
}

fn split_record(line: &str, line_no: usize) -> Result<Vec<(String, bool)>, FrameError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                quoted = true;
            }
            ',' if !in_quotes => {
                fields.push((std::mem::take(&mut field), quoted));
                quoted = false;
            }
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(FrameError::UnterminatedQuote { line: line_no });
    }
    fields.push((field, quoted));
    Ok(fields)
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cell_parse() {
        assert_eq!(Cell::parse("42"), Cell::Int(42));
        assert_eq!(Cell::parse(" 4.5 "), Cell::Float(4.5));
        assert_eq!(Cell::parse("TRUE"), Cell::Bool(true));
        assert_eq!(Cell::parse("Lisbon"), Cell::Str("Lisbon".to_string()));
        assert_eq!(Cell::parse(""), Cell::Null);
        assert_eq!(Cell::parse("NA"), Cell::Null);
        assert_eq!(Cell::parse("nan"), Cell::Null);
    }

    #[test]
    fn test_from_csv_with_nulls_and_quotes() {
        let frame = DataFrame::from_csv_str(
            "name,age,city\n\"Smith, J\",30,Porto\nDoe,,\"Faro\"\n\n",
        )
        .unwrap();

        assert_eq!(frame.columns(), &["name", "age", "city"]);
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.rows()[0][0], Cell::Str("Smith, J".to_string()));
        assert_eq!(frame.rows()[1][1], Cell::Null);
        assert_eq!(frame.rows()[1][2], Cell::Str("Faro".to_string()));
    }

    #[test]
    fn test_quoted_number_stays_string() {
        let frame = DataFrame::from_csv_str("zip\n\"01234\"\n").unwrap();
        assert_eq!(frame.rows()[0][0], Cell::Str("01234".to_string()));
    }

    #[test]
    fn test_ragged_row() {
        let err = DataFrame::from_csv_str("a,b\n1,2\n3\n").unwrap_err();
        assert_eq!(
            err,
            FrameError::RaggedRow {
                line: 3,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_duplicate_header() {
        let err = DataFrame::from_csv_str("a,a\n1,2\n").unwrap_err();
        assert_eq!(err, FrameError::DuplicateColumn("a".to_string()));
    }

    #[test]
    fn test_unterminated_quote() {
        let err = DataFrame::from_csv_str("a\n\"open\n").unwrap_err();
        assert_eq!(err, FrameError::UnterminatedQuote { line: 2 });
    }

    #[test]
    fn test_csv_output_escapes() {
        let frame = DataFrame::new(
            vec!["label".to_string(), "x".to_string()],
            vec![vec![Cell::Str("a, \"b\"".to_string()), Cell::Float(0.25)]],
        )
        .unwrap();

        assert_eq!(frame.to_csv_string(), "label,x\n\"a, \"\"b\"\"\",0.25\n");
        let reparsed = DataFrame::from_csv_str(&frame.to_csv_string()).unwrap();
        assert_eq!(reparsed, frame);
    }

    #[test]
    fn test_numeric_matrix() {
        let frame = DataFrame::from_csv_str("a,b,c\n1,2.5,x\n3,4,y\n").unwrap();
        let matrix = frame
            .numeric_matrix(&["b".to_string(), "a".to_string()])
            .unwrap();
        assert_eq!(matrix, vec![vec![2.5, 1.0], vec![4.0, 3.0]]);

        let err = frame.numeric_column("c").unwrap_err();
        assert!(matches!(err, FrameError::NotNumeric { row: 0, .. }));
        assert!(matches!(frame.numeric_column("z"), Err(FrameError::UnknownColumn(_))));
    }
}
