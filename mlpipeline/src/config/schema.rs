//! The data schema document.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Whole numbers.
    Int,
    /// Any number; whole numbers are accepted too.
    Float,
    /// Free text; any non-null value is accepted.
    String,
    /// `true` / `false`.
    Bool,
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" | "int64" | "integer" => Ok(Self::Int),
            "float" | "float32" | "float64" | "double" | "number" => Ok(Self::Float),
            "string" | "str" | "object" | "text" | "category" => Ok(Self::String),
            "bool" | "boolean" => Ok(Self::Bool),
            other => Err(format!("unknown column type '{other}'")),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// The expectations for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// The declared type.
    pub dtype: ColumnType,
    /// Whether null values are allowed.
    pub nullable: bool,
}

/// The validated schema: expected columns and the target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaSpec {
    columns: BTreeMap<String, ColumnSpec>,
    target_column: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColumn {
    Short(String),
    Full {
        #[serde(rename = "type")]
        dtype: String,
        #[serde(default)]
        nullable: bool,
    },
}

/// The schema document as written on disk.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SchemaDocument {
    columns: BTreeMap<String, RawColumn>,
    #[serde(default)]
    target_column: Option<String>,
}

impl SchemaSpec {
    /// Creates a schema from already-typed columns.
    pub fn new(
        columns: BTreeMap<String, ColumnSpec>,
        target_column: Option<String>,
    ) -> Result<Self, ConfigError> {
        if columns.is_empty() {
            return Err(ConfigError::invalid("schema", "columns", "at least one column is required"));
        }
        if let Some(target) = &target_column {
            if !columns.contains_key(target) {
                return Err(ConfigError::invalid(
                    "schema",
                    "target_column",
                    format!("'{target}' is not a declared column"),
                ));
            }
        }
        Ok(Self {
            columns,
            target_column,
        })
    }

    pub(crate) fn from_document(doc: SchemaDocument) -> Result<Self, ConfigError> {
        let mut columns = BTreeMap::new();
        for (name, raw) in doc.columns {
            let (dtype, nullable) = match raw {
                RawColumn::Short(dtype) => (dtype, false),
                RawColumn::Full { dtype, nullable } => (dtype, nullable),
            };
            let dtype = dtype
                .parse::<ColumnType>()
                .map_err(|reason| ConfigError::invalid("schema", name.as_str(), reason))?;
            columns.insert(name, ColumnSpec { dtype, nullable });
        }
        Self::new(columns, doc.target_column)
    }

    /// Returns the declared columns, sorted by name.
    #[must_use]
    pub fn columns(&self) -> &BTreeMap<String, ColumnSpec> {
        &self.columns
    }

    /// Looks up one column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.get(name)
    }

    /// Returns the target column, if declared.
    #[must_use]
    pub fn target_column(&self) -> Option<&str> {
        self.target_column.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<SchemaSpec, ConfigError> {
        let doc: SchemaDocument = serde_yaml::from_str(yaml).unwrap();
        SchemaSpec::from_document(doc)
    }

    #[test]
    fn test_short_and_full_column_forms() {
        let schema = parse(
            "columns:\n  age: { type: int64, nullable: true }\n  city: object\ntarget_column: age\n",
        )
        .unwrap();

        assert_eq!(
            schema.column("age"),
            Some(&ColumnSpec {
                dtype: ColumnType::Int,
                nullable: true
            })
        );
        assert_eq!(
            schema.column("city"),
            Some(&ColumnSpec {
                dtype: ColumnType::String,
                nullable: false
            })
        );
        assert_eq!(schema.target_column(), Some("age"));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = parse("columns:\n  age: complex128\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "age"));
    }

    #[test]
    fn test_target_must_be_declared() {
        let err = parse("columns:\n  age: int\ntarget_column: quality\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "target_column"));
    }

    #[test]
    fn test_empty_columns_rejected() {
        let err = parse("columns: {}\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!("float64".parse::<ColumnType>(), Ok(ColumnType::Float));
        assert_eq!("Boolean".parse::<ColumnType>(), Ok(ColumnType::Bool));
        assert_eq!("str".parse::<ColumnType>(), Ok(ColumnType::String));
    }
}
