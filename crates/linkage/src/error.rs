use std::fmt;

use crate::value::Value;

/// Boxed error returned by user-supplied key functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Which input table an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum LinkError {
    /// Key field absent from a table handed to the matcher.
    MissingKeyField { side: Side, field: String },
    /// Key field holds a null.
    NullKey { side: Side, field: String, row: usize },
    /// Key value appears more than once.
    DuplicateKey { side: Side, field: String, value: Value },
    /// Table built with the same column name twice.
    DuplicateColumn(String),
    /// Row length does not match the column count.
    RowWidth { row: usize, expected: usize, found: usize },
    /// Malformed match criterion. Raised before any matching starts.
    InvalidCriterion { rule: usize, type_id: Value, reason: String },
    /// A field referenced by a criterion is missing from one side.
    MissingField { side: Side, field: String },
    /// A column referenced by name is missing from a table.
    MissingColumn(String),
    /// Suffix resolution produced a name that is already taken.
    ColumnCollision { column: String, resolved: String },
    /// A derived-key function failed. The original error is kept as `source`.
    KeyFunction { type_id: Value, source: BoxError },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error.
    ConfigValidation(String),
    /// IO or CSV decoding error.
    Io(String),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeyField { side, field } => {
                write!(f, "field {field} not present in {side} data")
            }
            Self::NullKey { side, field, row } => {
                write!(f, "{side} data: key field '{field}' is null at row {row}")
            }
            Self::DuplicateKey { side, field, value } => {
                write!(f, "{side} data: key field '{field}' has duplicate value {value}")
            }
            Self::DuplicateColumn(name) => write!(f, "duplicate column '{name}'"),
            Self::RowWidth { row, expected, found } => {
                write!(f, "row {row} has {found} values, expected {expected}")
            }
            Self::InvalidCriterion { rule, type_id, reason } => {
                write!(f, "invalid match criterion #{rule} (type_id {type_id}): {reason}")
            }
            Self::MissingField { side, field } => {
                write!(f, "field '{field}' not present in {side} data")
            }
            Self::MissingColumn(name) => write!(f, "missing column '{name}'"),
            Self::ColumnCollision { column, resolved } => {
                write!(
                    f,
                    "column '{column}' resolves to '{resolved}', which is already taken; choose other suffixes"
                )
            }
            Self::KeyFunction { type_id, source } => {
                write!(f, "key function for type_id {type_id} failed: {source}")
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KeyFunction { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
