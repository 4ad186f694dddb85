use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BoxError, LinkError};
use crate::table::Row;
use crate::value::Value;

/// Key function for derived-key matching: record in, scalar out.
pub type KeyFn = Arc<dyn Fn(&Row<'_>) -> Result<Value, BoxError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Exact,
    Function,
    Levenshtein,
}

impl Method {
    /// Parse a method name as written in rule descriptors.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "exact" | "exact_match" => Some(Self::Exact),
            "function" | "derived_key" => Some(Self::Function),
            "levenshtein" | "edit_distance" => Some(Self::Levenshtein),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Function => "function",
            Self::Levenshtein => "levenshtein",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Criterion
// ---------------------------------------------------------------------------

/// Maximum edit distance allowed on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPrecision {
    pub field: String,
    pub max_distance: u32,
}

impl FieldPrecision {
    pub fn new(field: impl Into<String>, max_distance: u32) -> Self {
        Self {
            field: field.into(),
            max_distance,
        }
    }
}

/// One matching rule. `type_id` orders rules for deduplication: lower wins.
#[derive(Clone)]
pub enum MatchCriterion {
    ExactFields {
        type_id: Value,
        fields: Vec<String>,
    },
    DerivedKey {
        type_id: Value,
        function: KeyFn,
    },
    EditDistance {
        type_id: Value,
        fields: Vec<FieldPrecision>,
    },
}

impl MatchCriterion {
    pub fn exact<I, S>(type_id: impl Into<Value>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ExactFields {
            type_id: type_id.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn derived<F>(type_id: impl Into<Value>, function: F) -> Self
    where
        F: Fn(&Row<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self::DerivedKey {
            type_id: type_id.into(),
            function: Arc::new(function),
        }
    }

    pub fn edit_distance<I, S>(type_id: impl Into<Value>, fields: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self::EditDistance {
            type_id: type_id.into(),
            fields: fields
                .into_iter()
                .map(|(f, d)| FieldPrecision::new(f, d))
                .collect(),
        }
    }

    pub fn type_id(&self) -> &Value {
        match self {
            Self::ExactFields { type_id, .. }
            | Self::DerivedKey { type_id, .. }
            | Self::EditDistance { type_id, .. } => type_id,
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Self::ExactFields { .. } => Method::Exact,
            Self::DerivedKey { .. } => Method::Function,
            Self::EditDistance { .. } => Method::Levenshtein,
        }
    }

    /// Structural checks that do not need the tables.
    pub fn validate(&self, rule: usize) -> Result<(), LinkError> {
        let invalid = |reason: &str| LinkError::InvalidCriterion {
            rule,
            type_id: self.type_id().clone(),
            reason: reason.into(),
        };
        match self {
            Self::ExactFields { fields, .. } => {
                if fields.is_empty() {
                    return Err(invalid("exact match requires at least one field"));
                }
                if fields.iter().any(|f| f.is_empty()) {
                    return Err(invalid("field names must not be empty"));
                }
            }
            Self::DerivedKey { .. } => {}
            Self::EditDistance { fields, .. } => {
                if fields.is_empty() {
                    return Err(invalid("levenshtein match requires at least one field"));
                }
                if fields.iter().any(|f| f.field.is_empty()) {
                    return Err(invalid("field names must not be empty"));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MatchCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactFields { type_id, fields } => f
                .debug_struct("ExactFields")
                .field("type_id", type_id)
                .field("fields", fields)
                .finish(),
            Self::DerivedKey { type_id, .. } => f
                .debug_struct("DerivedKey")
                .field("type_id", type_id)
                .finish_non_exhaustive(),
            Self::EditDistance { type_id, fields } => f
                .debug_struct("EditDistance")
                .field("type_id", type_id)
                .field("fields", fields)
                .finish(),
        }
    }
}

/// Check every rule before any of them runs.
pub fn validate_criteria(criteria: &[MatchCriterion]) -> Result<(), LinkError> {
    if criteria.is_empty() {
        return Err(LinkError::InvalidCriterion {
            rule: 0,
            type_id: Value::Null,
            reason: "at least one match criterion is required".into(),
        });
    }
    for (rule, criterion) in criteria.iter().enumerate() {
        criterion.validate(rule)?;
    }
    Ok(())
}
