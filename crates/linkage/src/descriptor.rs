//! Untyped rule descriptors, as written in config files, and their
//! resolution into typed [`MatchCriterion`] values.
//!
//! Resolution checks the whole list before returning, so a malformed rule
//! anywhere in the list stops the run before any matcher executes.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::criteria::{FieldPrecision, MatchCriterion, Method};
use crate::error::LinkError;
use crate::key::{KeyExpr, KeyFunctions, KeyPart};
use crate::value::Value;

/// One rule as written by a user.
///
/// `fields` stays loosely typed on purpose so that wrong shapes (a string
/// precision, a missing `field_name`) surface as rule validation errors that
/// name the rule, not as opaque parse errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriterionSpec {
    #[serde(default)]
    pub type_id: Value,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub fields: Option<Json>,
    /// Name of a registered key function.
    #[serde(default)]
    pub function: Option<String>,
    /// Inline key expression, used when no `function` is named.
    #[serde(default)]
    pub key: Option<Vec<KeyPart>>,
}

/// Resolve descriptors in order. The first malformed rule is reported with
/// its position and `type_id`.
pub fn resolve_criteria(
    specs: &[CriterionSpec],
    functions: &KeyFunctions,
) -> Result<Vec<MatchCriterion>, LinkError> {
    if specs.is_empty() {
        return Err(LinkError::InvalidCriterion {
            rule: 0,
            type_id: Value::Null,
            reason: "at least one match criterion is required".into(),
        });
    }
    specs
        .iter()
        .enumerate()
        .map(|(rule, spec)| resolve_one(rule, spec, functions))
        .collect()
}

fn resolve_one(
    rule: usize,
    spec: &CriterionSpec,
    functions: &KeyFunctions,
) -> Result<MatchCriterion, LinkError> {
    let invalid = |reason: String| LinkError::InvalidCriterion {
        rule,
        type_id: spec.type_id.clone(),
        reason,
    };

    let method_name = spec
        .method
        .as_deref()
        .ok_or_else(|| invalid("missing 'method'".into()))?;
    let method = Method::parse(method_name).ok_or_else(|| {
        invalid(format!(
            "unknown method '{method_name}' (expected exact, function or levenshtein)"
        ))
    })?;
    let type_id = spec.type_id.clone();

    let criterion = match method {
        Method::Exact => {
            let fields = spec
                .fields
                .as_ref()
                .ok_or_else(|| invalid("exact match requires 'fields'".into()))?;
            let list = fields
                .as_array()
                .ok_or_else(|| invalid("'fields' must be a list of field names".into()))?;
            let names = list
                .iter()
                .map(|f| {
                    f.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(format!("field name must be a string, got {f}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            MatchCriterion::ExactFields {
                type_id,
                fields: names,
            }
        }
        Method::Function => {
            let function = match (&spec.function, &spec.key) {
                (Some(name), _) => functions
                    .get(name)
                    .cloned()
                    .ok_or_else(|| invalid(format!("function '{name}' is not registered")))?,
                (None, Some(parts)) => {
                    if parts.is_empty() {
                        return Err(invalid("'key' expression must have at least one part".into()));
                    }
                    KeyExpr::new(parts.clone()).into_key_fn()
                }
                (None, None) => {
                    return Err(invalid("function match requires 'function' or 'key'".into()))
                }
            };
            MatchCriterion::DerivedKey { type_id, function }
        }
        Method::Levenshtein => {
            let fields = spec
                .fields
                .as_ref()
                .ok_or_else(|| invalid("levenshtein match requires 'fields'".into()))?;
            let list = fields.as_array().ok_or_else(|| {
                invalid("'fields' must be a list of {field_name, precision} entries".into())
            })?;
            let precisions = list
                .iter()
                .map(|entry| parse_precision(entry).map_err(&invalid))
                .collect::<Result<Vec<_>, _>>()?;
            MatchCriterion::EditDistance {
                type_id,
                fields: precisions,
            }
        }
    };

    criterion.validate(rule)?;
    Ok(criterion)
}

fn parse_precision(entry: &Json) -> Result<FieldPrecision, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| format!("expected {{field_name, precision}}, got {entry}"))?;
    let field = obj
        .get("field_name")
        .ok_or_else(|| "levenshtein field is missing 'field_name'".to_string())?
        .as_str()
        .ok_or_else(|| "'field_name' must be a string".to_string())?;
    let precision = obj
        .get("precision")
        .ok_or_else(|| format!("field '{field}' is missing 'precision'"))?;
    let max_distance = precision
        .as_u64()
        .and_then(|p| u32::try_from(p).ok())
        .ok_or_else(|| {
            format!("precision for '{field}' must be a non-negative integer, got {precision}")
        })?;
    Ok(FieldPrecision::new(field, max_distance))
}
