//! Derived keys: named key functions and declarative key expressions.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::criteria::KeyFn;
use crate::error::{BoxError, LinkError};
use crate::table::Row;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Key expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyTransform {
    #[default]
    None,
    Trim,
    Lower,
    Upper,
    Digits,
}

pub fn apply_key_transform(raw: &str, transform: KeyTransform) -> String {
    match transform {
        KeyTransform::None => raw.to_string(),
        KeyTransform::Trim => raw.trim().to_string(),
        KeyTransform::Lower => raw.to_lowercase(),
        KeyTransform::Upper => raw.to_uppercase(),
        KeyTransform::Digits => raw.chars().filter(|c| c.is_ascii_digit()).collect(),
    }
}

/// One piece of a key expression: a field, transformed, optionally truncated
/// to its first `take` characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPart {
    pub field: String,
    #[serde(default)]
    pub take: Option<usize>,
    #[serde(default)]
    pub transform: KeyTransform,
}

impl KeyPart {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            take: None,
            transform: KeyTransform::None,
        }
    }

    pub fn take(mut self, n: usize) -> Self {
        self.take = Some(n);
        self
    }

    pub fn transform(mut self, transform: KeyTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// Concatenation of key parts, e.g. first initial + last initial.
///
/// A null in any part yields a null key, which never matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExpr {
    pub parts: Vec<KeyPart>,
}

impl KeyExpr {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    pub fn evaluate(&self, row: &Row<'_>) -> Result<Value, BoxError> {
        let mut key = String::new();
        for part in &self.parts {
            let value = row
                .get(&part.field)
                .ok_or_else(|| LinkError::MissingColumn(part.field.clone()))?;
            let Some(text) = value.to_text() else {
                return Ok(Value::Null);
            };
            let text = apply_key_transform(&text, part.transform);
            match part.take {
                Some(n) => key.extend(text.chars().take(n)),
                None => key.push_str(&text),
            }
        }
        Ok(Value::Text(key))
    }

    pub fn into_key_fn(self) -> KeyFn {
        Arc::new(move |row: &Row<'_>| self.evaluate(row))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Named key functions that rule descriptors can refer to.
#[derive(Clone, Default)]
pub struct KeyFunctions {
    functions: FxHashMap<String, KeyFn>,
}

impl KeyFunctions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&Row<'_>) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<&KeyFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for KeyFunctions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyFunctions")
            .field("names", &self.names())
            .finish()
    }
}
