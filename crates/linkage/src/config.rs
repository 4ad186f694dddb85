use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::columns::Suffixes;
use crate::criteria::MatchCriterion;
use crate::descriptor::{resolve_criteria, CriterionSpec};
use crate::error::LinkError;
use crate::key::KeyFunctions;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    /// Suffixes for column names present on both sides, left then right.
    #[serde(default)]
    pub suffixes: Option<[String; 2]>,
    pub left: SourceConfig,
    pub right: SourceConfig,
    #[serde(default)]
    pub rules: Vec<CriterionSpec>,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One input table: a CSV or JSON file and its unique key field.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    pub key: String,
}

impl SourceConfig {
    /// `file`, resolved against `base` when relative.
    pub fn path(&self, base: &Path) -> PathBuf {
        let file = Path::new(&self.file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            base.join(file)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl LinkConfig {
    pub fn from_toml(input: &str) -> Result<Self, LinkError> {
        let config: LinkConfig =
            toml::from_str(input).map_err(|e| LinkError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LinkError> {
        for (side, source) in [("left", &self.left), ("right", &self.right)] {
            if source.file.trim().is_empty() {
                return Err(LinkError::ConfigValidation(format!("{side}.file must not be empty")));
            }
            if source.key.trim().is_empty() {
                return Err(LinkError::ConfigValidation(format!("{side}.key must not be empty")));
            }
        }

        if let Some([left, right]) = &self.suffixes {
            if left == right {
                return Err(LinkError::ConfigValidation(format!(
                    "suffixes must differ, got '{left}' twice"
                )));
            }
        }

        if self.rules.is_empty() {
            return Err(LinkError::ConfigValidation(
                "at least one [[rules]] entry is required".into(),
            ));
        }

        Ok(())
    }

    pub fn suffixes(&self) -> Suffixes {
        match &self.suffixes {
            Some([left, right]) => Suffixes::new(left.clone(), right.clone()),
            None => Suffixes::default(),
        }
    }

    /// Resolve `[[rules]]` into typed criteria, failing on the first
    /// malformed rule.
    pub fn resolve_rules(&self, functions: &KeyFunctions) -> Result<Vec<MatchCriterion>, LinkError> {
        resolve_criteria(&self.rules, functions)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::Method;
    use crate::value::Value;

    const VALID: &str = r#"
name = "people"

[left]
file = "population.csv"
key = "unique_id"

[right]
file = "new.csv"
key = "new_id"

[[rules]]
type_id = 1
method = "exact"
fields = ["first_name", "last_name"]

[[rules]]
type_id = 3
method = "function"
key = [
    { field = "first_name", take = 1 },
    { field = "last_name", take = 1, transform = "lower" },
]

[[rules]]
type_id = 4
method = "levenshtein"
fields = [
    { field_name = "first_name", precision = 1 },
    { field_name = "last_name", precision = 2 },
]
"#;

    #[test]
    fn parse_valid() {
        let config = LinkConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "people");
        assert_eq!(config.left.key, "unique_id");
        assert_eq!(config.right.file, "new.csv");
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[0].type_id, Value::from(1));
        assert_eq!(config.suffixes(), Suffixes::default());
        assert!(config.output.json.is_none());

        let criteria = config.resolve_rules(&KeyFunctions::new()).unwrap();
        let methods: Vec<_> = criteria.iter().map(|c| c.method()).collect();
        assert_eq!(methods, vec![Method::Exact, Method::Function, Method::Levenshtein]);
    }

    #[test]
    fn parse_suffixes_and_output() {
        let input = format!(
            r#"suffixes = ["_pop", "_new"]
{VALID}
[output]
json = "matches.json"
"#
        );
        let config = LinkConfig::from_toml(&input).unwrap();
        assert_eq!(config.suffixes(), Suffixes::new("_pop", "_new"));
        assert_eq!(config.output.json.as_deref(), Some("matches.json"));
    }

    #[test]
    fn reject_identical_suffixes() {
        let input = format!("suffixes = [\"_x\", \"_x\"]\n{VALID}");
        let err = LinkConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, LinkError::ConfigValidation(_)));
    }

    #[test]
    fn reject_missing_rules() {
        let input = r#"
name = "empty"

[left]
file = "a.csv"
key = "id"

[right]
file = "b.csv"
key = "id"
"#;
        let err = LinkConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("[[rules]]"));
    }

    #[test]
    fn reject_missing_section() {
        let err = LinkConfig::from_toml("name = \"x\"\n").unwrap_err();
        assert!(matches!(err, LinkError::ConfigParse(_)));
    }

    #[test]
    fn bad_rule_fails_at_resolution() {
        let input = VALID.replace("precision = 2", "precision = \"2\"");
        let config = LinkConfig::from_toml(&input).unwrap();
        let err = config.resolve_rules(&KeyFunctions::new()).unwrap_err();
        assert!(err.to_string().contains("#2"), "{err}");
    }

    #[test]
    fn relative_paths_follow_config_dir() {
        let config = LinkConfig::from_toml(VALID).unwrap();
        assert_eq!(
            config.left.path(Path::new("/data/run")),
            PathBuf::from("/data/run/population.csv")
        );
    }
}
