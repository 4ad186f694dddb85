use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

use crate::dedup::unique_rows;
use crate::error::LinkError;
use crate::summary::RuleSummary;
use crate::table::Table;
use crate::unmatched::unmatched_records;

/// Output of [`Matcher::create_matches`](crate::Matcher::create_matches).
///
/// `matched_data` holds every (rule, pair) match. Its first three columns are
/// always the left key, the right key and `match_type`. The deduplicated view
/// is computed on first use and cached.
#[derive(Debug, Serialize)]
pub struct MatchResultSet {
    left_key: String,
    right_key: String,
    #[serde(skip)]
    right_source_key: String,
    rules: Vec<RuleSummary>,
    #[serde(rename = "matches")]
    matched: Table,
    #[serde(skip)]
    unique: OnceLock<Table>,
}

impl MatchResultSet {
    pub(crate) fn new(
        matched: Table,
        left_key: String,
        right_key: String,
        right_source_key: String,
        rules: Vec<RuleSummary>,
    ) -> Self {
        Self {
            left_key,
            right_key,
            right_source_key,
            rules,
            matched,
            unique: OnceLock::new(),
        }
    }

    /// Every match, in rule order.
    pub fn matched_data(&self) -> &Table {
        &self.matched
    }

    /// One row per distinct (left, right) pair, carrying the lowest
    /// `match_type`; rows are in `match_type` order.
    pub fn unique_matches(&self) -> &Table {
        self.unique.get_or_init(|| {
            let kept = unique_rows(&self.matched, 0, 1, 2);
            self.matched.take(&kept)
        })
    }

    /// Name of the left key column in `matched_data`.
    pub fn left_key(&self) -> &str {
        &self.left_key
    }

    /// Name of the right key column in `matched_data`. Differs from the
    /// right table's key field when both sides share a key name.
    pub fn right_key(&self) -> &str {
        &self.right_key
    }

    pub fn rules(&self) -> &[RuleSummary] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.matched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    /// Records of `right` that no rule matched.
    pub fn unmatched(&self, right: &Table) -> Result<Table, LinkError> {
        unmatched_records(right, &self.right_source_key, &self.matched, &self.right_key)
    }
}

impl fmt::Display for MatchResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MatchResult: {} records; {} to {}",
            self.matched.len(),
            self.left_key,
            self.right_key
        )
    }
}
