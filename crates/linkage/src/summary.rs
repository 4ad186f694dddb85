use std::collections::BTreeMap;

use serde::Serialize;

use crate::criteria::Method;
use crate::result::MatchResultSet;
use crate::value::Value;

/// Matches produced by one rule, before deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub rule: usize,
    pub type_id: Value,
    pub method: Method,
    pub matches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub total_matches: usize,
    pub unique_matches: usize,
    pub unmatched_right: usize,
    pub per_rule: Vec<RuleSummary>,
    /// Unique matches per winning `match_type`, keyed by its display form.
    pub unique_by_type: BTreeMap<String, usize>,
}

/// Compute summary statistics from a match set and the size of its unmatched
/// complement.
pub fn compute_summary(result: &MatchResultSet, unmatched_right: usize) -> MatchSummary {
    let unique = result.unique_matches();
    let mut unique_by_type: BTreeMap<String, usize> = BTreeMap::new();
    for row in unique.rows() {
        let key = row.values()[2].to_string();
        *unique_by_type.entry(key).or_insert(0) += 1;
    }

    MatchSummary {
        total_matches: result.len(),
        unique_matches: unique.len(),
        unmatched_right,
        per_rule: result.rules().to_vec(),
        unique_by_type,
    }
}
