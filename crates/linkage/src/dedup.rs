use rustc_hash::FxHashSet;

use crate::engine::MATCH_TYPE;
use crate::error::LinkError;
use crate::table::Table;
use crate::value::Value;

/// Row positions of the canonical match per (left key, right key) pair.
///
/// Rows are stably sorted by `match_type` (null last) and the first row of
/// each pair is kept, so ties keep their original order.
pub(crate) fn unique_rows(table: &Table, left_col: usize, right_col: usize, type_col: usize) -> Vec<usize> {
    let rows = table.raw_rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| rows[a][type_col].cmp(&rows[b][type_col]));

    let mut seen: FxHashSet<(&Value, &Value)> = FxHashSet::default();
    order
        .into_iter()
        .filter(|&i| seen.insert((&rows[i][left_col], &rows[i][right_col])))
        .collect()
}

/// One row per (left key, right key) pair: the one with the lowest
/// `match_type`. All columns are kept and rows come out in `match_type` order.
pub fn remove_duplicate_matches(
    table: &Table,
    left_key: &str,
    right_key: &str,
) -> Result<Table, LinkError> {
    let col = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| LinkError::MissingColumn(name.into()))
    };
    let (left_col, right_col, type_col) = (col(left_key)?, col(right_key)?, col(MATCH_TYPE)?);
    let kept = unique_rows(table, left_col, right_col, type_col);
    log::debug!("deduplicated {} match rows to {}", table.len(), kept.len());
    Ok(table.take(&kept))
}
