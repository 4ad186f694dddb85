use rustc_hash::FxHashSet;

use crate::error::{LinkError, Side};
use crate::table::Table;
use crate::value::Value;

/// Right records whose key never appears in `matches[match_key_column]`.
///
/// Output keeps the right table's columns and row order.
pub fn unmatched_records(
    right: &Table,
    right_key: &str,
    matches: &Table,
    match_key_column: &str,
) -> Result<Table, LinkError> {
    let key_col = right
        .column_index(right_key)
        .ok_or_else(|| LinkError::MissingKeyField {
            side: Side::Right,
            field: right_key.into(),
        })?;
    let matched: FxHashSet<&Value> = matches.column(match_key_column)?.into_iter().collect();

    let keep: Vec<usize> = right
        .raw_rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| !matched.contains(&row[key_col]))
        .map(|(i, _)| i)
        .collect();
    Ok(right.take(&keep))
}
