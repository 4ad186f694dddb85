use std::borrow::Cow;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::columns::{ColumnPlan, Suffixes};
use crate::error::{LinkError, Side};
use crate::table::Table;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Equi-join
// ---------------------------------------------------------------------------

fn field_indices(table: &Table, fields: &[&str], side: Side) -> Result<Vec<usize>, LinkError> {
    fields
        .iter()
        .map(|f| {
            table.column_index(f).ok_or_else(|| LinkError::MissingField {
                side,
                field: (*f).into(),
            })
        })
        .collect()
}

/// Hash join over precomputed keys: every (left, right) position whose keys
/// are equal, ordered by left position then right position. `None` keys never
/// match.
pub fn pairs_by_key<K, L, R>(left: L, right: R) -> Vec<(usize, usize)>
where
    K: Hash + Eq,
    L: IntoIterator<Item = Option<K>>,
    R: IntoIterator<Item = Option<K>>,
{
    let mut index: FxHashMap<K, Vec<usize>> = FxHashMap::default();
    for (ri, key) in right.into_iter().enumerate() {
        if let Some(key) = key {
            index.entry(key).or_default().push(ri);
        }
    }

    let mut pairs = Vec::new();
    for (li, key) in left.into_iter().enumerate() {
        if let Some(matches) = key.and_then(|k| index.get(&k)) {
            pairs.extend(matches.iter().map(|&ri| (li, ri)));
        }
    }
    pairs
}

/// Join key of one row over the `on` columns; `None` if any of them is null.
fn row_key<'t>(row: &'t [Value], cols: &[usize]) -> Option<Vec<Cow<'t, Value>>> {
    cols.iter().map(|&c| row[c].join_key()).collect()
}

/// Row pairs whose `on` fields are all equal, ordered by left row then right row.
///
/// A null in any join field never matches. Numbers compare by value, so an
/// `Int` joins the equal integral `Float`.
pub fn equi_join_pairs(
    left: &Table,
    right: &Table,
    on: &[&str],
) -> Result<Vec<(usize, usize)>, LinkError> {
    let left_idx = field_indices(left, on, Side::Left)?;
    let right_idx = field_indices(right, on, Side::Right)?;

    Ok(pairs_by_key(
        left.raw_rows().iter().map(|row| row_key(row, &left_idx)),
        right.raw_rows().iter().map(|row| row_key(row, &right_idx)),
    ))
}

/// Inner join on equality of `on`. Join fields appear once; other shared
/// column names are suffixed.
pub fn inner_join(
    left: &Table,
    right: &Table,
    on: &[&str],
    suffixes: &Suffixes,
) -> Result<Table, LinkError> {
    let pairs = equi_join_pairs(left, right, on)?;
    let plan = ColumnPlan::build(left.columns(), right.columns(), on, suffixes)?;
    Ok(plan.materialize(left, right, &pairs))
}

// ---------------------------------------------------------------------------
// Cartesian join
// ---------------------------------------------------------------------------

/// Every left × right pairing, addressed by a flat left-major index.
///
/// Nothing is materialized until asked for, so callers can filter pair
/// indices before paying for row copies.
#[derive(Debug)]
pub struct CrossJoin<'a> {
    left: &'a Table,
    right: &'a Table,
    plan: ColumnPlan,
}

impl<'a> CrossJoin<'a> {
    pub fn new(left: &'a Table, right: &'a Table, suffixes: &Suffixes) -> Result<Self, LinkError> {
        let plan = ColumnPlan::build(left.columns(), right.columns(), &[], suffixes)?;
        Ok(Self { left, right, plan })
    }

    pub fn plan(&self) -> &ColumnPlan {
        &self.plan
    }

    /// |left| × |right|.
    pub fn len(&self) -> usize {
        self.left.len() * self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (left row, right row) of flat index `idx`.
    pub fn pair(&self, idx: usize) -> (usize, usize) {
        let width = self.right.len();
        (idx / width, idx % width)
    }

    pub fn materialize(&self, pairs: &[(usize, usize)]) -> Table {
        self.plan.materialize(self.left, self.right, pairs)
    }

    /// The full product.
    pub fn to_table(&self) -> Table {
        let pairs: Vec<(usize, usize)> = (0..self.len()).map(|i| self.pair(i)).collect();
        self.materialize(&pairs)
    }
}

/// Cartesian product of two tables with suffix-qualified shared columns.
pub fn cross_join(left: &Table, right: &Table, suffixes: &Suffixes) -> Result<Table, LinkError> {
    Ok(CrossJoin::new(left, right, suffixes)?.to_table())
}
