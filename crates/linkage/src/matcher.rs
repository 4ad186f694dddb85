//! The three matchers. Each takes the left and right tables and returns the
//! matching (left row, right row) pairs in left-major order; the engine tags
//! and materializes them.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::criteria::{FieldPrecision, KeyFn};
use crate::error::{LinkError, Side};
use crate::join::{equi_join_pairs, pairs_by_key, CrossJoin};
use crate::table::Table;
use crate::value::Value;

/// Candidate count at which the edit-distance scan moves to the rayon pool.
const PARALLEL_THRESHOLD: usize = 4096;

pub(crate) fn require_field(table: &Table, field: &str, side: Side) -> Result<usize, LinkError> {
    table
        .column_index(field)
        .ok_or_else(|| LinkError::MissingField {
            side,
            field: field.into(),
        })
}

// ---------------------------------------------------------------------------
// Exact fields
// ---------------------------------------------------------------------------

/// Pairs whose `fields` are all equal. Every field must exist on both sides.
pub fn match_exact(
    left: &Table,
    right: &Table,
    fields: &[String],
) -> Result<Vec<(usize, usize)>, LinkError> {
    for field in fields {
        require_field(left, field, Side::Left)?;
        require_field(right, field, Side::Right)?;
    }
    let on: Vec<&str> = fields.iter().map(String::as_str).collect();
    equi_join_pairs(left, right, &on)
}

// ---------------------------------------------------------------------------
// Derived key
// ---------------------------------------------------------------------------

/// Evaluate `function` over every row of `table`.
pub fn derive_keys(
    table: &Table,
    function: &KeyFn,
    type_id: &Value,
) -> Result<Vec<Value>, LinkError> {
    table
        .rows()
        .map(|row| {
            function(&row).map_err(|source| LinkError::KeyFunction {
                type_id: type_id.clone(),
                source,
            })
        })
        .collect()
}

/// Pairs whose derived keys are equal.
///
/// Keys live in per-call vectors only, so neither table ever carries them.
/// Null keys never match; numeric keys compare by value.
pub fn match_derived(
    left: &Table,
    right: &Table,
    function: &KeyFn,
    type_id: &Value,
) -> Result<Vec<(usize, usize)>, LinkError> {
    let left_keys = derive_keys(left, function, type_id)?;
    let right_keys = derive_keys(right, function, type_id)?;

    Ok(pairs_by_key(
        left_keys.iter().map(Value::join_key),
        right_keys.iter().map(Value::join_key),
    ))
}

// ---------------------------------------------------------------------------
// Edit distance
// ---------------------------------------------------------------------------

/// A pair that passed every field threshold, with its per-field distances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditMatch {
    pub left: usize,
    pub right: usize,
    pub distances: Vec<usize>,
}

/// Candidate counts for one edit-distance run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub candidates: usize,
    /// Pairs removed by the length check, per configured field.
    pub pruned_by_length: Vec<usize>,
    /// Pairs that reached the distance computation.
    pub compared: usize,
    pub matched: usize,
}

/// Text and character count of every value in one column; `None` for nulls.
fn text_column(table: &Table, col: usize) -> Vec<Option<(String, usize)>> {
    table
        .raw_rows()
        .iter()
        .map(|row| {
            row[col].to_text().map(|t| {
                let len = t.chars().count();
                (t.into_owned(), len)
            })
        })
        .collect()
}

struct PreparedField {
    left: Vec<Option<(String, usize)>>,
    right: Vec<Option<(String, usize)>>,
    max: usize,
}

/// Pairs within every field's maximum edit distance.
///
/// Candidates come from the cartesian product. For each field in order,
/// pairs whose length difference already exceeds the field's maximum are
/// dropped, since the edit distance can never be smaller than that
/// difference. Only survivors get a full Levenshtein computation, and a pair
/// matches when all fields are within their maximum.
pub fn match_edit_distance(
    left: &Table,
    right: &Table,
    fields: &[FieldPrecision],
) -> Result<(Vec<EditMatch>, PruneStats), LinkError> {
    let mut prepared = Vec::with_capacity(fields.len());
    for f in fields {
        let lc = require_field(left, &f.field, Side::Left)?;
        let rc = require_field(right, &f.field, Side::Right)?;
        prepared.push(PreparedField {
            left: text_column(left, lc),
            right: text_column(right, rc),
            max: f.max_distance as usize,
        });
    }

    let right_len = right.len();
    let candidates = left.len() * right_len;
    let pruned: Vec<AtomicUsize> = fields.iter().map(|_| AtomicUsize::new(0)).collect();
    let compared = AtomicUsize::new(0);

    let evaluate = |idx: usize| -> Option<EditMatch> {
        let (li, ri) = (idx / right_len, idx % right_len);

        for (fi, f) in prepared.iter().enumerate() {
            let (Some((_, llen)), Some((_, rlen))) = (&f.left[li], &f.right[ri]) else {
                pruned[fi].fetch_add(1, Ordering::Relaxed);
                return None;
            };
            if llen.abs_diff(*rlen) > f.max {
                pruned[fi].fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        compared.fetch_add(1, Ordering::Relaxed);
        let mut distances = Vec::with_capacity(prepared.len());
        for f in &prepared {
            let (Some((l, _)), Some((r, _))) = (&f.left[li], &f.right[ri]) else {
                return None;
            };
            let d = strsim::levenshtein(l, r);
            if d > f.max {
                return None;
            }
            distances.push(d);
        }
        Some(EditMatch {
            left: li,
            right: ri,
            distances,
        })
    };

    let matches: Vec<EditMatch> = if candidates >= PARALLEL_THRESHOLD {
        (0..candidates).into_par_iter().filter_map(evaluate).collect()
    } else {
        (0..candidates).filter_map(evaluate).collect()
    };

    let stats = PruneStats {
        candidates,
        pruned_by_length: pruned.into_iter().map(AtomicUsize::into_inner).collect(),
        compared: compared.into_inner(),
        matched: matches.len(),
    };
    log::debug!(
        "edit distance: {} candidates, pruned by length {:?}, {} compared, {} matched",
        stats.candidates,
        stats.pruned_by_length,
        stats.compared,
        stats.matched
    );

    Ok((matches, stats))
}

/// Edit-distance matches rendered as cartesian-join rows plus one
/// `<field>_edit_distance` column per configured field.
pub(crate) fn edit_distance_table(
    cross: &CrossJoin<'_>,
    fields: &[FieldPrecision],
    matches: &[EditMatch],
) -> Result<Table, LinkError> {
    let pairs: Vec<(usize, usize)> = matches.iter().map(|m| (m.left, m.right)).collect();
    let mut table = cross.materialize(&pairs);
    for (fi, f) in fields.iter().enumerate() {
        let name = format!("{}_edit_distance", f.field);
        cross.plan().reserve(&name)?;
        let values = matches
            .iter()
            .map(|m| Value::Int(m.distances[fi] as i64))
            .collect();
        table = table.with_column(&name, values)?;
    }
    Ok(table)
}
