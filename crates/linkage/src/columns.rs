//! Column layout for joined tables.
//!
//! Collisions between left and right column names are computed up front and
//! resolved with explicit suffixes. A suffixed name that is itself already
//! taken is an error rather than a silent overwrite.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::table::Table;
use crate::value::Value;

/// Suffixes appended to column names present on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suffixes {
    pub left: String,
    pub right: String,
}

impl Suffixes {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

impl Default for Suffixes {
    fn default() -> Self {
        Self::new("_left", "_right")
    }
}

/// Where an output column takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Left(usize),
    Right(usize),
}

/// Output layout of a left × right join.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    names: Vec<String>,
    sources: Vec<Source>,
    left_pos: Vec<Option<usize>>,
    right_pos: Vec<Option<usize>>,
}

impl ColumnPlan {
    /// Lay out all left columns followed by all right columns.
    ///
    /// Names in `merged` are equi-join fields present on both sides; they are
    /// emitted once, from the left, under their own name. Every other name
    /// present on both sides gets the matching suffix.
    pub fn build(
        left: &[String],
        right: &[String],
        merged: &[&str],
        suffixes: &Suffixes,
    ) -> Result<Self, LinkError> {
        Self::build_pinned(left, right, merged, (None, None), suffixes)
    }

    /// Like [`ColumnPlan::build`] with no merged fields, but left column
    /// `left_key` and right column `right_key` keep their own names while any
    /// other column sharing a name with them is suffixed. When both keys have
    /// the same name there is nothing to pin and both are suffixed.
    pub fn build_keyed(
        left: &[String],
        right: &[String],
        left_key: usize,
        right_key: usize,
        suffixes: &Suffixes,
    ) -> Result<Self, LinkError> {
        let pinned = if left[left_key] == right[right_key] {
            (None, None)
        } else {
            (Some(left_key), Some(right_key))
        };
        Self::build_pinned(left, right, &[], pinned, suffixes)
    }

    fn build_pinned(
        left: &[String],
        right: &[String],
        merged: &[&str],
        (left_pin, right_pin): (Option<usize>, Option<usize>),
        suffixes: &Suffixes,
    ) -> Result<Self, LinkError> {
        let left_set: FxHashSet<&str> = left.iter().map(String::as_str).collect();
        let right_set: FxHashSet<&str> = right.iter().map(String::as_str).collect();
        let is_merged = |name: &str| merged.iter().any(|m| *m == name);

        let mut plan = ColumnPlan {
            names: Vec::with_capacity(left.len() + right.len()),
            sources: Vec::with_capacity(left.len() + right.len()),
            left_pos: vec![None; left.len()],
            right_pos: vec![None; right.len()],
        };
        let mut taken: FxHashSet<String> = FxHashSet::default();

        for (i, name) in left.iter().enumerate() {
            let shared = !is_merged(name.as_str()) && right_set.contains(name.as_str());
            let resolved = if shared && left_pin != Some(i) {
                format!("{name}{}", suffixes.left)
            } else {
                name.clone()
            };
            plan.left_pos[i] = Some(plan.names.len());
            plan.push(name, resolved, Source::Left(i), &mut taken)?;
        }

        for (i, name) in right.iter().enumerate() {
            if is_merged(name.as_str()) {
                continue;
            }
            let resolved = if left_set.contains(name.as_str()) && right_pin != Some(i) {
                format!("{name}{}", suffixes.right)
            } else {
                name.clone()
            };
            plan.right_pos[i] = Some(plan.names.len());
            plan.push(name, resolved, Source::Right(i), &mut taken)?;
        }

        Ok(plan)
    }

    fn push(
        &mut self,
        original: &str,
        resolved: String,
        source: Source,
        taken: &mut FxHashSet<String>,
    ) -> Result<(), LinkError> {
        if !taken.insert(resolved.clone()) {
            return Err(LinkError::ColumnCollision {
                column: original.into(),
                resolved,
            });
        }
        self.names.push(resolved);
        self.sources.push(source);
        Ok(())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Output name of left column `idx`.
    pub fn left_name(&self, idx: usize) -> Option<&str> {
        self.left_pos
            .get(idx)
            .copied()
            .flatten()
            .map(|p| self.names[p].as_str())
    }

    /// Output name of right column `idx`; `None` for merged join fields.
    pub fn right_name(&self, idx: usize) -> Option<&str> {
        self.right_pos
            .get(idx)
            .copied()
            .flatten()
            .map(|p| self.names[p].as_str())
    }

    /// Fail if `name` is already part of the layout.
    pub fn reserve(&self, name: &str) -> Result<(), LinkError> {
        if self.names.iter().any(|n| n == name) {
            return Err(LinkError::ColumnCollision {
                column: name.into(),
                resolved: name.into(),
            });
        }
        Ok(())
    }

    /// Values of one output row for the pair (`left_row`, `right_row`).
    pub fn row(&self, left_row: &[Value], right_row: &[Value]) -> Vec<Value> {
        self.sources
            .iter()
            .map(|s| match *s {
                Source::Left(i) => left_row[i].clone(),
                Source::Right(i) => right_row[i].clone(),
            })
            .collect()
    }

    /// Materialize the given (left row, right row) pairs into a table.
    pub fn materialize(&self, left: &Table, right: &Table, pairs: &[(usize, usize)]) -> Table {
        let lrows = left.raw_rows();
        let rrows = right.raw_rows();
        let rows = pairs
            .iter()
            .map(|&(l, r)| self.row(&lrows[l], &rrows[r]))
            .collect();
        Table::from_parts(self.names.clone(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn disjoint_names_pass_through() {
        let plan = ColumnPlan::build(
            &cols(&["field1", "field2"]),
            &cols(&["field3", "field4"]),
            &[],
            &Suffixes::default(),
        )
        .unwrap();
        assert_eq!(plan.names(), &["field1", "field2", "field3", "field4"]);
    }

    #[test]
    fn collisions_get_suffixes() {
        let plan = ColumnPlan::build(
            &cols(&["id1", "first", "last"]),
            &cols(&["id2", "first", "last"]),
            &[],
            &Suffixes::default(),
        )
        .unwrap();
        assert_eq!(
            plan.names(),
            &["id1", "first_left", "last_left", "id2", "first_right", "last_right"]
        );
        assert_eq!(plan.left_name(1), Some("first_left"));
        assert_eq!(plan.right_name(2), Some("last_right"));
    }

    #[test]
    fn merged_fields_appear_once() {
        let plan = ColumnPlan::build(
            &cols(&["field", "id1"]),
            &cols(&["field", "id2"]),
            &["field"],
            &Suffixes::default(),
        )
        .unwrap();
        assert_eq!(plan.names(), &["field", "id1", "id2"]);
        assert_eq!(plan.right_name(0), None);
    }

    #[test]
    fn triple_collision_fails_loudly() {
        // left "a" + "_left" collides with an existing left column "a_left"
        let err = ColumnPlan::build(
            &cols(&["a", "a_left"]),
            &cols(&["a"]),
            &[],
            &Suffixes::default(),
        )
        .unwrap_err();
        assert!(
            matches!(err, LinkError::ColumnCollision { ref resolved, .. } if resolved == "a_left")
        );
    }

    #[test]
    fn identical_suffixes_collide() {
        let err = ColumnPlan::build(&cols(&["a"]), &cols(&["a"]), &[], &Suffixes::new("_x", "_x"))
            .unwrap_err();
        assert!(matches!(err, LinkError::ColumnCollision { .. }));
    }

    #[test]
    fn keyed_layout_pins_key_names() {
        let plan = ColumnPlan::build_keyed(
            &cols(&["id", "name"]),
            &cols(&["rid", "id", "name"]),
            0,
            0,
            &Suffixes::default(),
        )
        .unwrap();
        assert_eq!(plan.names(), &["id", "name_left", "rid", "id_right", "name_right"]);
        assert_eq!(plan.left_name(0), Some("id"));
        assert_eq!(plan.right_name(0), Some("rid"));
    }

    #[test]
    fn keyed_layout_with_shared_key_name_suffixes_both() {
        let plan = ColumnPlan::build_keyed(
            &cols(&["id", "name"]),
            &cols(&["id", "city"]),
            0,
            0,
            &Suffixes::default(),
        )
        .unwrap();
        assert_eq!(plan.names(), &["id_left", "name", "id_right", "city"]);
    }

    #[test]
    fn keyed_layout_still_reports_real_collisions() {
        // right "id" + "_right" lands on an existing right column
        let err = ColumnPlan::build_keyed(
            &cols(&["id"]),
            &cols(&["rid", "id", "id_right"]),
            0,
            0,
            &Suffixes::default(),
        )
        .unwrap_err();
        assert!(
            matches!(err, LinkError::ColumnCollision { ref resolved, .. } if resolved == "id_right")
        );
    }

    #[test]
    fn reserve_detects_taken_name() {
        let plan =
            ColumnPlan::build(&cols(&["match_type"]), &cols(&["b"]), &[], &Suffixes::default())
                .unwrap();
        assert!(plan.reserve("match_type").is_err());
        assert!(plan.reserve("matched_to").is_ok());
    }
}
