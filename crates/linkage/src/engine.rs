use std::fmt;

use rustc_hash::FxHashSet;

use crate::columns::{ColumnPlan, Suffixes};
use crate::criteria::{validate_criteria, FieldPrecision, KeyFn, MatchCriterion};
use crate::descriptor::{resolve_criteria, CriterionSpec};
use crate::error::{LinkError, Side};
use crate::join::CrossJoin;
use crate::key::KeyFunctions;
use crate::matcher::{
    edit_distance_table, match_derived, match_edit_distance, match_exact, require_field,
};
use crate::result::MatchResultSet;
use crate::summary::{compute_summary, MatchSummary, RuleSummary};
use crate::table::Table;
use crate::value::Value;

/// Column holding the left key value of each match.
pub const MATCHED_TO: &str = "matched_to";
/// Column holding the identifier of the rule that produced each match.
pub const MATCH_TYPE: &str = "match_type";

/// Two keyed tables and the suffixes used when their column names collide.
///
/// Tables are validated once at construction: the key field must exist and
/// hold unique, non-null values on each side. Nothing afterwards mutates them.
#[derive(Debug, Clone)]
pub struct Matcher {
    left: Table,
    left_key: String,
    left_key_col: usize,
    right: Table,
    right_key: String,
    right_key_col: usize,
    suffixes: Suffixes,
}

fn check_key(table: &Table, key: &str, side: Side) -> Result<usize, LinkError> {
    let col = table
        .column_index(key)
        .ok_or_else(|| LinkError::MissingKeyField {
            side,
            field: key.into(),
        })?;
    let mut seen: FxHashSet<&Value> = FxHashSet::default();
    for (row, values) in table.raw_rows().iter().enumerate() {
        let value = &values[col];
        if value.is_null() {
            return Err(LinkError::NullKey {
                side,
                field: key.into(),
                row,
            });
        }
        if !seen.insert(value) {
            return Err(LinkError::DuplicateKey {
                side,
                field: key.into(),
                value: value.clone(),
            });
        }
    }
    Ok(col)
}

fn append(table: Table, name: &str, values: Vec<Value>) -> Result<Table, LinkError> {
    if table.has_column(name) {
        return Err(LinkError::ColumnCollision {
            column: name.into(),
            resolved: name.into(),
        });
    }
    table.with_column(name, values)
}

impl Matcher {
    pub fn new(
        left: Table,
        left_key: impl Into<String>,
        right: Table,
        right_key: impl Into<String>,
    ) -> Result<Self, LinkError> {
        let left_key = left_key.into();
        let right_key = right_key.into();
        let left_key_col = check_key(&left, &left_key, Side::Left)?;
        let right_key_col = check_key(&right, &right_key, Side::Right)?;
        Ok(Self {
            left,
            left_key,
            left_key_col,
            right,
            right_key,
            right_key_col,
            suffixes: Suffixes::default(),
        })
    }

    pub fn with_suffixes(mut self, suffixes: Suffixes) -> Self {
        self.suffixes = suffixes;
        self
    }

    pub fn left(&self) -> &Table {
        &self.left
    }

    pub fn right(&self) -> &Table {
        &self.right
    }

    pub fn left_key(&self) -> &str {
        &self.left_key
    }

    pub fn right_key(&self) -> &str {
        &self.right_key
    }

    pub fn suffixes(&self) -> &Suffixes {
        &self.suffixes
    }

    // -----------------------------------------------------------------------
    // Single matchers
    // -----------------------------------------------------------------------

    /// Append `matched_to` (the left key) and `match_type` to a materialized
    /// pair table.
    fn tag(&self, table: Table, pairs: &[(usize, usize)], type_id: &Value) -> Result<Table, LinkError> {
        let left_rows = self.left.raw_rows();
        let matched_to = pairs
            .iter()
            .map(|&(l, _)| left_rows[l][self.left_key_col].clone())
            .collect();
        let table = append(table, MATCHED_TO, matched_to)?;
        append(table, MATCH_TYPE, vec![type_id.clone(); pairs.len()])
    }

    /// Records equal on every one of `fields`. Join fields appear once.
    pub fn match_on_fields<S: AsRef<str>>(
        &self,
        fields: &[S],
        type_id: impl Into<Value>,
    ) -> Result<Table, LinkError> {
        let type_id = type_id.into();
        let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        MatchCriterion::exact(type_id.clone(), fields.clone()).validate(0)?;

        let pairs = match_exact(&self.left, &self.right, &fields)?;
        let merged: Vec<&str> = fields.iter().map(String::as_str).collect();
        let plan = ColumnPlan::build(self.left.columns(), self.right.columns(), &merged, &self.suffixes)?;
        let table = plan.materialize(&self.left, &self.right, &pairs);
        self.tag(table, &pairs, &type_id)
    }

    /// Records whose keys under `function` are equal.
    pub fn match_on_function(
        &self,
        function: &KeyFn,
        type_id: impl Into<Value>,
    ) -> Result<Table, LinkError> {
        let type_id = type_id.into();
        let pairs = match_derived(&self.left, &self.right, function, &type_id)?;
        let plan = ColumnPlan::build(self.left.columns(), self.right.columns(), &[], &self.suffixes)?;
        let table = plan.materialize(&self.left, &self.right, &pairs);
        self.tag(table, &pairs, &type_id)
    }

    /// Records within the maximum edit distance on every field.
    ///
    /// Output carries the suffix-qualified columns of the cartesian join and
    /// one `<field>_edit_distance` column per field.
    pub fn match_on_edit_distance(
        &self,
        fields: &[FieldPrecision],
        type_id: impl Into<Value>,
    ) -> Result<Table, LinkError> {
        let type_id = type_id.into();
        let criterion = MatchCriterion::EditDistance {
            type_id: type_id.clone(),
            fields: fields.to_vec(),
        };
        criterion.validate(0)?;

        let (matches, _) = match_edit_distance(&self.left, &self.right, fields)?;
        let cross = CrossJoin::new(&self.left, &self.right, &self.suffixes)?;
        let table = edit_distance_table(&cross, fields, &matches)?;
        let pairs: Vec<(usize, usize)> = matches.iter().map(|m| (m.left, m.right)).collect();
        self.tag(table, &pairs, &type_id)
    }

    // -----------------------------------------------------------------------
    // Engine
    // -----------------------------------------------------------------------

    fn rule_pairs(&self, criterion: &MatchCriterion) -> Result<Vec<(usize, usize)>, LinkError> {
        match criterion {
            MatchCriterion::ExactFields { fields, .. } => match_exact(&self.left, &self.right, fields),
            MatchCriterion::DerivedKey { type_id, function } => {
                match_derived(&self.left, &self.right, function, type_id)
            }
            MatchCriterion::EditDistance { fields, .. } => {
                let (matches, _) = match_edit_distance(&self.left, &self.right, fields)?;
                Ok(matches.into_iter().map(|m| (m.left, m.right)).collect())
            }
        }
    }

    /// Fail if any rule names a field missing from either table.
    pub fn check_fields(&self, criteria: &[MatchCriterion]) -> Result<(), LinkError> {
        for criterion in criteria {
            let fields: Vec<&str> = match criterion {
                MatchCriterion::ExactFields { fields, .. } => {
                    fields.iter().map(String::as_str).collect()
                }
                MatchCriterion::DerivedKey { .. } => continue,
                MatchCriterion::EditDistance { fields, .. } => {
                    fields.iter().map(|f| f.field.as_str()).collect()
                }
            };
            for field in fields {
                require_field(&self.left, field, Side::Left)?;
                require_field(&self.right, field, Side::Right)?;
            }
        }
        Ok(())
    }

    /// Apply every rule in order and join the full original records back onto
    /// the union of their matches.
    ///
    /// The list is validated as a whole, and every named field looked up,
    /// before any rule runs. The result keeps
    /// one row per (rule, pair): a pair found by two rules appears twice.
    pub fn create_matches(&self, criteria: &[MatchCriterion]) -> Result<MatchResultSet, LinkError> {
        validate_criteria(criteria)?;
        self.check_fields(criteria)?;

        let mut tagged: Vec<(usize, usize, &Value)> = Vec::new();
        let mut rules = Vec::with_capacity(criteria.len());
        for (rule, criterion) in criteria.iter().enumerate() {
            let pairs = self.rule_pairs(criterion)?;
            log::debug!(
                "rule #{rule} ({} type_id {}): {} matches",
                criterion.method(),
                criterion.type_id(),
                pairs.len()
            );
            rules.push(RuleSummary {
                rule,
                type_id: criterion.type_id().clone(),
                method: criterion.method(),
                matches: pairs.len(),
            });
            let type_id = criterion.type_id();
            tagged.extend(pairs.into_iter().map(|(l, r)| (l, r, type_id)));
        }

        let (matched, left_col, right_col) = self.assemble(&tagged)?;
        log::info!(
            "{} rules produced {} matches between {} {} and {} {} records",
            criteria.len(),
            matched.len(),
            self.left.len(),
            self.left_key,
            self.right.len(),
            self.right_key
        );
        Ok(MatchResultSet::new(
            matched,
            left_col,
            right_col,
            self.right_key.clone(),
            rules,
        ))
    }

    /// Resolve untyped rule descriptors, then run them.
    pub fn create_matches_from_specs(
        &self,
        specs: &[CriterionSpec],
        functions: &KeyFunctions,
    ) -> Result<MatchResultSet, LinkError> {
        let criteria = resolve_criteria(specs, functions)?;
        self.create_matches(&criteria)
    }

    /// Lay out `(left key, right key, match_type, left columns, right columns)`
    /// for every tagged pair. Returns the table and the output names of the
    /// two key columns.
    fn assemble(&self, tagged: &[(usize, usize, &Value)]) -> Result<(Table, String, String), LinkError> {
        let plan = ColumnPlan::build_keyed(
            self.left.columns(),
            self.right.columns(),
            self.left_key_col,
            self.right_key_col,
            &self.suffixes,
        )?;
        plan.reserve(MATCH_TYPE)?;

        let names = plan.names();
        let position = |name: Option<&str>| name.and_then(|n| names.iter().position(|c| c == n));
        let (Some(lk), Some(rk)) = (
            position(plan.left_name(self.left_key_col)),
            position(plan.right_name(self.right_key_col)),
        ) else {
            return Err(LinkError::MissingColumn(self.left_key.clone()));
        };
        let rest: Vec<usize> = (0..names.len()).filter(|&i| i != lk && i != rk).collect();

        let mut columns = Vec::with_capacity(names.len() + 1);
        columns.push(names[lk].clone());
        columns.push(names[rk].clone());
        columns.push(MATCH_TYPE.to_string());
        columns.extend(rest.iter().map(|&i| names[i].clone()));

        let left_rows = self.left.raw_rows();
        let right_rows = self.right.raw_rows();
        let rows = tagged
            .iter()
            .map(|&(l, r, type_id)| {
                let full = plan.row(&left_rows[l], &right_rows[r]);
                let mut row = Vec::with_capacity(full.len() + 1);
                row.push(full[lk].clone());
                row.push(full[rk].clone());
                row.push(type_id.clone());
                row.extend(rest.iter().map(|&i| full[i].clone()));
                row
            })
            .collect();

        let left_col = names[lk].clone();
        let right_col = names[rk].clone();
        Ok((Table::new(columns, rows)?, left_col, right_col))
    }

    /// Right records that appear nowhere in `matches`.
    pub fn unmatched(&self, matches: &MatchResultSet) -> Result<Table, LinkError> {
        matches.unmatched(&self.right)
    }

    pub fn summary(&self, matches: &MatchResultSet) -> Result<MatchSummary, LinkError> {
        let unmatched = self.unmatched(matches)?;
        Ok(compute_summary(matches, unmatched.len()))
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Matcher: {} records identified by {}; {} records identified by {}",
            self.left.len(),
            self.left_key,
            self.right.len(),
            self.right_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::table::Row;

    fn match_data() -> Matcher {
        let left = Table::from_records(vec![
            vec![("field", Value::from("foo")), ("id1", Value::from(1))],
            vec![("field", Value::from("bar")), ("id1", Value::from(2))],
            vec![("field", Value::from("baz")), ("id1", Value::from(3))],
        ]);
        let right = Table::from_records(vec![
            vec![("field", Value::from("food")), ("id2", Value::from(100))],
            vec![("field", Value::from("barn")), ("id2", Value::from(101))],
            vec![("field", Value::from("baz")), ("id2", Value::from(102))],
        ]);
        Matcher::new(left, "id1", right, "id2").unwrap()
    }

    fn name_data() -> Matcher {
        let left = Table::from_records(vec![
            vec![("id1", Value::from(1)), ("first", "Jack".into()), ("last", "Smith".into())],
            vec![("id1", Value::from(2)), ("first", "Jane".into()), ("last", "Jones".into())],
            vec![("id1", Value::from(3)), ("first", "Bob".into()), ("last", "Mitten".into())],
        ]);
        let right = Table::from_records(vec![
            vec![("id2", Value::from(100)), ("first", "Jake".into()), ("last", "Smyth".into())],
            vec![("id2", Value::from(101)), ("first", "Joan".into()), ("last", "Jeans".into())],
            vec![("id2", Value::from(102)), ("first", "Bob".into()), ("last", "Kitten".into())],
        ]);
        Matcher::new(left, "id1", right, "id2").unwrap()
    }

    fn prefix3() -> KeyFn {
        Arc::new(|row: &Row<'_>| -> Result<Value, crate::error::BoxError> {
            Ok(row.str("field").map(|s| s.chars().take(3).collect::<String>()).into())
        })
    }

    fn initials(row: &Row<'_>) -> Result<Value, crate::error::BoxError> {
        let first = row.str("first").and_then(|s| s.chars().next());
        let last = row.str("last").and_then(|s| s.chars().next());
        Ok(match (first, last) {
            (Some(f), Some(l)) => Value::Text(format!("{f}{l}")),
            _ => Value::Null,
        })
    }

    fn ints(values: Vec<&Value>) -> Vec<i64> {
        values.into_iter().filter_map(Value::as_i64).collect()
    }

    #[test]
    fn matcher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Matcher>();
    }

    #[test]
    fn display() {
        assert_eq!(
            match_data().to_string(),
            "Matcher: 3 records identified by id1; 3 records identified by id2"
        );
    }

    #[test]
    fn key_checks() {
        let t = Table::from_records(vec![vec![("id", Value::from(1))], vec![("id", Value::from(1))]]);
        let other = Table::from_records(vec![vec![("id", Value::from(1))]]);

        let err = Matcher::new(other.clone(), "missing", other.clone(), "id").unwrap_err();
        assert_eq!(err.to_string(), "field missing not present in left data");

        let err = Matcher::new(other.clone(), "id", t, "id").unwrap_err();
        assert!(matches!(err, LinkError::DuplicateKey { side: Side::Right, .. }));

        let nulls = Table::from_records(vec![vec![("id", Value::Null)]]);
        let err = Matcher::new(nulls, "id", other, "id").unwrap_err();
        assert!(matches!(err, LinkError::NullKey { side: Side::Left, row: 0, .. }));
    }

    #[test]
    fn exact_match_on_field() {
        let m = match_data();
        let out = m.match_on_fields(&["field"], 1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.columns(), &["field", "id1", "id2", "matched_to", "match_type"]);
        assert_eq!(out.value(0, "field"), Some(&Value::from("baz")));
        assert_eq!(out.value(0, "matched_to"), Some(&Value::from(3)));
        assert_eq!(out.value(0, "match_type"), Some(&Value::from(1)));
    }

    #[test]
    fn exact_match_is_symmetric() {
        let m = match_data();
        let swapped = Matcher::new(m.right().clone(), "id2", m.left().clone(), "id1").unwrap();
        let a = m.match_on_fields(&["field"], 1).unwrap();
        let b = swapped.match_on_fields(&["field"], 1).unwrap();
        assert_eq!(a.len(), b.len());
        assert_eq!(a.value(0, "id1"), b.value(0, "id1"));
        assert_eq!(a.value(0, "id2"), b.value(0, "id2"));
    }

    #[test]
    fn exact_match_requires_fields() {
        let m = match_data();
        let err = m.match_on_fields::<&str>(&[], 1).unwrap_err();
        assert!(matches!(err, LinkError::InvalidCriterion { .. }));
    }

    #[test]
    fn function_match_keeps_left_order() {
        let m = match_data();
        let out = m.match_on_function(&prefix3(), 2).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(ints(out.column("id1").unwrap()), vec![1, 2, 3]);
        assert_eq!(
            out.columns(),
            &["field_left", "id1", "field_right", "id2", "matched_to", "match_type"]
        );
        // inputs never see the derived keys
        assert_eq!(m.left().columns(), &["field", "id1"]);
        assert_eq!(m.right().columns(), &["field", "id2"]);
    }

    #[test]
    fn edit_distance_match() {
        let m = name_data();
        let out = m
            .match_on_edit_distance(
                &[FieldPrecision::new("first", 0), FieldPrecision::new("last", 1)],
                "lev",
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.value(0, "id2"), Some(&Value::from(102)));
        assert_eq!(out.value(0, "first_left"), Some(&Value::from("Bob")));
        assert_eq!(out.value(0, "last_right"), Some(&Value::from("Kitten")));
        assert_eq!(out.value(0, "last_edit_distance"), Some(&Value::from(1)));
        assert_eq!(out.value(0, "matched_to"), Some(&Value::from(3)));

        let none = m
            .match_on_edit_distance(
                &[FieldPrecision::new("first", 0), FieldPrecision::new("last", 0)],
                "lev",
            )
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn create_matches_layout() {
        let m = name_data();
        let result = m
            .create_matches(&[
                MatchCriterion::exact(1, ["first"]),
                MatchCriterion::derived(3, initials),
                MatchCriterion::edit_distance(2, [("first", 2), ("last", 1)]),
            ])
            .unwrap();
        let matched = result.matched_data();
        assert_eq!(matched.len(), 5);
        assert_eq!(
            matched.columns(),
            &["id1", "id2", "match_type", "first_left", "last_left", "first_right", "last_right"]
        );
        assert_eq!(ints(matched.column("match_type").unwrap()), vec![1, 3, 3, 2, 2]);
        assert_eq!(result.to_string(), "MatchResult: 5 records; id1 to id2");
    }

    #[test]
    fn shared_key_name_is_qualified() {
        let left = Table::from_records(vec![vec![("id", Value::from(1)), ("name", "a".into())]]);
        let right = Table::from_records(vec![vec![("id", Value::from(9)), ("name", "a".into())]]);
        let m = Matcher::new(left, "id", right, "id").unwrap();
        let result = m.create_matches(&[MatchCriterion::exact(1, ["name"])]).unwrap();
        assert_eq!(
            result.matched_data().columns(),
            &["id_left", "id_right", "match_type", "name_left", "name_right"]
        );
        assert_eq!(result.left_key(), "id_left");
        assert_eq!(result.right_key(), "id_right");
        assert!(m.unmatched(&result).unwrap().is_empty());
    }

    #[test]
    fn reserved_column_collides() {
        let left = Table::from_records(vec![vec![("id", Value::from(1)), ("match_type", Value::from(0))]]);
        let right = Table::from_records(vec![vec![("rid", Value::from(1)), ("id", Value::from(1))]]);
        let m = Matcher::new(left, "id", right, "rid").unwrap();
        let err = m
            .create_matches(&[MatchCriterion::exact(1, ["id"])])
            .unwrap_err();
        assert!(matches!(err, LinkError::ColumnCollision { .. }));
    }

    #[test]
    fn key_columns_keep_their_names_beside_same_named_data() {
        let left = Table::from_records(vec![vec![("id", Value::from(1)), ("name", "a".into())]]);
        let right = Table::from_records(vec![vec![
            ("rid", Value::from(9)),
            ("id", Value::from(5)),
            ("name", "a".into()),
        ]]);
        let m = Matcher::new(left, "id", right, "rid").unwrap();
        let result = m.create_matches(&[MatchCriterion::exact(1, ["name"])]).unwrap();
        assert_eq!(
            result.matched_data().columns(),
            &["id", "rid", "match_type", "name_left", "id_right", "name_right"]
        );
        assert_eq!(result.left_key(), "id");
        assert_eq!(result.right_key(), "rid");
        assert_eq!(
            result.matched_data().column("id_right").unwrap(),
            vec![&Value::from(5)]
        );
        assert!(m.unmatched(&result).unwrap().is_empty());
    }

    #[test]
    fn invalid_rule_stops_before_matching() {
        let m = name_data();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let err = m
            .create_matches(&[
                MatchCriterion::derived(1, move |_row: &Row<'_>| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(Value::Null)
                }),
                MatchCriterion::exact(2, Vec::<String>::new()),
            ])
            .unwrap_err();
        assert!(matches!(err, LinkError::InvalidCriterion { rule: 1, .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_field_detected_before_any_rule_runs() {
        let m = name_data();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let err = m
            .create_matches(&[
                MatchCriterion::derived(1, move |_row: &Row<'_>| {
                    counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(Value::Null)
                }),
                MatchCriterion::edit_distance(2, [("middle", 1)]),
            ])
            .unwrap_err();
        assert!(matches!(err, LinkError::MissingField { side: Side::Left, .. }));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_field_names_side() {
        let m = match_data();
        let err = m.create_matches(&[MatchCriterion::exact(1, ["id1"])]).unwrap_err();
        assert_eq!(err.to_string(), "field 'id1' not present in right data");
    }
}
