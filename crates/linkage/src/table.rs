use rustc_hash::FxHashMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::LinkError;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// An ordered set of rows sharing one list of uniquely named columns.
///
/// Tables are immutable once handed to the engine. Operations that add or
/// remove columns return a new table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from a column list and row-major values.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, LinkError> {
        let mut seen: FxHashMap<&str, ()> = FxHashMap::default();
        for name in &columns {
            if seen.insert(name.as_str(), ()).is_some() {
                return Err(LinkError::DuplicateColumn(name.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(LinkError::RowWidth {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Build a table from field-name → value mappings.
    ///
    /// Columns appear in first-seen order across all records. Fields a record
    /// does not carry are null. If a record repeats a field, the last value wins.
    pub fn from_records<I, R, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut columns: Vec<String> = Vec::new();
        let mut index: FxHashMap<String, usize> = FxHashMap::default();
        let mut sparse: Vec<Vec<(usize, Value)>> = Vec::new();

        for record in records {
            let mut cells = Vec::new();
            for (name, value) in record {
                let name = name.into();
                let idx = match index.get(&name) {
                    Some(&idx) => idx,
                    None => {
                        let idx = columns.len();
                        index.insert(name.clone(), idx);
                        columns.push(name);
                        idx
                    }
                };
                cells.push((idx, value.into()));
            }
            sparse.push(cells);
        }

        let width = columns.len();
        let rows = sparse
            .into_iter()
            .map(|cells| {
                let mut row = vec![Value::Null; width];
                for (idx, value) in cells {
                    row[idx] = value;
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    /// Internal constructor for callers that already guarantee the invariants.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, idx: usize) -> Option<Row<'_>> {
        self.rows.get(idx).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub(crate) fn raw_rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Value at (`row`, `column`), if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>, LinkError> {
        let col = self
            .column_index(name)
            .ok_or_else(|| LinkError::MissingColumn(name.into()))?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// Copy of this table with one extra column appended.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Table, LinkError> {
        if self.has_column(name) {
            return Err(LinkError::DuplicateColumn(name.into()));
        }
        if values.len() != self.rows.len() {
            return Err(LinkError::RowWidth {
                row: values.len().min(self.rows.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, v)| {
                let mut row = row.clone();
                row.push(v);
                row
            })
            .collect();
        Ok(Table { columns, rows })
    }

    /// Remove a column, if present.
    pub fn without_column(mut self, name: &str) -> Table {
        if let Some(col) = self.column_index(name) {
            self.columns.remove(col);
            for row in &mut self.rows {
                row.remove(col);
            }
        }
        self
    }

    /// Project onto the named columns, in the given order.
    pub fn select(&self, columns: &[&str]) -> Result<Table, LinkError> {
        let idx = columns
            .iter()
            .map(|c| {
                self.column_index(c)
                    .ok_or_else(|| LinkError::MissingColumn((*c).into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|r| idx.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Table::new(columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    /// Rows at the given positions, in the given order.
    pub fn take(&self, indices: &[usize]) -> Table {
        let rows = indices
            .iter()
            .filter_map(|&i| self.rows.get(i).cloned())
            .collect();
        Table::from_parts(self.columns.clone(), rows)
    }
}

impl Serialize for Table {
    /// Serializes as an array of objects keyed by column name, in column order.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in self.rows() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// Borrowed view of one table row, addressable by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Text value of a column; `None` when missing or not text.
    pub fn str(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(Value::as_str)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::from_records(vec![
            vec![("id", Value::from(1)), ("name", Value::from("Ann"))],
            vec![("id", Value::from(2)), ("city", Value::from("Oslo"))],
        ])
    }

    #[test]
    fn from_records_first_seen_columns() {
        let t = people();
        assert_eq!(t.columns(), &["id", "name", "city"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.value(0, "city"), Some(&Value::Null));
        assert_eq!(t.value(1, "city"), Some(&Value::from("Oslo")));
        assert_eq!(t.value(1, "name"), Some(&Value::Null));
    }

    #[test]
    fn new_rejects_duplicate_columns_and_ragged_rows() {
        let err = Table::new(vec!["a".into(), "a".into()], vec![]).unwrap_err();
        assert!(matches!(err, LinkError::DuplicateColumn(ref c) if c == "a"));

        let err = Table::new(vec!["a".into(), "b".into()], vec![vec![Value::from(1)]]).unwrap_err();
        assert!(matches!(err, LinkError::RowWidth { row: 0, expected: 2, found: 1 }));
    }

    #[test]
    fn with_column_leaves_original_untouched() {
        let t = people();
        let extended = t
            .with_column("tmp", vec![Value::from("x"), Value::from("y")])
            .unwrap();
        assert_eq!(extended.width(), 4);
        assert_eq!(t.width(), 3);
        assert!(!t.has_column("tmp"));
        assert_eq!(extended.without_column("tmp"), t);
    }

    #[test]
    fn row_lookup_by_name() {
        let t = people();
        let row = t.row(0).unwrap();
        assert_eq!(row.str("name"), Some("Ann"));
        assert_eq!(row.get("id"), Some(&Value::from(1)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn select_and_take() {
        let t = people();
        let s = t.select(&["name", "id"]).unwrap();
        assert_eq!(s.columns(), &["name", "id"]);
        assert!(t.select(&["nope"]).is_err());

        let taken = t.take(&[1]);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken.value(0, "id"), Some(&Value::from(2)));
    }

    #[test]
    fn serializes_rows_as_ordered_objects() {
        let t = people();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(
            json,
            r#"[{"id":1,"name":"Ann","city":null},{"id":2,"name":null,"city":"Oslo"}]"#
        );
    }
}
