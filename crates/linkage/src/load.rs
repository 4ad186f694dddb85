//! CSV and JSON ingestion, CSV output.

use std::io;
use std::path::Path;

use serde_json::Value as Json;

use crate::error::LinkError;
use crate::table::Table;
use crate::value::Value;

/// Cell inference: empty is null, then integer, then finite float, then text.
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Int(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::Text(raw.to_string()),
    }
}

/// Load CSV data with a header row into a table.
pub fn load_csv_table(csv_data: &str) -> Result<Table, LinkError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| LinkError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| LinkError::Io(e.to_string()))?;
        rows.push(record.iter().map(parse_cell).collect());
    }

    Table::new(headers, rows)
}

pub fn load_csv_file(path: &Path) -> Result<Table, LinkError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| LinkError::Io(format!("{}: {e}", path.display())))?;
    load_csv_table(&data)
}

fn json_cell(value: Json) -> Result<Value, LinkError> {
    match value {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Text(b.to_string())),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::from)
                .ok_or_else(|| LinkError::Io(format!("unsupported number {n}"))),
        },
        Json::String(s) => Ok(Value::Text(s)),
        other => Err(LinkError::Io(format!(
            "nested values are not supported: {other}"
        ))),
    }
}

/// Load a JSON array of flat objects. Columns follow first-seen key order.
pub fn load_json_table(json: &str) -> Result<Table, LinkError> {
    let records: Vec<serde_json::Map<String, Json>> =
        serde_json::from_str(json).map_err(|e| LinkError::Io(e.to_string()))?;
    let records = records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .map(|(k, v)| Ok((k, json_cell(v)?)))
                .collect::<Result<Vec<(String, Value)>, LinkError>>()
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Table::from_records(records))
}

/// Write a table as CSV with a header row. Nulls become empty cells.
pub fn write_csv<W: io::Write>(table: &Table, writer: W) -> Result<(), LinkError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.columns())
        .map_err(|e| LinkError::Io(e.to_string()))?;
    for row in table.rows() {
        let cells = row
            .values()
            .iter()
            .map(|v| v.to_text().map(|t| t.into_owned()).unwrap_or_default());
        out.write_record(cells)
            .map_err(|e| LinkError::Io(e.to_string()))?;
    }
    out.flush().map_err(|e| LinkError::Io(e.to_string()))
}
