//! Flatten the filter and type tables into a report.

use std::collections::{BTreeSet, HashSet};
use std::io::Write;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use super::reader::ComponentTable;

/// Name of the filter prop holding the whitespace-separated flag list.
const FLAGS_FIELD: &str = "Flags";

/// Name of the filter prop referencing the type table.
const TYPE_FIELD: &str = "Type";

/// Column selection and flag filtering for a report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReportOptions {
    /// Filter fields to show, in order.
    pub fields: Vec<String>,
    /// Flags kept in the `Flags` column.
    pub flags: Vec<String>,
    /// Show every filter field, ignoring `fields`.
    pub all_fields: bool,
    /// Show every flag, ignoring `flags`.
    pub all_flags: bool,
    /// Column that rows are sorted by.
    pub key_field: String,
    /// Join type fields onto each filter row.
    pub show_type_fields: bool,
    /// Type fields to show, in order.
    pub type_fields: Vec<String>,
    /// Show every type field, ignoring `type_fields`.
    pub all_type_fields: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            fields: strings(&["DocumentService", "UIName", "Flags"]),
            flags: strings(&["IMPORT", "EXPORT", "DEFAULT", "PREFERRED"]),
            all_fields: false,
            all_flags: false,
            key_field: "DocumentService".to_string(),
            show_type_fields: false,
            type_fields: strings(&["Extensions", "MediaType"]),
            all_type_fields: false,
        }
    }
}

/// Errors from writing a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A header row plus data rows; `None` cells are missing values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Sorted union of the field names used by any entry.
fn available_fields(table: &ComponentTable) -> Vec<String> {
    table
        .values()
        .flat_map(|entry| entry.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Requested fields that actually occur, in requested order.
fn select_fields(requested: &[String], available: &[String]) -> Vec<String> {
    requested
        .iter()
        .map(|f| f.trim())
        .filter(|f| available.iter().any(|a| a == f))
        .map(str::to_string)
        .collect()
}

fn filter_flags(value: &str, allowed: &HashSet<&str>) -> String {
    value
        .split_whitespace()
        .filter(|flag| allowed.contains(flag))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join filters with their types and select columns.
///
/// Rows are sorted by the key column (then by the whole row) when the key
/// field is one of the columns, otherwise by the whole row.
#[must_use]
pub fn build_report(
    filters: &ComponentTable,
    types: &ComponentTable,
    options: &ReportOptions,
) -> Report {
    let mut fields = available_fields(filters);
    if !options.all_fields {
        fields = select_fields(&options.fields, &fields);
        if options.show_type_fields && !fields.iter().any(|f| f == TYPE_FIELD) {
            fields.push(TYPE_FIELD.to_string());
        }
    }

    let type_fields = if options.show_type_fields {
        let available = available_fields(types);
        if options.all_type_fields {
            available
        } else {
            select_fields(&options.type_fields, &available)
        }
    } else {
        Vec::new()
    };

    let allowed_flags: HashSet<&str> = options.flags.iter().map(|f| f.trim()).collect();
    let reduce_flags = !options.all_flags && fields.iter().any(|f| f == FLAGS_FIELD);

    let mut rows: Vec<Vec<Option<String>>> = filters
        .iter()
        .map(|(name, entry)| {
            let mut row = Vec::with_capacity(1 + fields.len() + type_fields.len());
            row.push(Some(name.clone()));

            for field in &fields {
                let value = entry.get(field).cloned().flatten();
                let value = match value {
                    Some(v) if reduce_flags && field == FLAGS_FIELD => {
                        Some(filter_flags(&v, &allowed_flags))
                    }
                    other => other,
                };
                row.push(value);
            }

            let type_entry = entry
                .get(TYPE_FIELD)
                .and_then(Option::as_deref)
                .and_then(|t| types.get(t));
            for field in &type_fields {
                row.push(type_entry.and_then(|t| t.get(field).cloned().flatten()));
            }

            row
        })
        .collect();

    let mut header = Vec::with_capacity(1 + fields.len() + type_fields.len());
    header.push("Name".to_string());
    header.extend(fields);
    header.extend(type_fields);

    match header.iter().position(|h| *h == options.key_field) {
        Some(key) => rows.sort_by(|a, b| a[key].cmp(&b[key]).then_with(|| a.cmp(b))),
        None => rows.sort(),
    }

    Report { header, rows }
}

impl Report {
    /// Write the report as CSV, header first.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReportError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(&self.header)?;
        for row in &self.rows {
            csv.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        csv.flush()?;
        Ok(())
    }

    /// Write the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }
}

/// One data row as a JSON object whose keys follow the header order.
struct JsonRow<'a> {
    header: &'a [String],
    cells: &'a [Option<String>],
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.header.len()))?;
        for (column, cell) in self.header.iter().zip(self.cells) {
            map.serialize_entry(column, cell)?;
        }
        map.end()
    }
}

/// Serializes as an array of row objects keyed by column name.
impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows.iter().map(|cells| JsonRow {
            header: &self.header,
            cells,
        }))
    }
}
