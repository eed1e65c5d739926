use crate::cell::{CellValue, Field};
use crate::error::MasterError;
use crate::loader::{self, RawSheet};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Reference table of weldable units, loaded from the master workbook.
///
/// Columns keep sheet order. Rows are padded to the column count so that a
/// cell is always addressable by column index.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

/// One master row as ordered column/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MasterRecord {
    pub fields: Vec<Field>,
}

/// Where the current master came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MasterSource {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "Auto-Repo")]
    AutoRepo,
    #[serde(rename = "Manual-Upload")]
    ManualUpload,
}

/// What the sidebar indicator shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MasterStatus {
    pub loaded: bool,
    pub source: MasterSource,
    pub rows: usize,
}

impl MasterStatus {
    pub fn new(master: Option<&MasterTable>, source: MasterSource) -> Self {
        MasterStatus {
            loaded: master.is_some(),
            source,
            rows: master.map_or(0, MasterTable::len),
        }
    }
}

impl MasterRecord {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|field| field.column == column)
            .map(|field| &field.value)
    }
}

impl MasterTable {
    /// Build a table from column names and rows
    ///
    /// Column names are trimmed; blank names become `Unnamed: <index>` and
    /// repeated names get `.1`, `.2`, ... suffixes. Rows are padded or cut to
    /// the column count and rows with no value at all are dropped.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns = normalize_columns(columns);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .filter(|row| !row.iter().all(CellValue::is_blank))
            .collect();

        MasterTable { columns, rows }
    }

    pub fn from_path(path: impl AsRef<Path>, header_row: usize) -> Result<Self, MasterError> {
        loader::read_first_sheet_from_path(path, header_row).map(Self::from_sheet)
    }

    pub fn from_bytes(bytes: Vec<u8>, header_row: usize) -> Result<Self, MasterError> {
        loader::read_first_sheet(bytes, header_row).map(Self::from_sheet)
    }

    fn from_sheet(sheet: RawSheet) -> Self {
        let columns = sheet.header.iter().map(ToString::to_string).collect();
        Self::new(columns, sheet.rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn record(&self, index: usize) -> Option<MasterRecord> {
        let row = self.rows.get(index)?;
        Some(MasterRecord {
            fields: self
                .columns
                .iter()
                .zip(row)
                .map(|(column, value)| Field::new(column.clone(), value.clone()))
                .collect(),
        })
    }
}

fn normalize_columns(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    columns
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let name = name.trim();
            let base = if name.is_empty() {
                format!("Unnamed: {index}")
            } else {
                name.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{base}.{count}")
            };
            *count += 1;
            unique
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::workbook;

    #[test]
    fn trims_column_names_on_load() {
        let bytes = workbook(&[&["  LINE No ", "Weld No\t"], &["L1", "W1"]]);
        let master = MasterTable::from_bytes(bytes, 1).unwrap();

        assert_eq!(master.columns(), ["LINE No", "Weld No"]);
        assert_eq!(master.len(), 1);
    }

    #[test]
    fn blank_and_repeated_headers_get_unique_names() {
        let master = MasterTable::new(
            vec!["TYPE".into(), "".into(), "TYPE".into(), "TYPE ".into()],
            vec![],
        );
        assert_eq!(
            master.columns(),
            ["TYPE", "Unnamed: 1", "TYPE.1", "TYPE.2"]
        );
    }

    #[test]
    fn short_rows_are_padded_and_blank_rows_dropped() {
        let master = MasterTable::new(
            vec!["A".into(), "B".into()],
            vec![
                vec![CellValue::text("x")],
                vec![CellValue::Empty, CellValue::text(" ")],
            ],
        );
        assert_eq!(master.rows(), [vec![CellValue::text("x"), CellValue::Empty]]);
    }

    #[test]
    fn record_pairs_columns_with_values() {
        let master = MasterTable::new(
            vec!["LINE No".into(), "WELDER".into()],
            vec![vec![CellValue::text("L1"), CellValue::text("Alice")]],
        );
        let record = master.record(0).unwrap();

        assert_eq!(record.get("WELDER"), Some(&CellValue::text("Alice")));
        assert_eq!(record.get("TKH"), None);
        assert!(master.record(1).is_none());
    }

    #[test]
    fn status_reflects_master() {
        let master = MasterTable::new(vec!["A".into()], vec![vec![CellValue::Int(1)]]);
        let status = MasterStatus::new(Some(&master), MasterSource::AutoRepo);
        assert_eq!(
            status,
            MasterStatus {
                loaded: true,
                source: MasterSource::AutoRepo,
                rows: 1
            }
        );
        assert!(!MasterStatus::new(None, MasterSource::None).loaded);
    }
}
