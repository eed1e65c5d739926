//! The session's production log.
//!
//! Entries are rows of a table whose columns grow as new fields show up:
//! the first entry fixes the base layout, later entries that carry extra
//! auto-fill or custom fields append columns, and older rows read those
//! columns as empty.

use crate::cell::{CellValue, Field};
use crate::downloader;
use crate::error::{EntryError, ExportError, MasterError};
use crate::loader;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const DATE_COLUMN: &str = "Date";
pub const LINE_COLUMN: &str = "Line No";
pub const WELD_COLUMN: &str = "Weld No";
pub const HEAT_NO_1_COLUMN: &str = "HEAT NO TYPE 1";
pub const HEAT_NO_2_COLUMN: &str = "HEAT NO TYPE 2";
pub const WELDER_COLUMN: &str = "WELDER";
pub const FILLER_COLUMN: &str = "Filler";
pub const RESULT_COLUMN: &str = "Result";

/// Log columns every entry carries, in order.
pub const FIXED_COLUMNS: [&str; 8] = [
    DATE_COLUMN,
    LINE_COLUMN,
    WELD_COLUMN,
    HEAT_NO_1_COLUMN,
    HEAT_NO_2_COLUMN,
    WELDER_COLUMN,
    FILLER_COLUMN,
    RESULT_COLUMN,
];

const DATE_FORMAT: &str = "%d/%m/%Y";
const DEFAULT_WELDER: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeldResult {
    #[default]
    Accepted,
    Rejected,
    Pending,
}

impl WeldResult {
    pub const ALL: [WeldResult; 3] = [
        WeldResult::Accepted,
        WeldResult::Rejected,
        WeldResult::Pending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WeldResult::Accepted => "Accepted",
            WeldResult::Rejected => "Rejected",
            WeldResult::Pending => "Pending",
        }
    }
}

/// A value typed into one of the custom free-text fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomValue {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// What the entry form submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryForm {
    #[serde(default = "today")]
    pub date: NaiveDate,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub weld: String,
    #[serde(default)]
    pub heat_no_1: String,
    #[serde(default)]
    pub heat_no_2: String,
    #[serde(default = "default_welder")]
    pub welder: String,
    #[serde(default)]
    pub filler: String,
    #[serde(default)]
    pub result: WeldResult,
    #[serde(default)]
    pub custom: Vec<CustomValue>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn default_welder() -> String {
    DEFAULT_WELDER.to_string()
}

impl EntryForm {
    /// A form with the given selection and every other field at its default.
    pub fn new(line: impl Into<String>, weld: impl Into<String>) -> Self {
        EntryForm {
            date: today(),
            line: line.into(),
            weld: weld.into(),
            heat_no_1: String::new(),
            heat_no_2: String::new(),
            welder: default_welder(),
            filler: String::new(),
            result: WeldResult::default(),
            custom: Vec::new(),
        }
    }

    pub fn has_selection(&self) -> bool {
        !self.line.trim().is_empty() && !self.weld.trim().is_empty()
    }

    fn fixed_fields(&self) -> Vec<Field> {
        vec![
            Field::text(DATE_COLUMN, self.date.format(DATE_FORMAT).to_string()),
            Field::text(LINE_COLUMN, self.line.as_str()),
            Field::text(WELD_COLUMN, self.weld.as_str()),
            Field::text(HEAT_NO_1_COLUMN, self.heat_no_1.as_str()),
            Field::text(HEAT_NO_2_COLUMN, self.heat_no_2.as_str()),
            Field::text(WELDER_COLUMN, self.welder.as_str()),
            Field::text(FILLER_COLUMN, self.filler.as_str()),
            Field::text(RESULT_COLUMN, self.result.as_str()),
        ]
    }
}

/// Tabular form of the log, as shown in the editable grid and exported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl LogTable {
    /// Read back a table written by [`downloader::to_xlsx`].
    pub fn from_xlsx(bytes: Vec<u8>) -> Result<Self, MasterError> {
        let sheet = loader::read_first_sheet(bytes, loader::DEFAULT_HEADER_ROW)?;
        let mut table = LogTable {
            columns: sheet.header.iter().map(ToString::to_string).collect(),
            rows: sheet.rows,
        };
        table.normalize();
        Ok(table)
    }

    /// Every cell in its stringified form, header first.
    pub fn to_strings(&self) -> Vec<Vec<String>> {
        std::iter::once(self.columns.clone())
            .chain(
                self.rows
                    .iter()
                    .map(|row| row.iter().map(ToString::to_string).collect()),
            )
            .collect()
    }

    fn normalize(&mut self) {
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, CellValue::Empty);
        }
    }

    fn column_or_insert(&mut self, name: &str) -> usize {
        if let Some(index) = self.columns.iter().position(|column| column == name) {
            return index;
        }
        self.columns.push(name.to_string());
        self.normalize();
        self.columns.len() - 1
    }

    fn push(&mut self, fields: Vec<Field>) {
        let positions: Vec<usize> = fields
            .iter()
            .map(|field| self.column_or_insert(&field.column))
            .collect();
        let mut row = vec![CellValue::Empty; self.columns.len()];
        for (position, field) in positions.into_iter().zip(fields) {
            row[position] = field.value;
        }
        self.rows.push(row);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductionLog {
    table: LogTable,
}

impl ProductionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> &LogTable {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.rows.is_empty()
    }

    /// Append one entry built from a submitted form
    ///
    /// Auto-fill values never overwrite a fixed field. Custom values are
    /// applied last and replace a field of the same name.
    ///
    /// # Returns
    /// * `Result<usize, EntryError>` - Row index of the new entry, or
    ///   `MissingSelection` when line or weld is empty (the log is untouched)
    pub fn append(&mut self, form: &EntryForm, auto_fill: Vec<Field>) -> Result<usize, EntryError> {
        if !form.has_selection() {
            return Err(EntryError::MissingSelection);
        }

        let mut fields = form.fixed_fields();
        for field in auto_fill {
            if !fields.iter().any(|existing| existing.column == field.column) {
                fields.push(field);
            }
        }
        for custom in &form.custom {
            let value = CellValue::text(custom.value.as_str());
            match fields.iter_mut().find(|existing| existing.column == custom.name) {
                Some(existing) => existing.value = value,
                None => fields.push(Field::new(custom.name.as_str(), value)),
            }
        }

        self.table.push(fields);
        Ok(self.table.rows.len() - 1)
    }

    /// Replace the whole log with an edited grid
    ///
    /// No validation is applied; rows are only padded or cut to the column
    /// count. Returns `false` when the edited grid equals the current log.
    pub fn replace(&mut self, mut table: LogTable) -> bool {
        let width = table.columns.len();
        for row in &mut table.rows {
            row.resize(width, CellValue::Empty);
        }
        if table == self.table {
            return false;
        }
        self.table = table;
        true
    }

    pub fn export(&self) -> Result<Vec<u8>, ExportError> {
        downloader::to_xlsx(&self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(line: &str, weld: &str) -> EntryForm {
        EntryForm {
            date: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            heat_no_1: "H-100".into(),
            filler: "E7018".into(),
            ..EntryForm::new(line, weld)
        }
    }

    #[test]
    fn append_without_selection_leaves_log_unchanged() {
        let mut log = ProductionLog::new();
        assert_eq!(log.append(&form("", "W1"), vec![]), Err(EntryError::MissingSelection));
        assert_eq!(log.append(&form("L1", "  "), vec![]), Err(EntryError::MissingSelection));
        assert_eq!(log.len(), 0);

        log.append(&form("L1", "W1"), vec![]).unwrap();
        assert_eq!(log.append(&form("", ""), vec![]), Err(EntryError::MissingSelection));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn fixed_fields_come_first_in_order() {
        let mut log = ProductionLog::new();
        log.append(&form("L1", "W1"), vec![]).unwrap();

        assert_eq!(log.table().columns, FIXED_COLUMNS);
        assert_eq!(
            log.table().to_strings()[1],
            ["31/01/2025", "L1", "W1", "H-100", "", "User", "E7018", "Accepted"]
        );
    }

    #[test]
    fn auto_fill_never_overwrites_fixed_fields() {
        let mut log = ProductionLog::new();
        let auto = vec![
            Field::text("WELDER", "Alice"),
            Field::new("TKH", CellValue::Float(6.35)),
        ];
        log.append(&form("L1", "W1"), auto).unwrap();

        let table = log.table();
        assert_eq!(table.columns.last().map(String::as_str), Some("TKH"));
        assert_eq!(table.rows[0][5], CellValue::text("User"));
        assert_eq!(table.rows[0][8], CellValue::Float(6.35));
    }

    #[test]
    fn custom_values_follow_auto_fill() {
        let mut log = ProductionLog::new();
        let mut entry = form("L1", "W1");
        entry.custom = vec![
            CustomValue {
                name: "Shift".into(),
                value: "Night".into(),
            },
            CustomValue {
                name: "TKH".into(),
                value: "7".into(),
            },
        ];
        log.append(&entry, vec![Field::text("TKH", "6")]).unwrap();

        let table = log.table();
        assert_eq!(&table.columns[8..], ["TKH", "Shift"]);
        assert_eq!(&table.rows[0][8..], [CellValue::text("7"), CellValue::text("Night")]);
    }

    #[test]
    fn new_columns_pad_earlier_rows() {
        let mut log = ProductionLog::new();
        log.append(&form("L1", "W1"), vec![]).unwrap();
        log.append(&form("L1", "W2"), vec![Field::text("SYSTEM", "Steam")]).unwrap();

        let table = log.table();
        assert_eq!(table.columns.len(), 9);
        assert_eq!(table.rows[0].len(), 9);
        assert_eq!(table.rows[0][8], CellValue::Empty);
        assert_eq!(table.rows[1][8], CellValue::text("Steam"));
    }

    #[test]
    fn replace_detects_changes() {
        let mut log = ProductionLog::new();
        log.append(&form("L1", "W1"), vec![]).unwrap();

        assert!(!log.replace(log.table().clone()));

        let mut edited = log.table().clone();
        edited.rows[0][7] = CellValue::text("Whatever");
        edited.rows.push(vec![CellValue::text("01/02/2025")]);
        assert!(log.replace(edited));
        assert_eq!(log.len(), 2);
        assert_eq!(log.table().rows[0][7], CellValue::text("Whatever"));
        assert_eq!(log.table().rows[1].len(), 8);

        assert!(log.replace(LogTable::default()));
        assert!(log.is_empty());
    }

    #[test]
    fn export_reparses_to_the_same_strings() {
        let mut log = ProductionLog::new();
        log.append(&form("L1", "W1"), vec![Field::new("TKH", CellValue::Float(6.35))])
            .unwrap();
        log.append(&form("10", "W2"), vec![Field::new("WELD INCHES", CellValue::Int(8))])
            .unwrap();
        let mut entry = form("L2", "W3");
        entry.result = WeldResult::Rejected;
        entry.custom = vec![CustomValue {
            name: "Σχόλια".into(),
            value: "ρωγμή".into(),
        }];
        log.append(&entry, vec![]).unwrap();

        let bytes = log.export().unwrap();
        let back = LogTable::from_xlsx(bytes).unwrap();
        assert_eq!(back.to_strings(), log.table().to_strings());
    }

    #[test]
    fn export_keeps_integers_beyond_f64_precision() {
        let mut log = ProductionLog::new();
        log.replace(LogTable {
            columns: vec!["HEAT NO".into(), "Qty".into()],
            rows: vec![
                vec![CellValue::Int(12345678901234567), CellValue::Int(42)],
                vec![CellValue::Int(-9007199254740993), CellValue::Int(9007199254740992)],
            ],
        });

        let back = LogTable::from_xlsx(log.export().unwrap()).unwrap();
        assert_eq!(back.to_strings(), log.table().to_strings());
        assert_eq!(back.to_strings()[1][0], "12345678901234567");
    }
}
