//! Line/weld lookups over the master table.
//!
//! All matching is done on the stringified cell value, so a numeric line `12`
//! in the sheet matches the selection `"12"`. When several rows share the same
//! (line, weld) pair the first one in sheet order wins.

use crate::cell::Field;
use crate::master::{MasterRecord, MasterTable};
use serde::Serialize;
use std::collections::BTreeSet;

/// Join engine bound to one master table and one key mapping.
///
/// If either key column is missing from the master every query returns an
/// empty result.
#[derive(Debug, Clone, Copy)]
pub struct Lookup<'a> {
    master: &'a MasterTable,
    keys: Option<(usize, usize)>,
}

/// Reference values for the info panel, in configured column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferencePanel {
    pub items: Vec<Field>,
}

impl ReferencePanel {
    /// Split into two display rows: the first takes `ceil(n / 2)` items.
    pub fn rows(&self) -> (&[Field], &[Field]) {
        self.items.split_at(self.items.len().div_ceil(2))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'a> Lookup<'a> {
    pub fn new(master: &'a MasterTable, line_column: &str, weld_column: &str) -> Self {
        let keys = master
            .column_index(line_column)
            .zip(master.column_index(weld_column));
        Lookup { master, keys }
    }

    /// Unique line values, sorted as strings ("10" sorts before "2").
    ///
    /// Rows whose line cell is blank are left out: there is nothing a user
    /// could pick for them. They still count for [`Lookup::find_row`].
    pub fn distinct_lines(&self) -> Vec<String> {
        let Some((line, _)) = self.keys else {
            return Vec::new();
        };
        self.master
            .rows()
            .iter()
            .filter(|row| !row[line].is_blank())
            .map(|row| row[line].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Unique weld values among rows of the given line, sorted as strings.
    /// Blank weld cells are left out the same way.
    pub fn distinct_welds(&self, line_value: &str) -> Vec<String> {
        let Some((line, weld)) = self.keys else {
            return Vec::new();
        };
        self.master
            .rows()
            .iter()
            .filter(|row| row[line].to_string() == line_value && !row[weld].is_blank())
            .map(|row| row[weld].to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn find_index(&self, line_value: &str, weld_value: &str) -> Option<usize> {
        let (line, weld) = self.keys?;
        self.master.rows().iter().position(|row| {
            row[line].to_string() == line_value && row[weld].to_string() == weld_value
        })
    }

    /// First row whose line and weld both match.
    pub fn find_row(&self, line_value: &str, weld_value: &str) -> Option<MasterRecord> {
        self.find_index(line_value, weld_value)
            .and_then(|index| self.master.record(index))
    }

    /// Matched row restricted to `columns`, keeping their order and skipping unknown names.
    pub fn project(&self, line_value: &str, weld_value: &str, columns: &[String]) -> Vec<Field> {
        let Some(index) = self.find_index(line_value, weld_value) else {
            return Vec::new();
        };
        let row = &self.master.rows()[index];
        columns
            .iter()
            .filter_map(|name| {
                let position = self.master.column_index(name)?;
                Some(Field::new(name.clone(), row[position].clone()))
            })
            .collect()
    }

    pub fn reference_panel(
        &self,
        line_value: &str,
        weld_value: &str,
        reference_columns: &[String],
    ) -> ReferencePanel {
        ReferencePanel {
            items: self.project(line_value, weld_value, reference_columns),
        }
    }

    /// Values copied into a new log entry at submission time.
    pub fn auto_fill_values(
        &self,
        line_value: &str,
        weld_value: &str,
        auto_fill_columns: &[String],
    ) -> Vec<Field> {
        self.project(line_value, weld_value, auto_fill_columns)
    }
}
