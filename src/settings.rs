use crate::error::SettingsError;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::Path;

pub const DEFAULT_LINE_COLUMN: &str = "LINE No";
pub const DEFAULT_WELD_COLUMN: &str = "Weld No";
pub const DEFAULT_REFERENCE_COLUMNS: [&str; 8] = [
    "TYPE 1",
    "Material 1",
    "TYPE 2",
    "Material 2",
    "TKH",
    "WELD INCHES",
    "SYSTEM",
    "WELDER",
];

/// Column mapping and form configuration, persisted as JSON
///
/// Column lists may name columns the current master does not have. They stay
/// in the file and are filtered out at use time through the `active_*`
/// helpers, so they apply again when a matching master is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master column holding the line number
    #[serde(rename = "col_line_name")]
    pub line_column: String,

    /// Master column holding the weld number
    #[serde(rename = "col_weld_name")]
    pub weld_column: String,

    /// Master columns copied into every new log entry
    pub auto_fill_columns: Vec<String>,

    /// Master columns shown in the read-only info panel
    #[serde(rename = "production_ref_columns")]
    pub reference_columns: Vec<String>,

    /// Extra free-text fields on the entry form
    #[serde(rename = "custom_free_columns")]
    pub custom_columns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            line_column: DEFAULT_LINE_COLUMN.to_string(),
            weld_column: DEFAULT_WELD_COLUMN.to_string(),
            auto_fill_columns: Vec::new(),
            reference_columns: DEFAULT_REFERENCE_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            custom_columns: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    ///
    /// A missing or unreadable file, or content that does not parse, yields
    /// the defaults. Fields absent from an otherwise valid file take their
    /// individual defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!("settings {} not read, using defaults: {e}", path.display());
                return Self::default();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            debug!("settings {} not parsed, using defaults: {e}", path.display());
            Self::default()
        })
    }

    /// Write all five fields to `path`, replacing whatever was there.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let mut buffer = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;

        fs::write(path, buffer).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Split comma-separated field names, dropping blanks.
    pub fn parse_custom_columns(text: &str) -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn custom_columns_text(&self) -> String {
        self.custom_columns.join(", ")
    }

    pub fn active_auto_fill(&self, master_columns: &[String]) -> Vec<String> {
        active_columns(&self.auto_fill_columns, master_columns)
    }

    pub fn active_reference(&self, master_columns: &[String]) -> Vec<String> {
        active_columns(&self.reference_columns, master_columns)
    }
}

/// Configured names that exist in the master, in configured order.
pub fn active_columns(configured: &[String], master_columns: &[String]) -> Vec<String> {
    configured
        .iter()
        .filter(|name| master_columns.contains(name))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            line_column: "Γραμμή".into(),
            weld_column: "Weld No".into(),
            auto_fill_columns: Vec::new(),
            reference_columns: names(&["TYPE 1", "Υλικό"]),
            custom_columns: Vec::new(),
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path), settings);
    }

    #[test]
    fn file_is_indented_and_keeps_unicode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            custom_columns: names(&["Σχόλια"]),
            ..Settings::default()
        };
        settings.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"col_line_name\": \"LINE No\""));
        assert!(text.contains("Σχόλια"));
    }

    #[test]
    fn save_overwrites_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Settings {
            auto_fill_columns: names(&["TKH", "SYSTEM", "WELD INCHES"]),
            ..Settings::default()
        }
        .save(&path)
        .unwrap();

        let smaller = Settings::default();
        smaller.save(&path).unwrap();
        assert_eq!(Settings::load(&path), smaller);
    }

    #[test]
    fn missing_or_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(Settings::load(&path), Settings::default());

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());

        fs::write(&path, "[1, 2]").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn absent_fields_take_their_own_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"col_weld_name": "WELD", "custom_free_columns": ["Shift"]}"#).unwrap();

        let settings = Settings::load(&path);
        assert_eq!(settings.line_column, DEFAULT_LINE_COLUMN);
        assert_eq!(settings.weld_column, "WELD");
        assert_eq!(settings.reference_columns.len(), 8);
        assert_eq!(settings.custom_columns, ["Shift"]);
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("settings.json");
        let err = Settings::default().save(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Write { .. }));
    }

    #[test]
    fn custom_columns_parse_and_render() {
        assert_eq!(
            Settings::parse_custom_columns(" Shift, ,Inspector ,,NDT "),
            ["Shift", "Inspector", "NDT"]
        );
        assert!(Settings::parse_custom_columns(" , ").is_empty());

        let settings = Settings {
            custom_columns: names(&["Shift", "NDT"]),
            ..Settings::default()
        };
        assert_eq!(settings.custom_columns_text(), "Shift, NDT");
    }

    #[test]
    fn active_lists_drop_unknown_names_but_keep_order() {
        let settings = Settings::default();
        let master = names(&["WELDER", "LINE No", "TKH", "TYPE 1"]);
        assert_eq!(settings.active_reference(&master), ["TYPE 1", "TKH", "WELDER"]);
        assert_eq!(settings.reference_columns.len(), 8);
        assert!(settings.active_auto_fill(&master).is_empty());
    }
}
