use crate::config::AppConfig;
use crate::error::SessionError;
use crate::loader::DEFAULT_HEADER_ROW;
use crate::lookup::Lookup;
use crate::master::{MasterSource, MasterStatus, MasterTable};
use crate::production::{CustomValue, EntryForm, LogTable, ProductionLog};
use crate::settings::Settings;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The three views a user can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Entry,
    Lookup,
    Settings,
}

/// State owned by one user session
///
/// Every command runs against this struct; views are recomputed from it after
/// each command. Nothing here is shared with other sessions.
#[derive(Debug)]
pub struct Session {
    settings: Settings,
    settings_path: PathBuf,
    master: Option<MasterTable>,
    source: MasterSource,
    log: ProductionLog,
    mode: Mode,
}

impl Session {
    /// A session with the given settings, no master and an empty log.
    pub fn new(settings: Settings, settings_path: impl Into<PathBuf>) -> Self {
        Session {
            settings,
            settings_path: settings_path.into(),
            master: None,
            source: MasterSource::None,
            log: ProductionLog::new(),
            mode: Mode::default(),
        }
    }

    /// Load settings and try the well-known master file once.
    pub fn start(config: &AppConfig) -> Self {
        let mut session = Self::new(Settings::load(&config.settings), config.settings.clone());
        session.auto_load(&config.master);
        session
    }

    fn auto_load(&mut self, path: &Path) {
        match MasterTable::from_path(path, DEFAULT_HEADER_ROW) {
            Ok(master) => {
                info!("auto-loaded master {} ({} rows)", path.display(), master.len());
                self.master = Some(master);
                self.source = MasterSource::AutoRepo;
            }
            Err(e) => warn!("failed to auto-load master {}: {e}", path.display()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn master(&self) -> Option<&MasterTable> {
        self.master.as_ref()
    }

    pub fn master_status(&self) -> MasterStatus {
        MasterStatus::new(self.master.as_ref(), self.source)
    }

    pub fn log(&self) -> &ProductionLog {
        &self.log
    }

    /// Lookup engine for the current master and key mapping.
    pub fn lookup(&self) -> Option<Lookup<'_>> {
        self.master.as_ref().map(|master| {
            Lookup::new(master, &self.settings.line_column, &self.settings.weld_column)
        })
    }

    fn require_master(&self) -> Result<&MasterTable, SessionError> {
        self.master.as_ref().ok_or(SessionError::MasterNotLoaded)
    }

    /// Replace the master with an uploaded workbook
    ///
    /// On failure the previous master, if any, stays active.
    pub fn upload_master(
        &mut self,
        bytes: Vec<u8>,
        header_row: usize,
    ) -> Result<MasterStatus, SessionError> {
        let master = MasterTable::from_bytes(bytes, header_row)?;
        Ok(self.install_upload(master))
    }

    /// Replace the master with one the user uploaded and parsed elsewhere.
    pub fn install_upload(&mut self, master: MasterTable) -> MasterStatus {
        info!("manual master loaded ({} rows)", master.len());
        self.master = Some(master);
        self.source = MasterSource::ManualUpload;
        self.master_status()
    }

    /// Validate and append one entry, pulling auto-fill values from the master.
    pub fn submit_entry(&mut self, mut form: EntryForm) -> Result<usize, SessionError> {
        form.custom = self
            .settings
            .custom_columns
            .iter()
            .map(|name| CustomValue {
                name: name.clone(),
                value: form
                    .custom
                    .iter()
                    .find(|custom| &custom.name == name)
                    .map(|custom| custom.value.clone())
                    .unwrap_or_default(),
            })
            .collect();

        let auto_fill = match (self.lookup(), self.settings.auto_fill_columns.is_empty()) {
            (Some(lookup), false) => {
                lookup.auto_fill_values(&form.line, &form.weld, &self.settings.auto_fill_columns)
            }
            _ => Vec::new(),
        };

        Ok(self.log.append(&form, auto_fill)?)
    }

    /// Take the edited grid as the new log. Returns whether it changed.
    pub fn edit_log(&mut self, table: LogTable) -> bool {
        self.log.replace(table)
    }

    pub fn export_log(&self) -> Result<Vec<u8>, SessionError> {
        Ok(self.log.export()?)
    }

    /// Pick the line/weld key columns. Both must exist in the master.
    pub fn set_mapping(
        &mut self,
        line_column: &str,
        weld_column: &str,
    ) -> Result<(), SessionError> {
        let master = self.require_master()?;
        for column in [line_column, weld_column] {
            if !master.has_column(column) {
                return Err(SessionError::UnknownColumn(column.to_string()));
            }
        }
        self.settings.line_column = line_column.to_string();
        self.settings.weld_column = weld_column.to_string();
        self.save_settings()
    }

    /// Keep only columns the master has; the selection comes from its header.
    pub fn set_auto_fill(&mut self, columns: Vec<String>) -> Result<(), SessionError> {
        self.settings.auto_fill_columns = self.known_columns(columns)?;
        self.save_settings()
    }

    pub fn set_reference(&mut self, columns: Vec<String>) -> Result<(), SessionError> {
        self.settings.reference_columns = self.known_columns(columns)?;
        self.save_settings()
    }

    pub fn set_custom_columns(&mut self, text: &str) -> Result<(), SessionError> {
        self.settings.custom_columns = Settings::parse_custom_columns(text);
        self.save_settings()
    }

    fn known_columns(&self, columns: Vec<String>) -> Result<Vec<String>, SessionError> {
        let master = self.require_master()?;
        Ok(columns
            .into_iter()
            .filter(|column| master.has_column(column))
            .collect())
    }

    /// Write the in-memory settings to disk.
    pub fn save_settings(&self) -> Result<(), SessionError> {
        self.settings.save(&self.settings_path)?;
        info!("settings saved to {}", self.settings_path.display());
        Ok(())
    }
}
