/*!
# Weld Manager

A shop-floor data-entry service for recording weld production against a
reference ("master") spreadsheet.

## Overview

A user picks a line and a weld from the master workbook, sees the reference
values for that weld, records production entries (date, heat numbers, welder,
filler, result), fixes them inline in an editable grid and downloads the day's
log as an Excel file.

## Architecture

### Core
- **Master Dataset**: the first worksheet of the master workbook, with
  dynamic columns and a configurable header row
- **Lookup Engine**: distinct line/weld listings and first-match row lookup
  on stringified key values
- **Production Log**: append-only entry form plus whole-table replacement
  from the grid editor, exported to XLSX
- **Settings Store**: JSON file with the column mapping, auto-fill columns,
  reference columns and custom fields

### Web Layer
- **Technologies**: Rust, axum
- One isolated session per browser, keyed by cookie
- JSON endpoints for every mode (entry, lookup, settings), multipart master
  upload and XLSX download

## Modules

- **cell**: spreadsheet values and their string form
- **loader**: calamine-based worksheet reader
- **master**: master table, source tag and status
- **lookup**: line/weld join engine and reference panel
- **production**: entry form, log table and edits
- **downloader**: XLSX export
- **settings**: persisted column configuration
- **session**: per-user application state and commands
- **view**: derived data for each mode
- **config**: command-line/environment configuration
- **app**: routing and handlers (web feature)
*/

pub mod cell;
pub mod config;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod lookup;
pub mod master;
pub mod production;
pub mod session;
pub mod settings;
pub mod view;

#[cfg(feature = "web")]
pub mod app;

pub use cell::{CellValue, Field};
pub use config::AppConfig;
pub use error::{EntryError, ExportError, MasterError, SessionError, SettingsError};
pub use lookup::{Lookup, ReferencePanel};
pub use master::{MasterRecord, MasterSource, MasterStatus, MasterTable};
pub use production::{EntryForm, LogTable, ProductionLog, WeldResult};
pub use session::{Mode, Session};
pub use settings::Settings;
