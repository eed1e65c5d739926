use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading a master workbook.
#[derive(Debug, Error)]
pub enum MasterError {
    /// The workbook file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not a workbook calamine understands.
    #[error("failed to parse workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook has no worksheets")]
    NoSheet,

    #[error("worksheet is empty")]
    EmptySheet,

    /// Header offset is 1-based and must fall inside the used rows.
    #[error("header row {row} is outside the worksheet (rows 1..={last})")]
    HeaderRow { row: usize, last: usize },
}

/// Errors raised while persisting settings. Loading never fails.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write settings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("must select Line and Weld")]
    MissingSelection,
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write xlsx: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("production log does not fit in a worksheet: {0}")]
    TooLarge(String),
}

/// Everything a session command can fail with.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Master(#[from] MasterError),

    #[error(transparent)]
    Entry(#[from] EntryError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("master spreadsheet is not loaded")]
    MasterNotLoaded,

    #[error("column '{0}' is not in the master spreadsheet")]
    UnknownColumn(String),
}
