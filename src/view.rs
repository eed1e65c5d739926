//! Read-only view data for each mode, rebuilt from session state on every request.

use crate::cell::Field;
use crate::lookup::ReferencePanel;
use crate::master::{MasterRecord, MasterStatus};
use crate::production::{LogTable, WeldResult};
use crate::session::{Mode, Session};
use serde::{Deserialize, Serialize};

/// Current line/weld picks. Blank strings count as "nothing selected".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Selection {
    pub line: Option<String>,
    pub weld: Option<String>,
}

impl Selection {
    pub fn new(line: &str, weld: &str) -> Self {
        Selection {
            line: Some(line.to_string()),
            weld: Some(weld.to_string()),
        }
    }

    pub fn line(&self) -> Option<&str> {
        self.line.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// The weld only counts once a line is picked.
    pub fn weld(&self) -> Option<&str> {
        self.line()?;
        self.weld.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn both(&self) -> Option<(&str, &str)> {
        self.line().zip(self.weld())
    }
}

/// Reference values laid out in two display rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelView {
    pub first: Vec<Field>,
    pub second: Vec<Field>,
}

impl From<&ReferencePanel> for PanelView {
    fn from(panel: &ReferencePanel) -> Self {
        let (first, second) = panel.rows();
        PanelView {
            first: first.to_vec(),
            second: second.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryView {
    pub status: MasterStatus,
    /// No master: line and weld are typed in by hand.
    pub manual_keys: bool,
    pub lines: Vec<String>,
    pub welds: Vec<String>,
    pub reference: Option<PanelView>,
    pub results: Vec<WeldResult>,
    pub custom_columns: Vec<String>,
    pub log: LogTable,
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupView {
    pub status: MasterStatus,
    pub lines: Vec<String>,
    pub welds: Vec<String>,
    pub record: Option<MasterRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingsView {
    pub status: MasterStatus,
    pub columns: Vec<String>,
    pub line_index: usize,
    pub weld_index: usize,
    pub auto_fill: Vec<String>,
    pub reference: Vec<String>,
    pub custom_text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum View {
    Entry(EntryView),
    Lookup(LookupView),
    Settings(SettingsView),
}

/// Build the view for the session's current mode.
pub fn build(session: &Session, selection: &Selection) -> View {
    match session.mode() {
        Mode::Entry => View::Entry(entry_view(session, selection)),
        Mode::Lookup => View::Lookup(lookup_view(session, selection)),
        Mode::Settings => View::Settings(settings_view(session)),
    }
}

fn welds_for(session: &Session, selection: &Selection) -> Vec<String> {
    match (session.lookup(), selection.line()) {
        (Some(lookup), Some(line)) => lookup.distinct_welds(line),
        _ => Vec::new(),
    }
}

pub fn entry_view(session: &Session, selection: &Selection) -> EntryView {
    let lookup = session.lookup();
    let reference = match (lookup, selection.both()) {
        (Some(lookup), Some((line, weld))) => {
            let panel =
                lookup.reference_panel(line, weld, &session.settings().reference_columns);
            (!panel.is_empty()).then(|| PanelView::from(&panel))
        }
        _ => None,
    };

    EntryView {
        status: session.master_status(),
        manual_keys: lookup.is_none(),
        lines: lookup.map(|l| l.distinct_lines()).unwrap_or_default(),
        welds: welds_for(session, selection),
        reference,
        results: WeldResult::ALL.to_vec(),
        custom_columns: session.settings().custom_columns.clone(),
        log: session.log().table().clone(),
    }
}

pub fn lookup_view(session: &Session, selection: &Selection) -> LookupView {
    let lookup = session.lookup();
    LookupView {
        status: session.master_status(),
        lines: lookup.map(|l| l.distinct_lines()).unwrap_or_default(),
        welds: welds_for(session, selection),
        record: lookup
            .zip(selection.both())
            .and_then(|(lookup, (line, weld))| lookup.find_row(line, weld)),
    }
}

pub fn settings_view(session: &Session) -> SettingsView {
    let settings = session.settings();
    let columns = session
        .master()
        .map(|master| master.columns().to_vec())
        .unwrap_or_default();
    let index_of = |name: &str| columns.iter().position(|c| c == name).unwrap_or(0);

    SettingsView {
        status: session.master_status(),
        line_index: index_of(&settings.line_column),
        weld_index: index_of(&settings.weld_column),
        auto_fill: settings.active_auto_fill(&columns),
        reference: settings.active_reference(&columns),
        custom_text: settings.custom_columns_text(),
        columns,
    }
}
