//! Editable data grid.
//!
//! [`data_editor`] is the grid widget. It is keyed: the first render under a key
//! constructs it, later renders reuse it. The widget keeps the cell edits the
//! user made on top of the data it holds, and starts over (dropping edits) as
//! soon as it is fed data different from what it holds. That makes the render
//! right after an edit fragile: whatever the caller derives from its freshly
//! committed state resets the widget.
//!
//! [`dynamic_input_data_editor`] wraps the widget so callers can pass changing
//! data between renders. On the render following a user edit it feeds the
//! widget the snapshot it already holds, on all other renders it forwards the
//! caller's data.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use derive_setters::Setters;
use tracing::{debug, trace, warn};

use crate::domain::FEError;
use crate::session::SessionState;

pub type ChangeCallback = Rc<dyn Fn(&mut SessionState)>;

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagColumn {
    pub name: String,
    pub values: Vec<Option<bool>>,
}

/// Owned content of one grid: display columns first, then flag columns.
/// `start` is the table row of the first grid row.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    start: usize,
    display: Vec<TextColumn>,
    editable: Vec<FlagColumn>,
}

impl PageData {
    pub fn new(start: usize, display: Vec<TextColumn>, editable: Vec<FlagColumn>) -> Self {
        Self {
            start,
            display,
            editable,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn display(&self) -> &[TextColumn] {
        &self.display
    }

    pub fn editable(&self) -> &[FlagColumn] {
        &self.editable
    }

    pub fn width(&self) -> usize {
        self.display.len() + self.editable.len()
    }

    pub fn height(&self) -> usize {
        self.display
            .first()
            .map(|c| c.values.len())
            .or_else(|| self.editable.first().map(|c| c.values.len()))
            .unwrap_or(0)
    }

    pub fn is_flag_column(&self, column: usize) -> bool {
        column >= self.display.len() && column < self.width()
    }

    pub fn column_name(&self, column: usize) -> Option<&str> {
        if column < self.display.len() {
            Some(&self.display[column].name)
        } else {
            self.editable
                .get(column - self.display.len())
                .map(|c| c.name.as_str())
        }
    }

    pub fn flag(&self, row: usize, column: usize) -> Result<Option<bool>, FEError> {
        let name = self
            .column_name(column)
            .ok_or(FEError::CellOutOfRange(row, column))?;
        if !self.is_flag_column(column) {
            return Err(FEError::EditNotAllowed(name.to_string()));
        }
        self.editable[column - self.display.len()]
            .values
            .get(row)
            .copied()
            .ok_or(FEError::CellOutOfRange(row, column))
    }

    /// Rendered text of a cell, flags as checkboxes.
    pub fn cell_text(&self, row: usize, column: usize) -> String {
        if column < self.display.len() {
            return self.display[column]
                .values
                .get(row)
                .cloned()
                .unwrap_or_default();
        }
        match self.flag(row, column) {
            Ok(Some(true)) => "[x]".to_string(),
            Ok(Some(false)) | Ok(None) => "[ ]".to_string(),
            Err(_) => String::new(),
        }
    }
}

/// Header label of a checkbox column, `is_recruiter` becomes `Is Recruiter`.
pub fn column_label(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Per-render settings of the grid.
#[derive(Default, Clone, Setters)]
#[setters(strip_option)]
pub struct EditorOptions {
    /// Columns rendered read-only.
    pub disabled: Vec<String>,
    /// Header labels by column name.
    pub labels: HashMap<String, String>,
    /// Called after a user edit was recorded.
    pub on_change: Option<ChangeCallback>,
}

/// Widget state kept under one key.
pub struct EditorWidget {
    data: PageData,
    edits: BTreeMap<(usize, usize), Option<bool>>, // (row, flag column) -> value
    options: EditorOptions,
}

impl EditorWidget {
    fn new(data: PageData) -> Self {
        Self {
            data,
            edits: BTreeMap::new(),
            options: EditorOptions::default(),
        }
    }

    fn feed(&mut self, data: PageData, options: EditorOptions) {
        if data != self.data {
            debug!(
                "Editor re-initialized with new data, dropping {} edits",
                self.edits.len()
            );
            self.data = data;
            self.edits.clear();
        }
        self.options = options;
    }

    /// Held data with the user's edits applied.
    pub fn value(&self) -> PageData {
        let mut value = self.data.clone();
        for (&(row, flag_idx), &flag) in self.edits.iter() {
            value.editable[flag_idx].values[row] = flag;
        }
        value
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    pub fn label(&self, column: usize) -> String {
        let name = self.data.column_name(column).unwrap_or_default();
        self.options
            .labels
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    pub fn is_disabled(&self, column: usize) -> bool {
        match self.data.column_name(column) {
            Some(name) => {
                !self.data.is_flag_column(column)
                    || self.options.disabled.iter().any(|d| d == name)
            }
            None => true,
        }
    }

    /// Records an edit. Returns the change callback when the value changed.
    fn set_flag(
        &mut self,
        row: usize,
        column: usize,
        value: Option<bool>,
    ) -> Result<Option<ChangeCallback>, FEError> {
        let current = self.value().flag(row, column)?;
        if self.is_disabled(column) {
            let name = self.data.column_name(column).unwrap_or_default();
            return Err(FEError::EditNotAllowed(name.to_string()));
        }
        if current == value {
            return Ok(None);
        }
        let flag_idx = column - self.data.display.len();
        self.edits.insert((row, flag_idx), value);
        trace!("Edit {row}:{column} -> {value:?}");
        Ok(self.options.on_change.clone())
    }
}

/// Renders the grid widget under `key` and returns its current value.
pub fn data_editor(
    session: &mut SessionState,
    data: PageData,
    key: &str,
    options: EditorOptions,
) -> PageData {
    match session.editors.get_mut(key) {
        Some(widget) => widget.feed(data, options),
        None => {
            trace!("Constructing editor {key}");
            let mut widget = EditorWidget::new(data);
            widget.options = options;
            session.editors.insert(key.to_string(), widget);
        }
    }
    session
        .editors
        .get(key)
        .map(EditorWidget::value)
        .unwrap_or_else(|| PageData::new(0, Vec::new(), Vec::new()))
}

pub(crate) fn changed_key(key: &str) -> String {
    format!("{key}__changed")
}

pub(crate) fn initial_data_key(key: &str) -> String {
    format!("{key}__initial_data")
}

/// Like [`data_editor`], but `data` may change between renders.
pub fn dynamic_input_data_editor(
    session: &mut SessionState,
    data: PageData,
    key: &str,
    options: EditorOptions,
) -> PageData {
    let changed_key = changed_key(key);
    let initial_data_key = initial_data_key(key);

    let data = if session.flag(&changed_key) {
        session.set_flag(&changed_key, false);
        match session.page(&initial_data_key) {
            Some(initial) => initial.clone(),
            None => {
                warn!("Editor {key} changed without initial data");
                data
            }
        }
    } else {
        session.set_page(&initial_data_key, data.clone());
        data
    };

    let caller_on_change = options.on_change.clone();
    let on_change: ChangeCallback = Rc::new(move |session: &mut SessionState| {
        if let Some(callback) = &caller_on_change {
            callback(session);
        }
        session.set_flag(&changed_key, true);
    });

    data_editor(session, data, key, options.on_change(on_change))
}

/// User edit of one checkbox in the widget under `key`. Fires the widget's
/// change callback when the value changed.
pub fn set_cell(
    session: &mut SessionState,
    key: &str,
    row: usize,
    column: usize,
    value: Option<bool>,
) -> Result<bool, FEError> {
    let widget = session
        .editors
        .get_mut(key)
        .ok_or_else(|| FEError::UnknownWidget(key.to_string()))?;
    match widget.set_flag(row, column, value)? {
        Some(callback) => {
            callback(session);
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Flips one checkbox, a missing value counts as unchecked.
pub fn toggle_cell(
    session: &mut SessionState,
    key: &str,
    row: usize,
    column: usize,
) -> Result<bool, FEError> {
    let current = session
        .editor(key)
        .ok_or_else(|| FEError::UnknownWidget(key.to_string()))?
        .value()
        .flag(row, column)?;
    let next = !current.unwrap_or(false);
    set_cell(session, key, row, column, Some(next))?;
    Ok(next)
}
