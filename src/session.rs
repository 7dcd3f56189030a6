use std::collections::HashMap;

use tracing::{info, trace};

use crate::domain::DEFAULT_DISPLAY_COLUMNS;
use crate::editor::{EditorWidget, PageData};
use crate::table::Table;

/// A value held in the session store.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionValue {
    Flag(bool),
    Counter(usize),
    Page(PageData),
}

/// State that survives between interactions of one session. Created on start,
/// dropped on exit. There is a single writer, the model's event handler.
pub struct SessionState {
    table: Option<Table>,
    display_columns: Vec<String>,
    values: HashMap<String, SessionValue>,
    pub(crate) editors: HashMap<String, EditorWidget>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            table: None,
            display_columns: DEFAULT_DISPLAY_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            values: HashMap::new(),
            editors: HashMap::new(),
        }
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut Table> {
        self.table.as_mut()
    }

    /// Stores `table` unless a table is already held. Returns whether it was stored.
    pub fn insert_table(&mut self, table: Table) -> bool {
        if self.table.is_some() {
            info!("Ignoring table {}, session already holds one", table.name());
            return false;
        }
        self.table = Some(table);
        true
    }

    pub fn display_columns(&self) -> &[String] {
        &self.display_columns
    }

    /// Adds `column` to the display selection, or removes it if already selected.
    pub fn toggle_display_column(&mut self, column: &str) -> bool {
        if let Some(pos) = self.display_columns.iter().position(|c| c == column) {
            self.display_columns.remove(pos);
            false
        } else {
            self.display_columns.push(column.to_string());
            true
        }
    }

    /// Absent flags read as false.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(SessionValue::Flag(true)))
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        trace!("Session {key} = {value}");
        self.values.insert(key.to_string(), SessionValue::Flag(value));
    }

    pub fn counter(&self, key: &str) -> usize {
        match self.values.get(key) {
            Some(SessionValue::Counter(n)) => *n,
            _ => 0,
        }
    }

    pub fn increment(&mut self, key: &str) -> usize {
        let next = self.counter(key) + 1;
        self.values
            .insert(key.to_string(), SessionValue::Counter(next));
        next
    }

    pub fn reset_counter(&mut self, key: &str) {
        self.values.insert(key.to_string(), SessionValue::Counter(0));
    }

    pub fn page(&self, key: &str) -> Option<&PageData> {
        match self.values.get(key) {
            Some(SessionValue::Page(page)) => Some(page),
            _ => None,
        }
    }

    pub fn set_page(&mut self, key: &str, page: PageData) {
        self.values.insert(key.to_string(), SessionValue::Page(page));
    }

    pub fn editor(&self, key: &str) -> Option<&EditorWidget> {
        self.editors.get(key)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::write_csv;

    #[test]
    fn test_absent_values_have_defaults() {
        let session = SessionState::new();
        assert!(!session.flag("missing"));
        assert_eq!(session.counter("missing"), 0);
        assert!(session.page("missing").is_none());
    }

    #[test]
    fn test_flag_and_counter() {
        let mut session = SessionState::new();
        session.set_flag("changed", true);
        assert!(session.flag("changed"));
        session.set_flag("changed", false);
        assert!(!session.flag("changed"));
        assert_eq!(session.increment("edits"), 1);
        assert_eq!(session.increment("edits"), 2);
        session.reset_counter("edits");
        assert_eq!(session.counter("edits"), 0);
    }

    #[test]
    fn test_display_selection_keeps_order() {
        let mut session = SessionState::new();
        assert_eq!(session.display_columns(), ["company_name", "job_title", "rating"]);
        assert!(!session.toggle_display_column("job_title"));
        assert!(session.toggle_display_column("place"));
        assert_eq!(session.display_columns(), ["company_name", "rating", "place"]);
    }

    #[test]
    fn test_second_table_is_ignored() {
        let first = write_csv(3);
        let second = write_csv(7);
        let mut session = SessionState::new();
        assert!(session.insert_table(Table::load(first.path()).unwrap()));
        assert!(!session.insert_table(Table::load(second.path()).unwrap()));
        assert_eq!(session.table().unwrap().height(), 3);
    }
}
