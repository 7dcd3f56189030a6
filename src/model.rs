use std::path::{Path, PathBuf};
use std::rc::Rc;

use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, instrument, trace};

use crate::domain::{CMDMode, DISPLAY_OPTIONS, EDITABLE_COLUMNS, FEConfig, FEError, HELP_TEXT, Message};
use crate::editor::{self, ChangeCallback, EditorOptions, PageData, column_label};
use crate::inputter::{InputResult, Inputter};
use crate::session::SessionState;
use crate::table::{PageBounds, Table};

// Session key counting edits since the last export.
pub const PENDING_EDITS_KEY: &str = "pending_edits";

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    POPUP,
    CMDINPUT,
}

pub fn editor_key(page: usize) -> String {
    format!("editor-page-{page}")
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub name: String,
    pub headers: Vec<String>,
    pub widths: Vec<usize>,
    pub disabled: Vec<bool>,
    pub rows: Vec<Vec<String>>,
    pub first_row: usize,
    pub total_rows: usize,
    pub page: usize,
    pub total_pages: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub display_options: Vec<(String, bool)>,
    pub pending_edits: usize,
    pub show_popup: bool,
    pub popup_title: String,
    pub popup_message: String,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            headers: Vec::new(),
            widths: Vec::new(),
            disabled: Vec::new(),
            rows: Vec::new(),
            first_row: 0,
            total_rows: 0,
            page: 1,
            total_pages: 1,
            selected_row: 0,
            selected_column: 0,
            display_options: Vec::new(),
            pending_edits: 0,
            show_popup: false,
            popup_title: String::new(),
            popup_message: String::new(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
        }
    }
}

/// The edit session controller. Every interaction is dispatched by [`Model::update`],
/// interactions that change what the grid shows end in a render pass ([`Model::rerun`]).
pub struct Model {
    config: FEConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    session: SessionState,
    page: usize,
    bounds: Option<PageBounds>,
    view: Option<PageData>,
    curser_row: usize,
    curser_column: usize,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    popup_title: String,
    popup_message: String,
    uidata: UIData,
}

impl Model {
    pub fn init(config: &FEConfig) -> Result<Self, FEError> {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            session: SessionState::new(),
            page: 1,
            bounds: None,
            view: None,
            curser_row: 0,
            curser_column: 0,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Press o to open a csv file, ? for help".to_string(),
            popup_title: String::new(),
            popup_message: String::new(),
            uidata: UIData::empty(),
        };
        model.update_uidata();
        Ok(model)
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), FEError> {
        let Some(msg) = message else {
            return Ok(());
        };
        trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);

        match self.modus {
            Modus::TABLE => match msg {
                Message::Quit => self.quit(),
                Message::MoveUp => self.move_selection(-1, 0),
                Message::MoveDown => self.move_selection(1, 0),
                Message::MoveLeft => self.move_selection(0, -1),
                Message::MoveRight => self.move_selection(0, 1),
                Message::NextPage => self.set_page(self.page.saturating_add(1)),
                Message::PreviousPage => self.set_page(self.page.saturating_sub(1)),
                Message::FirstPage => self.set_page(1),
                Message::LastPage => self.set_page(usize::MAX),
                Message::GotoPage => self.enter_cmd_mode(CMDMode::GotoPage),
                Message::Open => self.enter_cmd_mode(CMDMode::Open),
                Message::ToggleCell => self.toggle_cell(),
                Message::ToggleDisplayColumn(idx) => self.toggle_display_column(idx),
                Message::Export => self.export(),
                Message::Help => self.show_popup("Help", HELP_TEXT.to_string()),
                _ => (),
            },
            Modus::POPUP => match msg {
                Message::Quit => self.quit(),
                Message::Exit | Message::Help | Message::ToggleCell => self.exit(),
                _ => (),
            },
            Modus::CMDINPUT => {
                if let Message::RawKey(key) = msg {
                    self.raw_input(key)
                }
            }
        }
        self.update_uidata();
        Ok(())
    }

    /// Opens `path` outside of the prompt, e.g. a file given on the command line.
    pub fn open(&mut self, path: &Path) {
        self.upload(&path.to_string_lossy());
        self.update_uidata();
    }

    // -------------------- Interactions ---------------------- //

    /// Loads the file at `path` as the session table. Ignored when a table is already held.
    #[instrument(skip(self))]
    fn upload(&mut self, path: &str) {
        if let Some(table) = self.session.table() {
            let message = format!(
                "{} is already loaded, reopening is not supported in this session",
                table.name()
            );
            info!("{message}");
            self.set_status_message(message);
            return;
        }

        let result = Self::expand_path(path)
            .and_then(|p| Table::load(&p))
            .map(|table| self.session.insert_table(table));
        match result {
            Ok(_) => {
                self.page = 1;
                self.curser_row = 0;
                self.curser_column = self.session.display_columns().len();
                let rendered = self.rerun();
                if self.report(rendered) {
                    let message = match self.session.table() {
                        Some(t) => format!("Loaded {} with {} rows", t.name(), t.height()),
                        None => String::new(),
                    };
                    self.set_status_message(message);
                }
            }
            Err(e) => {
                self.report::<()>(Err(e));
            }
        }
    }

    fn toggle_display_column(&mut self, idx: usize) {
        let Some(column) = DISPLAY_OPTIONS.get(idx) else {
            return;
        };
        let on_display_column = self.curser_column < self.session.display_columns().len();
        let shown = self.session.toggle_display_column(column);
        debug!("Display column {column} shown: {shown}");
        if !on_display_column {
            // Keep the cursor on the same flag column.
            self.curser_column = if shown {
                self.curser_column + 1
            } else {
                self.curser_column.saturating_sub(1)
            };
        }
        let rendered = self.rerun();
        self.report(rendered);
    }

    fn set_page(&mut self, page: usize) {
        let previous = self.page;
        self.page = page;
        let rendered = self.rerun();
        if self.report(rendered) && self.page != previous {
            self.curser_row = 0;
            self.clamp_curser();
            self.set_status_message(format!("Page {}", self.page));
        }
    }

    fn toggle_cell(&mut self) {
        if self.view.is_none() {
            return;
        }
        let key = editor_key(self.page);
        let result =
            editor::toggle_cell(&mut self.session, &key, self.curser_row, self.curser_column);
        match result {
            Ok(_) => {
                let rendered = self.rerun();
                self.report(rendered);
            }
            Err(FEError::EditNotAllowed(column)) => {
                self.set_status_message(format!("Column {column} is read-only"));
            }
            Err(e) => {
                self.report::<()>(Err(e));
            }
        }
    }

    #[instrument(skip(self))]
    fn export(&mut self) {
        let Some(table) = self.session.table() else {
            self.set_status_message("Nothing to save, open a csv file first".to_string());
            return;
        };
        let result = table
            .export()
            .and_then(|download| download.save(&self.config.output_dir));
        match result {
            Ok(path) => {
                self.session.reset_counter(PENDING_EDITS_KEY);
                self.set_status_message(format!("Saved {}", path.display()));
            }
            Err(e) => {
                self.report::<()>(Err(e));
            }
        }
    }

    /// One render pass: slice the current page, run it through the editor and
    /// commit the editor's value back into the table.
    fn rerun(&mut self) -> Result<(), FEError> {
        let (bounds, page_data) = {
            let Some(table) = self.session.table() else {
                self.page = 1;
                self.view = None;
                self.bounds = None;
                return Ok(());
            };
            let bounds = table.bounds(self.page, self.config.page_size);
            // The page stays in range even when slicing fails.
            self.page = bounds.page;
            let page_data = table.page(&bounds, self.session.display_columns(), &EDITABLE_COLUMNS);
            match page_data {
                Ok(data) => (bounds, data),
                Err(e) => {
                    self.view = None;
                    self.bounds = None;
                    return Err(e);
                }
            }
        };

        let on_change: ChangeCallback = Rc::new(|session: &mut SessionState| {
            let pending = session.increment(PENDING_EDITS_KEY);
            debug!("{pending} unsaved edits");
        });
        let options = EditorOptions::default()
            .disabled(self.session.display_columns().to_vec())
            .labels(
                EDITABLE_COLUMNS
                    .iter()
                    .map(|c| (c.to_string(), column_label(c)))
                    .collect(),
            )
            .on_change(on_change);

        let key = editor_key(bounds.page);
        let edited = editor::dynamic_input_data_editor(&mut self.session, page_data, &key, options);
        if let Some(widget) = self.session.editor(&key) {
            trace!("Editor {key} holds {} uncommitted edits", widget.edit_count());
        }

        if let Some(table) = self.session.table_mut() {
            table.commit_edits(&bounds, &edited)?;
        }
        self.bounds = Some(bounds);
        self.view = Some(edited);
        self.clamp_curser();
        Ok(())
    }

    fn report<T>(&mut self, result: Result<T, FEError>) -> bool {
        match result {
            Ok(_) => true,
            Err(e) => {
                error!("{e}");
                self.show_popup("Error", e.to_string());
                false
            }
        }
    }

    fn expand_path(path: &str) -> Result<PathBuf, FEError> {
        let expanded = shellexpand::full(path.trim())
            .map_err(|e| FEError::LoadingFailed(e.to_string()))?;
        Ok(PathBuf::from(expanded.into_owned()))
    }

    // -------------------- Cursor, popup and prompt ---------------------- //

    fn move_selection(&mut self, rows: isize, columns: isize) {
        self.curser_row = self.curser_row.saturating_add_signed(rows);
        self.curser_column = self.curser_column.saturating_add_signed(columns);
        self.clamp_curser();
    }

    fn clamp_curser(&mut self) {
        let (height, width) = self
            .view
            .as_ref()
            .map(|v| (v.height(), v.width()))
            .unwrap_or((0, 0));
        self.curser_row = std::cmp::min(self.curser_row, height.saturating_sub(1));
        self.curser_column = std::cmp::min(self.curser_column, width.saturating_sub(1));
    }

    fn show_popup(&mut self, title: &str, message: String) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup_title = title.to_string();
        self.popup_message = message;
    }

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
        }
    }

    fn set_status_message(&mut self, message: String) {
        self.status_message = message;
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {:?}", mode);
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;
        self.input.clear();
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn handle_cmd_input(&mut self) {
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let cmd_mode = self.cmd_mode.take();
        if self.last_input.canceled {
            trace!("Prompt {:?} canceled", cmd_mode);
            return;
        }
        let cmd_input = self.last_input.input.trim().to_string();
        match cmd_mode {
            Some(CMDMode::Open) => self.upload(&cmd_input),
            Some(CMDMode::GotoPage) => match cmd_input.parse::<usize>() {
                Ok(page) => self.set_page(page),
                Err(_) => self.set_status_message(format!("\"{cmd_input}\" is not a page number")),
            },
            None => info!("Cmd mode is none!"),
        }
    }

    fn update_uidata(&mut self) {
        let mut uidata = UIData::empty();
        uidata.display_options = DISPLAY_OPTIONS
            .iter()
            .map(|o| (o.to_string(), self.session.display_columns().iter().any(|c| c == o)))
            .collect();
        uidata.pending_edits = self.session.counter(PENDING_EDITS_KEY);

        if let (Some(view), Some(bounds), Some(table)) =
            (&self.view, &self.bounds, self.session.table())
        {
            let widget = self.session.editor(&editor_key(bounds.page));
            uidata.name = table.name().to_string();
            uidata.total_rows = table.height();
            uidata.page = bounds.page;
            uidata.total_pages = bounds.total_pages;
            uidata.first_row = view.start();

            uidata.headers = (0..view.width())
                .map(|c| match widget {
                    Some(w) => w.label(c),
                    None => view.column_name(c).unwrap_or_default().to_string(),
                })
                .collect();
            uidata.disabled = (0..view.width())
                .map(|c| widget.map(|w| w.is_disabled(c)).unwrap_or(true))
                .collect();
            uidata.rows = (0..view.height())
                .map(|r| (0..view.width()).map(|c| view.cell_text(r, c)).collect())
                .collect();
            uidata.widths = (0..view.width())
                .map(|c| {
                    let cells = uidata.rows.iter().map(|r| r[c].chars().count()).max().unwrap_or(0);
                    let width = std::cmp::max(cells, uidata.headers[c].chars().count());
                    if view.is_flag_column(c) {
                        width
                    } else {
                        std::cmp::min(width, self.config.max_column_width)
                    }
                })
                .collect();
            uidata.selected_row = self.curser_row;
            uidata.selected_column = self.curser_column;
        }

        uidata.show_popup = self.modus == Modus::POPUP;
        uidata.popup_title = self.popup_title.clone();
        uidata.popup_message = self.popup_message.clone();
        uidata.cmdinput = self.last_input.clone();
        uidata.cmd_mode = self.cmd_mode;
        uidata.active_cmdinput = self.active_cmdinput;
        uidata.status_message = self.status_message.clone();
        self.uidata = uidata;
    }

    #[cfg(test)]
    pub(crate) fn session(&self) -> &SessionState {
        &self.session
    }
}
