use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use clap::Parser;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

/// Flag columns that are rendered as checkboxes and written back on commit.
pub const EDITABLE_COLUMNS: [&str; 3] = [
    "is_recruiter",
    "show_in_salary_analysis_graphic",
    "show_in_competitive_analysis_graphic",
];

/// Read-only columns the user can choose to show next to the flags.
pub const DISPLAY_OPTIONS: [&str; 6] = [
    "company_name",
    "job_title",
    "postal_code",
    "place",
    "rating",
    "review_count",
];

pub const DEFAULT_DISPLAY_COLUMNS: [&str; 3] = ["company_name", "job_title", "rating"];

// Must stay text, numeric parsing drops leading zeros.
pub const POSTAL_CODE_COLUMN: &str = "postal_code";

pub const EXPORT_FILE_NAME: &str = "updated_data.csv";
pub const EXPORT_MIME_TYPE: &str = "text/csv";

pub const HELP_TEXT: &str = "\
o           open (upload) a csv file
1-6         toggle display column
n / PgDn    next page
p / PgUp    previous page
Home / End  first / last page
g           go to page
arrows/hjkl move cell cursor
Space/Enter toggle checkbox
s           save updated_data.csv
?           this help
Esc         close popup / cancel prompt
q           quit";

#[derive(Debug)]
pub enum FEError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    MissingColumn(String),
    EditNotAllowed(String),
    CellOutOfRange(usize, usize),
    UnknownWidget(String),
}

impl fmt::Display for FEError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FEError::IoError(e) => write!(f, "I/O error: {e}"),
            FEError::PolarsError(e) => write!(f, "Could not process table: {e}"),
            FEError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            FEError::FileNotFound => write!(f, "File not found"),
            FEError::PermissionDenied => write!(f, "Permission denied"),
            FEError::UnknownFileType => write!(f, "Unknown file type, expected a .csv file"),
            FEError::MissingColumn(name) => write!(f, "Column \"{name}\" is missing"),
            FEError::EditNotAllowed(name) => write!(f, "Column \"{name}\" is read-only"),
            FEError::CellOutOfRange(row, column) => {
                write!(f, "Cell {row}:{column} is outside of the grid")
            }
            FEError::UnknownWidget(key) => write!(f, "No editor rendered for \"{key}\""),
        }
    }
}

impl std::error::Error for FEError {}

impl From<Error> for FEError {
    fn from(err: Error) -> Self {
        FEError::IoError(err)
    }
}

impl From<PolarsError> for FEError {
    fn from(err: PolarsError) -> Self {
        FEError::PolarsError(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    GotoPage,
    Open,
    ToggleCell,
    ToggleDisplayColumn(usize),
    Export,
    Help,
    Exit,
    RawKey(KeyEvent),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Open,
    GotoPage,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Open => "Open: ",
            CMDMode::GotoPage => "Page: ",
        }
    }
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// CSV file to open on start
    pub file: Option<PathBuf>,

    /// Directory updated_data.csv is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of rows per page
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u16).range(1..))]
    pub page_size: u16,

    /// Maximum rendered width of a display column
    #[arg(long, default_value_t = 30)]
    pub max_column_width: usize,

    /// Event poll timeout in milliseconds
    #[arg(long, default_value_t = 100)]
    pub event_poll_time: u64,

    /// Directory for the log file, defaults to the system temp dir
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FEConfig {
    pub event_poll_time: u64,
    pub page_size: usize,
    pub max_column_width: usize,
    pub output_dir: PathBuf,
}

impl Default for FEConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            page_size: 20,
            max_column_width: 30,
            output_dir: PathBuf::from("."),
        }
    }
}

impl From<&Args> for FEConfig {
    fn from(args: &Args) -> Self {
        Self {
            event_poll_time: args.event_poll_time,
            page_size: args.page_size as usize,
            max_column_width: args.max_column_width,
            output_dir: args.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults_map_to_config() {
        let args = Args::parse_from(["flagedit"]);
        let cfg = FEConfig::from(&args);
        assert_eq!(cfg.page_size, 20);
        assert_eq!(cfg.output_dir, PathBuf::from("."));
        assert!(args.file.is_none());
    }

    #[test]
    fn args_reject_zero_page_size() {
        assert!(Args::try_parse_from(["flagedit", "--page-size", "0"]).is_err());
    }

    #[test]
    fn display_defaults_are_options() {
        for column in DEFAULT_DISPLAY_COLUMNS {
            assert!(DISPLAY_OPTIONS.contains(&column));
        }
    }
}
