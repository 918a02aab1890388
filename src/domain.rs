use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use std::fmt;
use std::io::Error;
use tracing_error::SpanTrace;

pub const HELP_TEXT: &str = "\
  /            Search by college name
  Enter        Keep search and return to the table
  Esc          Clear search / close popup
  r            Sort by CD Rank
  f            Sort by Course Fees
  p            Sort by Placement
  u            Sort by User Reviews
               (press again to flip the direction)
  j, Down      Move down
  k, Up        Move up
  PgUp, PgDn   Move one page
  g, Home      Jump to the first row
  G, End       Jump to the last row
  y            Copy the selected record as CSV
  ?            Show this help
  q            Quit

  Rows are loaded ten at a time as the last row scrolls into view.
  Headers can be clicked to sort.";

#[derive(Debug, Clone, Setters)]
pub struct TableConfig {
    pub event_poll_time: u64,
    pub scroll_step: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            scroll_step: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    ScrollUp,
    ScrollDown,
    SortByRanking,
    SortByFees,
    SortByPlacement,
    SortByUserRating,
    Search,
    CopyRow,
    Help,
    Exit,
    Click(usize, usize),
    Resize(usize, usize),
    RawKey(KeyEvent),
}

#[derive(Debug)]
pub enum CTError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed { reason: String, context: SpanTrace },
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    MissingColumn(String),
    InvalidPath(String),
}

impl CTError {
    pub fn loading_failed(reason: impl Into<String>) -> Self {
        CTError::LoadingFailed {
            reason: reason.into(),
            context: SpanTrace::capture(),
        }
    }
}

impl fmt::Display for CTError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CTError::IoError(e) => write!(f, "io error: {e}"),
            CTError::PolarsError(e) => write!(f, "could not read data: {e}"),
            CTError::LoadingFailed { reason, context } => {
                write!(f, "loading failed: {reason}\n{context}")
            }
            CTError::FileNotFound => write!(f, "file not found"),
            CTError::PermissionDenied => write!(f, "permission denied"),
            CTError::UnknownFileType => {
                write!(f, "unknown file type, expected csv, parquet or arrow")
            }
            CTError::MissingColumn(name) => write!(f, "missing column \"{name}\""),
            CTError::InvalidPath(path) => write!(f, "invalid path \"{path}\""),
        }
    }
}

impl std::error::Error for CTError {}

impl From<Error> for CTError {
    fn from(err: Error) -> Self {
        CTError::IoError(err)
    }
}

impl From<PolarsError> for CTError {
    fn from(err: PolarsError) -> Self {
        CTError::PolarsError(err)
    }
}
