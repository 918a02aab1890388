//! Search, sort and window state of the college table.
//!
//! [`ViewStateManager`] owns the [`ViewState`] and is the only thing that
//! mutates it. Every actual transition is published to the subscribers as a
//! [`StateChange`], so the presentation only re-derives when something moved.
//! [`derive`] turns a state and the materialized window into the rows that
//! are shown.

use std::cmp::Ordering;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::trace;

use crate::college::{CollegeRecord, CollegeSource, SortKey};

/// Records are materialized in steps of this size.
pub const WINDOW_STEP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// What a single sortable header shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderState {
    Unsorted,
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub search_term: String,
    pub sort_key: SortKey,
    pub sort_direction: SortDirection,
    pub window_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    SearchTerm(String),
    Sort {
        key: SortKey,
        direction: SortDirection,
    },
    Window {
        size: usize,
    },
}

pub struct ViewStateManager {
    state: ViewState,
    subscribers: Vec<Sender<StateChange>>,
}

impl ViewStateManager {
    pub fn new(source: &CollegeSource) -> Self {
        Self {
            state: ViewState {
                search_term: String::new(),
                sort_key: SortKey::Ranking,
                sort_direction: SortDirection::Ascending,
                window_size: source.slice(0, WINDOW_STEP).len(),
            },
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn subscribe(&mut self) -> Receiver<StateChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn set_search_term(&mut self, text: &str) {
        let term = text.to_lowercase();
        if term != self.state.search_term {
            self.state.search_term = term.clone();
            self.publish(StateChange::SearchTerm(term));
        }
    }

    pub fn set_sort(&mut self, key: SortKey) {
        let direction = if self.state.sort_key == key
            && self.state.sort_direction == SortDirection::Ascending
        {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        if (key, direction) != (self.state.sort_key, self.state.sort_direction) {
            self.state.sort_key = key;
            self.state.sort_direction = direction;
            self.publish(StateChange::Sort { key, direction });
        }
    }

    /// Materializes the next records of `source`. Returns false once the
    /// source is exhausted.
    pub fn grow_window(&mut self, source: &CollegeSource) -> bool {
        let added = source.slice(self.state.window_size, WINDOW_STEP).len();
        if added == 0 {
            trace!("Window already covers all {} records", source.len());
            return false;
        }
        self.state.window_size += added;
        self.publish(StateChange::Window {
            size: self.state.window_size,
        });
        true
    }

    pub fn header_state(&self, key: SortKey) -> HeaderState {
        if self.state.sort_key != key {
            HeaderState::Unsorted
        } else {
            match self.state.sort_direction {
                SortDirection::Ascending => HeaderState::Ascending,
                SortDirection::Descending => HeaderState::Descending,
            }
        }
    }

    fn publish(&mut self, change: StateChange) {
        trace!("View state changed: {change:?}");
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
    }
}

/// Positions in `window` of the rows to display, in display order.
fn derive_rows(state: &ViewState, window: &[CollegeRecord]) -> Vec<usize> {
    let mut rows: Vec<usize> = window
        .iter()
        .enumerate()
        .filter(|(_, college)| college.name.to_lowercase().contains(&state.search_term))
        .map(|(idx, _)| idx)
        .collect();

    // Stable in both directions: descending reverses the comparator, not the result.
    rows.sort_by(|&a, &b| {
        let a = window[a].value(state.sort_key);
        let b = window[b].value(state.sort_key);
        let order = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        match state.sort_direction {
            SortDirection::Ascending => order,
            SortDirection::Descending => order.reverse(),
        }
    });
    rows
}

pub fn derive<'a>(state: &ViewState, window: &'a [CollegeRecord]) -> Vec<&'a CollegeRecord> {
    derive_rows(state, window)
        .into_iter()
        .map(|idx| &window[idx])
        .collect()
}
