//! Per-row rendering boundary between the table and its rows.

use crate::college::{CollegeRecord, SortKey};
use crate::loader::RowNode;

/// What the table hands to a row delegate for every displayed record.
pub struct RowProps<'a> {
    pub record: &'a CollegeRecord,
    pub line: usize,
    pub is_last_row: bool,
    /// Must be called with the row's node when `is_last_row` is set.
    pub register_last_row_node: &'a mut dyn FnMut(RowNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: u32,
    pub cells: Vec<String>,
}

pub trait RowDelegate {
    fn render(&self, props: RowProps<'_>) -> RowView;
}

/// Columns of the college table, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableColumn {
    Ranking,
    Name,
    Fees,
    Placement,
    UserRating,
}

impl TableColumn {
    pub const ALL: [TableColumn; 5] = [
        TableColumn::Ranking,
        TableColumn::Name,
        TableColumn::Fees,
        TableColumn::Placement,
        TableColumn::UserRating,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TableColumn::Ranking => "CD Rank",
            TableColumn::Name => "Colleges",
            TableColumn::Fees => "Course Fees",
            TableColumn::Placement => "Placement",
            TableColumn::UserRating => "User Reviews",
        }
    }

    pub fn sort_key(self) -> Option<SortKey> {
        match self {
            TableColumn::Ranking => Some(SortKey::Ranking),
            TableColumn::Name => None,
            TableColumn::Fees => Some(SortKey::Fees),
            TableColumn::Placement => Some(SortKey::Placement),
            TableColumn::UserRating => Some(SortKey::UserRating),
        }
    }
}

#[derive(Debug, Default)]
pub struct CollegeRow;

impl CollegeRow {
    fn cell(record: &CollegeRecord, column: TableColumn) -> String {
        match column {
            TableColumn::Ranking => format!("#{}", format_number(record.ranking)),
            TableColumn::Name => record.name.clone(),
            TableColumn::Fees => format_number(record.fees),
            TableColumn::Placement => format_number(record.placement),
            TableColumn::UserRating => format!("{} / 10", format_number(record.user_rating)),
        }
    }
}

impl RowDelegate for CollegeRow {
    fn render(&self, props: RowProps<'_>) -> RowView {
        if props.is_last_row {
            (props.register_last_row_node)(RowNode::new(props.record.id, props.line));
        }
        RowView {
            id: props.record.id,
            cells: TableColumn::ALL
                .iter()
                .map(|&column| Self::cell(props.record, column))
                .collect(),
        }
    }
}

/// Whole numbers get digit grouping, fractions keep two decimals.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "∅".to_string();
    }
    if value.fract() != 0.0 {
        return format!("{value:.2}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string();
    }
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, chr) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(chr);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
