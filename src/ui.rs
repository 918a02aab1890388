use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, TableState, Wrap,
    },
};

use crate::model::{HeaderView, Model, UIData};
use crate::view_state::HeaderState;

pub const SEARCH_HEIGHT: usize = 3;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_SPACING: u16 = 1;
pub const COLUMN_WIDTHS: [Constraint; 5] = [
    Constraint::Length(10),
    Constraint::Fill(1),
    Constraint::Length(14),
    Constraint::Length(12),
    Constraint::Length(15),
];

const HEADER_COLOR: Color = Color::Rgb(0x8B, 0xD5, 0xD7);
const SEARCH_PLACEHOLDER: &str = "Search by college name";
const POPUP_WIDTH: u16 = 72;
const POPUP_HEIGHT: u16 = 24;

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();

        let [search_area, table_area, status_area] = Layout::vertical([
            Constraint::Length(SEARCH_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(table_area);

        self.render_search(uidata, search_area, frame);
        self.render_table(uidata, table_area, frame);
        self.render_scrollbar(uidata, scrollbar_area, frame);
        self.render_statusline(uidata, status_area, frame);

        if uidata.show_popup {
            self.render_popup(uidata, frame);
        }
    }

    fn render_search(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let search = &uidata.search;
        let mut block = Block::bordered().title(" Search ");
        if uidata.active_search {
            block = block.border_style(Style::new().yellow());
        }

        let text = if search.input.is_empty() && !uidata.active_search {
            Line::from(SEARCH_PLACEHOLDER.dark_gray())
        } else {
            Line::from(search.input.as_str())
        };
        frame.render_widget(Paragraph::new(text).block(block), area);

        if uidata.active_search {
            let before_cursor: String = search.input.chars().take(search.cursor_pos).collect();
            let x = area.x + 1 + Span::raw(before_cursor).width() as u16;
            frame.set_cursor_position(Position::new(
                x.min(area.right().saturating_sub(2)),
                area.y + 1,
            ));
        }
    }

    fn header_cell(header: &HeaderView) -> Cell<'static> {
        let Some(sort) = header.sort else {
            return Cell::from(header.label);
        };
        let arrow = |symbol: &'static str, active: bool| {
            if active {
                Span::styled(symbol, Style::new().add_modifier(Modifier::BOLD))
            } else {
                Span::styled(symbol, Style::new().add_modifier(Modifier::DIM))
            }
        };
        Cell::from(Line::from(vec![
            Span::raw(header.label),
            Span::raw(" "),
            arrow("↑", sort == HeaderState::Ascending),
            arrow("↓", sort == HeaderState::Descending),
        ]))
    }

    fn render_table(&mut self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let header = Row::new(uidata.header.iter().map(Self::header_cell))
            .style(Style::new().fg(Color::White).bg(HEADER_COLOR).bold())
            .height(TABLE_HEADER_HEIGHT as u16);

        let rows = uidata
            .rows
            .iter()
            .map(|row| Row::new(row.cells.iter().map(|cell| Cell::from(cell.as_str()))));

        let table = Table::new(rows, COLUMN_WIDTHS)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .flex(Flex::Start)
            .row_highlight_style(Style::new().reversed());

        let selected = (!uidata.rows.is_empty()).then_some(uidata.selected_row);
        self.table_state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn render_scrollbar(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        // Leave the header line free.
        let area = Rect {
            y: area.y + TABLE_HEADER_HEIGHT as u16,
            height: area.height.saturating_sub(TABLE_HEADER_HEIGHT as u16),
            ..area
        };
        let mut state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }

    fn render_statusline(&self, uidata: &UIData, area: Rect, frame: &mut Frame) {
        let position = if uidata.nrows == 0 {
            "no matches".to_string()
        } else {
            format!("row {}/{}", uidata.abs_selected_row + 1, uidata.nrows)
        };
        let counts = Line::from(vec![
            position.into(),
            " · ".dark_gray(),
            format!("{}/{} loaded ", uidata.window_size, uidata.total).into(),
        ]);
        let [left, right] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(counts.width() as u16),
        ])
        .areas(area);

        let status = Line::from(vec![
            format!(" {} ", uidata.name).bold().blue(),
            " ".into(),
            uidata.status_message.as_str().into(),
            "  ? help".dark_gray(),
        ]);
        frame.render_widget(Paragraph::new(status), left);
        frame.render_widget(Paragraph::new(counts), right);
    }

    fn render_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = popup_area(frame.area(), POPUP_WIDTH, POPUP_HEIGHT);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(vec![" Close ".into(), "<Esc> ".blue().bold()]).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str())
                .block(block)
                .wrap(Wrap { trim: false }),
            area,
        );
    }
}

fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(area);
    area
}
