use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use ratatui::layout::{Flex, Layout, Rect};
use std::ops::Range;
use std::sync::mpsc::Receiver;
use std::time::Instant;
use tracing::{debug, error, trace};

use crate::college::{CollegeRecord, CollegeSource, SortKey};
use crate::domain::{HELP_TEXT, Message, TableConfig};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{IncrementalLoader, RowNode};
use crate::row::{CollegeRow, RowDelegate, RowProps, RowView, TableColumn};
use crate::ui::{
    COLUMN_SPACING, COLUMN_WIDTHS, SCROLLBAR_WIDTH, SEARCH_HEIGHT, STATUSLINE_HEIGHT,
    TABLE_HEADER_HEIGHT,
};
use crate::view_state::{HeaderState, StateChange, ViewStateManager, derive};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    SEARCH,
    POPUP,
}

#[derive(Debug, Clone)]
pub struct HeaderView {
    pub label: &'static str,
    pub sort: Option<HeaderState>,
}

pub struct UIData {
    pub name: String,
    pub header: Vec<HeaderView>,
    pub rows: Vec<RowView>, // Only the rows inside the viewport
    pub nrows: usize,       // Total number of rows after search and sort
    pub window_size: usize,
    pub total: usize,
    pub selected_row: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub search: InputResult,
    pub active_search: bool,
    pub status_message: String,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            header: Vec::new(),
            rows: Vec::new(),
            nrows: 0,
            window_size: 0,
            total: 0,
            selected_row: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            search: InputResult::default(),
            active_search: false,
            status_message: String::new(),
        }
    }
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize, // Body lines, without the header
    pub header_y: usize,
    pub body_y: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let header_y = SEARCH_HEIGHT;
        let table_height = ui_height
            .saturating_sub(SEARCH_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT);

        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height,
            header_y,
            body_y: header_y + TABLE_HEADER_HEIGHT,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }

    /// Column under the terminal x coordinate, using the same split as the table widget.
    pub fn column_at(&self, x: usize) -> Option<TableColumn> {
        let area = Rect::new(0, 0, self.table_width as u16, TABLE_HEADER_HEIGHT as u16);
        let columns = Layout::horizontal(COLUMN_WIDTHS)
            .flex(Flex::Start)
            .spacing(COLUMN_SPACING)
            .split(area);
        columns
            .iter()
            .zip(TableColumn::ALL)
            .find(|(rect, _)| x >= rect.x as usize && x < rect.right() as usize)
            .map(|(_, column)| column)
    }
}

pub struct Model {
    config: TableConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    source: CollegeSource,
    view: ViewStateManager,
    changes: Receiver<StateChange>,
    loader: IncrementalLoader,
    delegate: Box<dyn RowDelegate>,
    displayed: Vec<CollegeRecord>,
    rendered: Vec<RowView>,
    selected_row: usize,
    offset_row: usize,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    last_input: InputResult,
    status_message: String,
}

impl Model {
    pub fn init(config: &TableConfig, source: CollegeSource, ui_width: usize, ui_height: usize) -> Self {
        let mut view = ViewStateManager::new(&source);
        let changes = view.subscribe();
        let status_message = if source.is_empty() {
            "No colleges found".to_string()
        } else {
            format!("Loaded {} colleges", source.len())
        };
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            source,
            view,
            changes,
            loader: IncrementalLoader::new(),
            delegate: Box::new(CollegeRow),
            displayed: Vec::new(),
            rendered: Vec::new(),
            selected_row: 0,
            offset_row: 0,
            uilayout: UILayout::from_values(ui_width, ui_height),
            uidata: UIData::empty(),
            input: Inputter::default(),
            last_input: InputResult::default(),
            status_message,
        };
        model.refresh();
        model.poll_visibility();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::SEARCH
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    pub fn update(&mut self, message: Option<Message>) {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_selection(1),
                    Message::MoveUp => self.move_selection(-1),
                    Message::MovePageDown => {
                        self.move_selection(self.uilayout.table_height.max(1) as isize)
                    }
                    Message::MovePageUp => {
                        self.move_selection(-(self.uilayout.table_height.max(1) as isize))
                    }
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => self.select_row(self.displayed.len().saturating_sub(1)),
                    Message::ScrollDown => self.scroll(self.config.scroll_step as isize),
                    Message::ScrollUp => self.scroll(-(self.config.scroll_step as isize)),
                    Message::SortByRanking => self.view.set_sort(SortKey::Ranking),
                    Message::SortByFees => self.view.set_sort(SortKey::Fees),
                    Message::SortByPlacement => self.view.set_sort(SortKey::Placement),
                    Message::SortByUserRating => self.view.set_sort(SortKey::UserRating),
                    Message::Search => self.enter_search_mode(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::Click(x, y) => self.click(x, y),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::SEARCH => match msg {
                    Message::RawKey(key) => self.search_input(key),
                    Message::ScrollDown => self.scroll(self.config.scroll_step as isize),
                    Message::ScrollUp => self.scroll(-(self.config.scroll_step as isize)),
                    Message::Click(x, y) => self.click(x, y),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.exit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }

        self.sync_view();
        self.poll_visibility();
    }

    // ---------------------- Derivation and loading ------------------------ //

    /// Re-derives and re-renders if the view state published anything.
    fn sync_view(&mut self) {
        let changes: Vec<StateChange> = self.changes.try_iter().collect();
        if !changes.is_empty() {
            debug!("Applying {changes:?}");
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        let start_time = Instant::now();
        let window = self.source.slice(0, self.view.state().window_size);
        let displayed = derive(self.view.state(), window);

        let last_line = displayed.len().checked_sub(1);
        let mut last_row_node: Option<RowNode> = None;
        let mut rendered = Vec::with_capacity(displayed.len());
        for (line, &record) in displayed.iter().enumerate() {
            let mut register = |node: RowNode| last_row_node = Some(node);
            rendered.push(self.delegate.render(RowProps {
                record,
                line,
                is_last_row: Some(line) == last_line,
                register_last_row_node: &mut register,
            }));
        }
        self.loader.attach(last_row_node);
        debug_assert!(self.loader.live_watches() <= 1);

        trace!(
            "Derived {} of {} rows in {}us, watching {:?}",
            displayed.len(),
            window.len(),
            start_time.elapsed().as_micros(),
            self.loader.watched()
        );
        self.displayed = displayed.into_iter().cloned().collect();
        self.rendered = rendered;
        self.clamp_selection();
        self.update_uidata();
    }

    fn viewport(&self) -> Range<usize> {
        self.offset_row..self.offset_row + self.uilayout.table_height
    }

    /// Grows the window for as long as the last row keeps entering the viewport.
    fn poll_visibility(&mut self) {
        loop {
            let viewport = self.viewport();
            if !self.loader.check(&viewport) {
                break;
            }
            if !self.view.grow_window(&self.source) {
                debug!("All {} colleges are loaded", self.source.len());
                break;
            }
            self.sync_view();
        }
    }

    fn update_uidata(&mut self) {
        let rbegin = self.offset_row.min(self.rendered.len());
        let rend = (self.offset_row + self.uilayout.table_height).min(self.rendered.len());

        self.uidata = UIData {
            name: self.source.name().to_string(),
            header: TableColumn::ALL
                .iter()
                .map(|column| HeaderView {
                    label: column.label(),
                    sort: column.sort_key().map(|key| self.view.header_state(key)),
                })
                .collect(),
            rows: self.rendered[rbegin..rend].to_vec(),
            nrows: self.displayed.len(),
            window_size: self.view.state().window_size,
            total: self.source.len(),
            selected_row: self.selected_row - self.offset_row,
            abs_selected_row: self.selected_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            layout: self.uilayout.clone(),
            search: self.last_input.clone(),
            active_search: self.modus == Modus::SEARCH,
            status_message: self.status_message.clone(),
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.clamp_selection();
        self.update_uidata();
    }

    fn clamp_selection(&mut self) {
        if self.displayed.is_empty() {
            self.selected_row = 0;
            self.offset_row = 0;
            return;
        }
        let row = self.selected_row.min(self.displayed.len() - 1);
        let height = self.uilayout.table_height.max(1);
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + height {
            self.offset_row = row + 1 - height;
        }
        self.selected_row = row;
    }

    fn select_row(&mut self, row: usize) {
        self.selected_row = row;
        self.clamp_selection();
        self.update_uidata();
    }

    fn move_selection(&mut self, delta: isize) {
        self.select_row(self.selected_row.saturating_add_signed(delta));
    }

    /// Moves the viewport, dragging the selection along only when it would leave it.
    fn scroll(&mut self, delta: isize) {
        if self.displayed.is_empty() {
            return;
        }
        let height = self.uilayout.table_height.max(1);
        let max_offset = self.displayed.len().saturating_sub(height);
        self.offset_row = self.offset_row.saturating_add_signed(delta).min(max_offset);
        let last_visible = (self.offset_row + height - 1).min(self.displayed.len() - 1);
        self.selected_row = self.selected_row.clamp(self.offset_row, last_visible);
        self.update_uidata();
    }

    fn click(&mut self, x: usize, y: usize) {
        let layout = &self.uilayout;
        if y < layout.header_y {
            if self.modus != Modus::SEARCH {
                self.enter_search_mode();
            }
        } else if y == layout.header_y {
            match layout.column_at(x).and_then(TableColumn::sort_key) {
                Some(key) => self.view.set_sort(key),
                None => trace!("Click at {x} is not on a sortable header"),
            }
        } else if y < layout.body_y + layout.table_height {
            let line = self.offset_row + (y - layout.body_y);
            if line < self.displayed.len() {
                self.select_row(line);
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.update_uidata();
    }

    fn exit(&mut self) {
        if self.modus == Modus::POPUP {
            trace!("Close popup ...");
            self.modus = self.previous_modus;
            self.previous_modus = Modus::POPUP;
            self.update_uidata();
        }
    }

    fn enter_search_mode(&mut self) {
        trace!("Entering search mode ...");
        self.previous_modus = self.modus;
        self.modus = Modus::SEARCH;
        self.last_input = self.input.get();
        self.update_uidata();
    }

    fn search_input(&mut self, key: KeyEvent) {
        self.last_input = self.input.read(key);
        if self.last_input.changed {
            self.view.set_search_term(&self.last_input.input);
        }
        if self.last_input.finished {
            self.modus = Modus::TABLE;
            self.previous_modus = Modus::SEARCH;
        }
        self.update_uidata();
    }

    fn selected_record(&self) -> Option<&CollegeRecord> {
        self.displayed.get(self.selected_row)
    }

    fn copy_row(&mut self) {
        let Some(line) = self.selected_record().map(Self::csv_line) else {
            return;
        };
        trace!("Row content: {}", line);

        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(line)) {
            Ok(_) => self.set_status_message("Copied row to clipboard"),
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message(format!("Clipboard unavailable: {e}"));
            }
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',' || c == '"');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping {
            out = format!("\"{out}\"");
        }
        out
    }

    fn csv_line(record: &CollegeRecord) -> String {
        [
            record.id.to_string(),
            Self::wrap_cell_content(&record.name),
            record.ranking.to_string(),
            record.fees.to_string(),
            record.placement.to_string(),
            record.user_rating.to_string(),
        ]
        .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::college::sample_source;
    use crate::view_state::SortDirection;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::path::PathBuf;

    const WIDTH: usize = 100;

    // Five body lines: search box, header and status line take the rest.
    fn short_terminal() -> usize {
        SEARCH_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT + 5
    }

    fn fixture() -> CollegeSource {
        CollegeSource::load(
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/colleges.csv"),
        )
        .unwrap()
    }

    fn shown(model: &Model) -> Vec<u32> {
        model.rendered.iter().map(|row| row.id).collect()
    }

    fn type_search(model: &mut Model, text: &str) {
        model.update(Some(Message::Search));
        for chr in text.chars() {
            model.update(Some(Message::RawKey(KeyEvent::new(
                KeyCode::Char(chr),
                KeyModifiers::NONE,
            ))));
        }
    }

    fn header_x(layout: &UILayout, wanted: TableColumn) -> usize {
        (0..layout.table_width)
            .find(|&x| layout.column_at(x) == Some(wanted))
            .unwrap()
    }

    #[test]
    fn starts_with_first_ten_by_ranking() {
        let model = Model::init(&TableConfig::default(), fixture(), WIDTH, short_terminal());
        assert_eq!(shown(&model), (1..=10).collect::<Vec<u32>>());
        assert_eq!(model.view.state().window_size, 10);
        assert_eq!(model.uidata.rows.len(), 5);
        assert_eq!(model.uidata.nrows, 10);
        assert_eq!(model.uidata.total, 25);
    }

    #[test]
    fn scrolling_to_the_last_row_loads_more() {
        let mut model = Model::init(&TableConfig::default(), fixture(), WIDTH, short_terminal());

        model.update(Some(Message::MoveEnd));
        assert_eq!(model.view.state().window_size, 20);
        assert_eq!(shown(&model), (1..=20).collect::<Vec<u32>>());
        // The new last row is out of view, nothing else happens.
        assert_eq!(model.loader.watched(), Some(RowNode::new(20, 19)));

        model.update(Some(Message::MoveEnd));
        assert_eq!(model.view.state().window_size, 25);
        model.update(Some(Message::MoveBeginning));
        model.update(Some(Message::MoveEnd));
        assert_eq!(model.view.state().window_size, 25);
        assert_eq!(model.loader.live_watches(), 1);
    }

    #[test]
    fn sorting_searching_and_loading_together() {
        let mut model = Model::init(&TableConfig::default(), fixture(), WIDTH, short_terminal());
        model.update(Some(Message::MoveEnd));
        assert_eq!(model.view.state().window_size, 20);

        model.update(Some(Message::SortByFees));
        let state = model.view.state();
        assert_eq!((state.sort_key, state.sort_direction), (SortKey::Fees, SortDirection::Ascending));
        assert_eq!(shown(&model)[..3], [13, 15, 12]);
        assert_eq!(shown(&model).len(), 20);

        model.update(Some(Message::SortByFees));
        assert_eq!(model.view.state().sort_direction, SortDirection::Descending);
        assert_eq!(shown(&model)[..3], [11, 20, 14]);

        // Narrowing the list pulls its last row into view, which loads the
        // remaining colleges and brings in NIT Delhi.
        type_search(&mut model, "DELHI");
        assert_eq!(model.view.state().search_term, "delhi");
        assert_eq!(model.view.state().window_size, 25);
        assert_eq!(shown(&model), vec![14, 2, 10, 21]);
        assert_eq!(model.uidata.selected_row, 0);
        assert_eq!(model.uidata.abs_selected_row, 3);

        model.update(Some(Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))));
        assert!(!model.raw_keyevents());
        assert_eq!(shown(&model).len(), 4);
    }

    #[test]
    fn escape_clears_the_search() {
        let mut model = Model::init(&TableConfig::default(), fixture(), WIDTH, short_terminal());
        type_search(&mut model, "iit");
        assert!(model.raw_keyevents());
        assert!(shown(&model).len() < model.view.state().window_size);

        model.update(Some(Message::RawKey(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))));
        assert!(!model.raw_keyevents());
        assert_eq!(model.view.state().search_term, "");
        assert_eq!(shown(&model).len(), model.view.state().window_size);
    }

    #[test]
    fn tall_viewport_loads_until_exhausted() {
        let model = Model::init(&TableConfig::default(), sample_source(25), WIDTH, 60);
        assert_eq!(model.view.state().window_size, 25);
        assert_eq!(shown(&model).len(), 25);
        assert_eq!(model.loader.live_watches(), 1);
    }

    #[test]
    fn empty_result_stops_loading() {
        let mut model =
            Model::init(&TableConfig::default(), sample_source(25), WIDTH, short_terminal());
        type_search(&mut model, "nothing like this");
        assert!(shown(&model).is_empty());
        assert_eq!(model.loader.watched(), None);
        assert_eq!(model.loader.live_watches(), 0);

        model.update(Some(Message::RawKey(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))));
        model.update(Some(Message::MoveEnd));
        assert_eq!(model.view.state().window_size, 10);
    }

    #[test]
    fn growing_the_terminal_can_load_more() {
        let mut model = Model::init(&TableConfig::default(), sample_source(25), WIDTH, short_terminal());
        assert_eq!(model.view.state().window_size, 10);
        model.update(Some(Message::Resize(WIDTH, 20)));
        assert_eq!(model.view.state().window_size, 20);
    }

    #[test]
    fn clicking_headers_sorts() {
        let mut model = Model::init(&TableConfig::default(), sample_source(25), WIDTH, short_terminal());
        let layout = model.uilayout.clone();
        assert_eq!(layout.column_at(0), Some(TableColumn::Ranking));

        let fees = header_x(&layout, TableColumn::Fees);
        model.update(Some(Message::Click(fees, layout.header_y)));
        assert_eq!(model.view.header_state(SortKey::Fees), HeaderState::Ascending);
        assert_eq!(model.view.header_state(SortKey::Ranking), HeaderState::Unsorted);
        model.update(Some(Message::Click(fees, layout.header_y)));
        assert_eq!(model.view.header_state(SortKey::Fees), HeaderState::Descending);

        let name = header_x(&layout, TableColumn::Name);
        model.update(Some(Message::Click(name, layout.header_y)));
        assert_eq!(model.view.header_state(SortKey::Fees), HeaderState::Descending);

        let rating = header_x(&layout, TableColumn::UserRating);
        model.update(Some(Message::Click(rating, layout.header_y)));
        assert_eq!(model.view.header_state(SortKey::UserRating), HeaderState::Ascending);

        let header = &model.get_uidata().header;
        assert_eq!(header[1].sort, None);
        assert_eq!(header[4].sort, Some(HeaderState::Ascending));
    }

    #[test]
    fn clicking_body_selects_and_search_box_focuses() {
        let mut model = Model::init(&TableConfig::default(), sample_source(25), WIDTH, short_terminal());
        let layout = model.uilayout.clone();
        model.update(Some(Message::Click(10, layout.body_y + 3)));
        assert_eq!(model.uidata.abs_selected_row, 3);

        model.update(Some(Message::Click(10, 1)));
        assert!(model.raw_keyevents());
    }

    #[test]
    fn scrolling_moves_the_viewport() {
        let mut model = Model::init(&TableConfig::default(), sample_source(25), WIDTH, short_terminal());
        model.update(Some(Message::ScrollDown));
        assert_eq!(model.offset_row, 3);
        assert_eq!(model.selected_row, 3);
        model.update(Some(Message::ScrollDown));
        // Lines 5..10 are visible now, line 9 is the last row.
        assert_eq!(model.offset_row, 5);
        assert_eq!(model.view.state().window_size, 20);
        model.update(Some(Message::ScrollUp));
        assert_eq!(model.offset_row, 2);
    }

    #[test]
    fn help_popup_swallows_table_keys() {
        let mut model = Model::init(&TableConfig::default(), sample_source(25), WIDTH, short_terminal());
        model.update(Some(Message::Help));
        assert!(model.get_uidata().show_popup);
        model.update(Some(Message::SortByFees));
        assert_eq!(model.view.state().sort_key, SortKey::Ranking);
        model.update(Some(Message::Exit));
        assert!(!model.get_uidata().show_popup);
        model.update(Some(Message::Quit));
        assert_eq!(model.status, Status::QUITTING);
    }

    #[test]
    fn rows_are_copied_as_csv() {
        let record = CollegeRecord {
            id: 3,
            name: "Institute \"A\", East".to_string(),
            ranking: 3.0,
            fees: 1500.5,
            placement: 90.0,
            user_rating: 8.0,
        };
        assert_eq!(
            Model::csv_line(&record),
            "3,\"Institute \"\"A\"\", East\",3,1500.5,90,8"
        );
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut model = Model::init(&TableConfig::default(), sample_source(25), 2, 2);
        model.update(Some(Message::MoveDown));
        model.update(Some(Message::MovePageDown));
        model.update(Some(Message::ScrollDown));
        assert_eq!(model.view.state().window_size, 10);
    }
}
