use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor behind the search box. The cursor counts characters,
/// not bytes.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub changed: bool,
    pub finished: bool,
    pub canceled: bool,
    pub cursor_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        let before = self.current_input.len();
        let (finished, canceled) = match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => (true, false),
            (KeyCode::Esc, _) => {
                self.clear();
                (true, true)
            }
            (KeyCode::Backspace, _) => {
                self.backspace();
                (false, false)
            }
            (KeyCode::Delete, _) => {
                self.delete();
                (false, false)
            }
            (KeyCode::Left, _) => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
                (false, false)
            }
            (KeyCode::Right, _) => {
                self.cursor_pos = (self.cursor_pos + 1).min(self.char_count());
                (false, false)
            }
            (KeyCode::Home, _) => {
                self.cursor_pos = 0;
                (false, false)
            }
            (KeyCode::End, _) => {
                self.cursor_pos = self.char_count();
                (false, false)
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.clear();
                (false, false)
            }
            (KeyCode::Char(chr), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.insert(chr);
                (false, false)
            }
            _ => (false, false),
        };

        let mut result = self.get();
        result.changed = canceled || self.current_input.len() != before;
        result.finished = finished;
        result.canceled = canceled;
        trace!("Search input {:?} -> {:?}", key.code, result.input);
        result
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            input: self.current_input.clone(),
            changed: false,
            finished: false,
            canceled: false,
            cursor_pos: self.cursor_pos,
        }
    }

    pub fn clear(&mut self) {
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn char_count(&self) -> usize {
        self.current_input.chars().count()
    }

    fn insert(&mut self, chr: char) {
        let at = self.byte_pos(self.cursor_pos);
        self.current_input.insert(at, chr);
        self.cursor_pos += 1;
    }

    fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let at = self.byte_pos(self.cursor_pos);
            self.current_input.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor_pos < self.char_count() {
            let at = self.byte_pos(self.cursor_pos);
            self.current_input.remove(at);
        }
    }

    fn byte_pos(&self, char_pos: usize) -> usize {
        self.current_input
            .char_indices()
            .nth(char_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(input: &mut Inputter, s: &str) -> InputResult {
        let mut last = input.get();
        for chr in s.chars() {
            last = input.read(key(KeyCode::Char(chr)));
        }
        last
    }

    #[test]
    fn typing_appends_and_reports_change() {
        let mut input = Inputter::default();
        let result = type_str(&mut input, "Delhi");
        assert_eq!(result.input, "Delhi");
        assert_eq!(result.cursor_pos, 5);
        assert!(result.changed);
        assert!(!result.finished);
    }

    #[test]
    fn edits_happen_at_the_cursor() {
        let mut input = Inputter::default();
        type_str(&mut input, "IITDelhi");
        for _ in 0..5 {
            input.read(key(KeyCode::Left));
        }
        let result = input.read(key(KeyCode::Char(' ')));
        assert_eq!(result.input, "IIT Delhi");

        let result = input.read(key(KeyCode::Backspace));
        assert_eq!(result.input, "IITDelhi");
        assert_eq!(result.cursor_pos, 3);

        let result = input.read(key(KeyCode::Delete));
        assert_eq!(result.input, "IITelhi");

        input.read(key(KeyCode::Home));
        let result = input.read(key(KeyCode::Backspace));
        assert_eq!(result.input, "IITelhi");
        assert!(!result.changed);

        let result = input.read(key(KeyCode::End));
        assert_eq!(result.cursor_pos, 7);
    }

    #[test]
    fn multibyte_characters_are_single_steps() {
        let mut input = Inputter::default();
        type_str(&mut input, "Görlitz");
        input.read(key(KeyCode::Home));
        input.read(key(KeyCode::Right));
        input.read(key(KeyCode::Right));
        let result = input.read(key(KeyCode::Backspace));
        assert_eq!(result.input, "Grlitz");
    }

    #[test]
    fn shifted_characters_are_typed_but_control_keys_are_not() {
        let mut input = Inputter::default();
        input.read(KeyEvent::new(KeyCode::Char('D'), KeyModifiers::SHIFT));
        let result = input.read(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(result.input, "D");
        assert!(!result.changed);
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        type_str(&mut input, "abc");
        let result = input.read(key(KeyCode::Enter));
        assert!(result.finished);
        assert!(!result.canceled);
        assert_eq!(result.input, "abc");

        let result = input.read(key(KeyCode::Esc));
        assert!(result.finished);
        assert!(result.canceled);
        assert!(result.changed);
        assert_eq!(result.input, "");
    }
}
