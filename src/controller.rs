use std::time::Duration;
use tracing::trace;

use crate::domain::{FEConfig, FEError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &FEConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, FEError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            return Ok(self.handle_key(key));
        }
        Ok(None)
    }

    fn handle_key(&self, key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left, _) | (KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right, _) | (KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown, _) | (KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp, _) | (KeyCode::Char('p'), _) => Some(Message::PreviousPage),
            (KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char('g'), _) => Some(Message::GotoPage),
            (KeyCode::Char('o'), _) => Some(Message::Open),
            (KeyCode::Char(' '), _) | (KeyCode::Enter, _) => Some(Message::ToggleCell),
            (KeyCode::Char('s'), _) => Some(Message::Export),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Char(c @ '1'..='6'), _) => {
                c.to_digit(10).map(|d| Message::ToggleDisplayColumn(d as usize - 1))
            }
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn map(code: KeyCode) -> Option<Message> {
        Controller::new(&FEConfig::default()).handle_key(KeyEvent::from(code))
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(map(KeyCode::Char('q')), Some(Message::Quit));
        assert_eq!(map(KeyCode::Char(' ')), Some(Message::ToggleCell));
        assert_eq!(map(KeyCode::PageDown), Some(Message::NextPage));
        assert_eq!(map(KeyCode::Char('s')), Some(Message::Export));
        assert_eq!(map(KeyCode::Char('x')), None);
    }

    #[test]
    fn test_number_keys_select_display_columns() {
        assert_eq!(map(KeyCode::Char('1')), Some(Message::ToggleDisplayColumn(0)));
        assert_eq!(map(KeyCode::Char('6')), Some(Message::ToggleDisplayColumn(5)));
        assert_eq!(map(KeyCode::Char('7')), None);
    }

    #[test]
    fn test_ctrl_c_quits() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let controller = Controller::new(&FEConfig::default());
        assert_eq!(controller.handle_key(key), Some(Message::Quit));
    }
}
