//! Operator input mapping
//!
//! Keys and stdin lines are mapped to `UiAction`s based on the current desk
//! state. Only `Ready` offers the scan trigger.

use crate::domain::types::AppState;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    None,
    Arm,
    Cancel,
    /// Manually typed (or wedge-scanned) code
    Submit(String),
    Quit,
}

/// Manual entry buffer used while scanning
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EntryBuffer {
    text: String,
}

impl EntryBuffer {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    fn take(&mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

/// Map a terminal key press for the given state
pub fn map_key(state: AppState, key: KeyEvent, entry: &mut EntryBuffer) -> UiAction {
    if key.kind != KeyEventKind::Press {
        return UiAction::None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return UiAction::Quit;
    }

    match state {
        AppState::Ready => match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => UiAction::Arm,
            KeyCode::Char('q') => UiAction::Quit,
            _ => UiAction::None,
        },
        AppState::Scanning => match key.code {
            KeyCode::Esc => {
                entry.clear();
                UiAction::Cancel
            }
            KeyCode::Enter => {
                let line = entry.take();
                if line.trim().is_empty() {
                    UiAction::None
                } else {
                    UiAction::Submit(line)
                }
            }
            KeyCode::Backspace => {
                entry.text.pop();
                UiAction::None
            }
            KeyCode::Char(c) => {
                entry.text.push(c);
                UiAction::None
            }
            _ => UiAction::None,
        },
        AppState::Loading | AppState::Result(_) => match key.code {
            KeyCode::Char('q') => UiAction::Quit,
            _ => UiAction::None,
        },
    }
}

/// Map one stdin line for the headless frontend
pub fn map_line(state: AppState, line: &str) -> UiAction {
    let trimmed = line.trim();

    match state {
        AppState::Ready => match trimmed {
            "q" | "quit" => UiAction::Quit,
            _ => UiAction::Arm,
        },
        AppState::Scanning if trimmed.is_empty() => UiAction::Cancel,
        AppState::Scanning => UiAction::Submit(line.to_string()),
        AppState::Loading | AppState::Result(_) => match trimmed {
            "q" | "quit" => UiAction::Quit,
            _ => UiAction::None,
        },
    }
}
