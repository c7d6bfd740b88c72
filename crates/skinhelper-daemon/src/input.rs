//! Search dialog input handling.
//!
//! Turns key events and on-screen keyboard clicks into query edits.  Every
//! edit updates three things together: the query label, the engine query and
//! the focused key.  Backspacing past the start of the query closes the
//! dialog.

use crate::search::SearchEngine;

// ── controls ──────────────────────────────────────────────────────────────────

pub const CONTROL_QUERY_LABEL: i32 = 3010;
/// First key of the on-screen keyboard; keys follow in `KEYBOARD` order.
pub const CONTROL_FIRST_KEY: i32 = 3020;
pub const CONTROL_BACKSPACE: i32 = 3056;
pub const CONTROL_SPACE: i32 = 3057;
pub const CONTROL_CLEAR: i32 = 3058;
pub const CONTROL_MOVIES: i32 = 3110;
pub const CONTROL_TVSHOWS: i32 = 3111;
pub const CONTROL_EPISODES: i32 = 3112;

const KEYBOARD: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

// ── key codes ─────────────────────────────────────────────────────────────────

const BACKSPACE_ACTIONS: [i32; 9] = [9, 10, 92, 216, 247, 257, 275, 61467, 61448];
const ACTION_SHOW_INFO: i32 = 11;
const ACTION_NUMBER_0: i32 = 58;
const ACTION_NUMBER_9: i32 = 67;

const BUTTON_UPPER: std::ops::RangeInclusive<u32> = 0x2F041..=0x2F05B;
const BUTTON_UPPER_OFFSET: u32 = 0x2F000;
const BUTTON_LOWER: std::ops::RangeInclusive<u32> = 0xF041..=0xF05B;
const BUTTON_LOWER_OFFSET: u32 = 0xEFE0;
const BUTTON_BACKSPACE: u32 = 0xF008;
const BUTTON_DELETE: u32 = 0xF02E;
const BUTTON_SPACE: u32 = 0xF020;

/// What the controller drives on the UI side.
pub trait SearchView: Send {
    fn set_query_label(&self, text: &str);
    fn set_focus(&self, control_id: i32);
    /// Ask the user for free text; the answer comes back through `set_text`.
    fn request_text(&self);
    fn show_item_info(&self, control_id: i32);
    /// Close the shutdown-confirmation dialog if it is showing.
    fn dismiss_shutdown_dialog(&self);
    fn close(&self);
}

/// Control id of the keyboard key for `c`, case-insensitive.
pub fn key_control(c: char) -> i32 {
    let upper = c.to_ascii_uppercase();
    match KEYBOARD.iter().position(|&k| k as char == upper) {
        Some(index) => CONTROL_FIRST_KEY + index as i32,
        None if c == ' ' => CONTROL_SPACE,
        None => CONTROL_BACKSPACE,
    }
}

pub struct SearchInputController<V: SearchView> {
    view: V,
    engine: SearchEngine,
    query: String,
    focus: i32,
    closed: bool,
}

impl<V: SearchView> SearchInputController<V> {
    pub fn new(view: V, engine: SearchEngine) -> Self {
        Self {
            view,
            engine,
            query: String::new(),
            focus: CONTROL_FIRST_KEY,
            closed: false,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Key event from the host input system.
    pub fn on_action(&mut self, action_id: i32, button_code: u32) {
        if self.closed {
            return;
        }
        if BACKSPACE_ACTIONS.contains(&action_id) {
            self.remove_char();
        } else if action_id == ACTION_SHOW_INFO {
            self.show_info(self.focus);
        } else {
            self.on_text_input(action_id, button_code);
        }
        if !self.closed {
            self.view.dismiss_shutdown_dialog();
        }
    }

    fn on_text_input(&mut self, action_id: i32, button: u32) {
        if BUTTON_UPPER.contains(&button) {
            if let Some(c) = char::from_u32(button - BUTTON_UPPER_OFFSET) {
                self.add_character(c);
            }
        }
        if BUTTON_LOWER.contains(&button) {
            if let Some(c) = char::from_u32(button - BUTTON_LOWER_OFFSET) {
                self.add_character(c);
            }
        }
        if (ACTION_NUMBER_0..=ACTION_NUMBER_9).contains(&action_id) {
            let digit = (action_id - ACTION_NUMBER_0) as u8;
            self.add_character((b'0' + digit) as char);
        }
        match button {
            BUTTON_BACKSPACE if !self.query.is_empty() => self.remove_char(),
            BUTTON_DELETE => self.clear_search(),
            BUTTON_SPACE => self.add_character(' '),
            _ => {}
        }
    }

    /// Activation of an on-screen control.
    pub fn on_click(&mut self, control_id: i32) {
        if self.closed {
            return;
        }
        self.focus = control_id;
        match control_id {
            CONTROL_QUERY_LABEL => self.view.request_text(),
            id if (CONTROL_FIRST_KEY..CONTROL_BACKSPACE).contains(&id) => {
                let c = KEYBOARD[(id - CONTROL_FIRST_KEY) as usize] as char;
                self.add_character(c);
            }
            CONTROL_BACKSPACE => self.remove_char(),
            CONTROL_SPACE => self.add_character(' '),
            CONTROL_CLEAR => self.clear_search(),
            CONTROL_MOVIES | CONTROL_TVSHOWS | CONTROL_EPISODES => self.show_info(control_id),
            _ => {}
        }
    }

    /// Replace the query with free text entered by the user.
    pub fn set_text(&mut self, text: &str) {
        if self.closed {
            return;
        }
        self.view.set_query_label(text);
        self.update_query(text.to_string());
    }

    pub fn add_character(&mut self, c: char) {
        if self.closed {
            return;
        }
        self.focus_on(key_control(c));
        let mut query = std::mem::take(&mut self.query);
        query.push(c);
        self.view.set_query_label(&query);
        self.update_query(query);
    }

    pub fn remove_char(&mut self) {
        if self.closed {
            return;
        }
        if self.query.is_empty() || self.query == " " {
            self.close();
            return;
        }
        let query = if self.query.chars().count() == 1 {
            " ".to_string()
        } else {
            let mut q = self.query.clone();
            q.pop();
            q
        };
        self.focus_on(CONTROL_BACKSPACE);
        self.view.set_query_label(&query);
        self.update_query(query);
    }

    pub fn clear_search(&mut self) {
        if self.closed {
            return;
        }
        self.focus_on(CONTROL_CLEAR);
        self.view.set_query_label(" ");
        self.update_query(String::new());
    }

    /// Stop the engine, then dismiss the view.  Further input is ignored.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.engine.stop_running();
        self.view.close();
    }

    fn show_info(&self, control_id: i32) {
        self.view.show_item_info(control_id);
    }

    fn focus_on(&mut self, control_id: i32) {
        self.focus = control_id;
        self.view.set_focus(control_id);
    }

    fn update_query(&mut self, query: String) {
        self.engine.set_search(&query);
        self.query = query;
    }
}

impl<V: SearchView> Drop for SearchInputController<V> {
    fn drop(&mut self) {
        self.engine.stop_running();
    }
}
