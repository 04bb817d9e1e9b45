/// Input state tracker.
///
/// Tracks whether the control key is held down, for the single-key
/// control scheme: the game only asks "is the key down this tick?".
/// Press edges are worked out by the simulation from its own
/// pressed/processed flags.
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::platform::{InputService, KeyId};
use crate::ui::gamepad::GamepadState;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// Terminal key code for a logical key. Characters match either case.
fn key_codes(key: KeyId) -> Vec<KeyCode> {
    match key {
        KeyId::Enter => vec![KeyCode::Enter],
        KeyId::Char(c) => {
            let mut codes = vec![KeyCode::Char(c)];
            let upper = c.to_ascii_uppercase();
            if upper != c {
                codes.push(KeyCode::Char(upper));
            }
            codes
        }
    }
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Raw key events collected during drain, for meta-key handling.
    raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    pub fn drain_events(&mut self) {
        self.raw_events.clear();

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.apply(key, Instant::now());
            }
        }

        self.expire(Instant::now());
    }

    fn apply(&mut self, key: KeyEvent, now: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            // Without enhancement, rely on timeout-based expiry instead
            KeyEventKind::Release => {}
            _ => {
                self.last_active.insert(key.code, now);
            }
        }
    }

    fn expire(&mut self, now: Instant) {
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active.get(&code).map(|t| t.elapsed() < HOLD_TIMEOUT).unwrap_or(false)
    }

    /// Ctrl+C or Esc this frame.
    pub fn reset_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.kind != KeyEventKind::Release
                && (k.code == KeyCode::Esc
                    || (k.modifiers.contains(KeyModifiers::CONTROL)
                        && matches!(k.code, KeyCode::Char('c') | KeyCode::Char('C'))))
        })
    }
}

impl Default for InputState {
    fn default() -> Self {
        InputState::new()
    }
}

// ── ControlInput: keyboard + gamepad behind one InputService ──

pub struct ControlInput {
    keys: InputState,
    pad: GamepadState,
    reset: bool,
}

impl ControlInput {
    pub fn new(keys: InputState, pad: GamepadState) -> Self {
        ControlInput { keys, pad, reset: false }
    }
}

impl InputService for ControlInput {
    fn poll(&mut self) {
        self.keys.drain_events();
        self.pad.update();
        self.reset = self.keys.reset_pressed() || self.pad.reset_pressed();
    }

    fn is_key_down(&self, key: KeyId) -> bool {
        key_codes(key).into_iter().any(|c| self.keys.is_held(c)) || self.pad.control_held()
    }

    fn reset_requested(&self) -> bool {
        self.reset
    }
}
