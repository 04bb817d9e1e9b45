/// Gamepad input tracker using gilrs.
///
/// Any button in the configured list acts as the control key.
/// Start + Select together request a reset.
///
/// Without the "gamepad" feature the tracker never reports a press.

#[cfg(feature = "gamepad")]
use gilrs::{Button, EventType, Gilrs};

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,      // LeftTrigger
    R1,      // RightTrigger
    L2,      // LeftTrigger2
    R2,      // RightTrigger2
    Start,
    Select,
}

const BUTTON_COUNT: usize = 10;

impl Btn {
    pub fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "L2" | "LT" | "LEFTTRIGGER2"  => Some(Btn::L2),
            "R2" | "RT" | "RIGHTTRIGGER2" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            _ => None,
        }
    }
}

/// Parse configured button names. Unknown names are logged and skipped;
/// an empty result falls back to the face buttons.
pub fn parse_buttons(names: &[String]) -> Vec<Btn> {
    let parsed: Vec<Btn> = names
        .iter()
        .filter_map(|s| {
            let btn = Btn::from_name(s);
            if btn.is_none() {
                log::warn!("unknown gamepad button {:?}", s);
            }
            btn
        })
        .collect();
    if parsed.is_empty() {
        vec![Btn::A, Btn::B, Btn::X, Btn::Y]
    } else {
        parsed
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    held: [bool; BUTTON_COUNT],
    control: Vec<Btn>,

    pub connected: bool,
}

impl GamepadState {
    pub fn new(control_buttons: &[String]) -> Self {
        #[cfg(feature = "gamepad")]
        let (gilrs_opt, connected) = {
            match Gilrs::new() {
                Ok(g) => {
                    let has_pad = g.gamepads().next().is_some();
                    (Some(g), has_pad)
                }
                Err(e) => {
                    log::info!("gamepad support unavailable: {}", e);
                    (None, false)
                }
            }
        };
        #[cfg(not(feature = "gamepad"))]
        let connected = false;

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            held: [false; BUTTON_COUNT],
            control: parse_buttons(control_buttons),
            connected,
        }
    }

    /// Tracker with no device attached.
    #[cfg(test)]
    fn detached(control_buttons: &[String]) -> Self {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: None,
            held: [false; BUTTON_COUNT],
            control: parse_buttons(control_buttons),
            connected: false,
        }
    }

    pub fn update(&mut self) {
        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, true);
                }
                EventType::ButtonReleased(btn, _) => {
                    self.connected = true;
                    self.set_button(btn, false);
                }
                EventType::Connected => {
                    log::info!("gamepad connected");
                    self.connected = true;
                }
                EventType::Disconnected => {
                    log::info!("gamepad disconnected");
                    self.connected = false;
                    self.release_all();
                }
                _ => {}
            }
        }
    }

    #[cfg(feature = "gamepad")]
    fn set_button(&mut self, gilrs_btn: Button, held: bool) {
        if let Some(btn) = Btn::from_gilrs(gilrs_btn) {
            self.held[btn as usize] = held;
        }
    }

    fn is_held(&self, btn: Btn) -> bool {
        self.held[btn as usize]
    }

    /// Any configured control button is down.
    pub fn control_held(&self) -> bool {
        self.control.iter().any(|&b| self.is_held(b))
    }

    pub fn reset_pressed(&self) -> bool {
        self.is_held(Btn::Start) && self.is_held(Btn::Select)
    }

    #[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
    fn release_all(&mut self) {
        self.held = [false; BUTTON_COUNT];
    }
}
