/// Level score, level bonus and the running total.
///
/// The level score starts at a per-level value and ticks down to zero
/// while the player dawdles. The bonus loses a step each time a slowdown
/// pill is used. Completing the level banks both into the total.
///
/// Printing the scores is expensive, so `show_scores` only prints when a
/// value differs from what is on screen.

use crate::platform::{colour, Colour, Display, PrintArea, PRINT_AT, PRINT_ATTR};

pub const DEFAULT_LEVEL_SCORE: u16 = 5000;
pub const DEFAULT_LEVEL_BONUS: u16 = 350;
pub const DEFAULT_BONUS_STEP: u16 = 50;

/// Where and how the two score fields are printed in the status area.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScoreScreenData {
    /// Packed ink | paper << 3.
    pub attribute: u8,
    pub level_score_x: u8,
    pub level_score_y: u8,
    pub bonus_x: u8,
    pub bonus_y: u8,
}

impl Default for ScoreScreenData {
    fn default() -> Self {
        ScoreScreenData {
            attribute: attribute(colour::WHITE, colour::BLACK),
            level_score_x: 0,
            level_score_y: 0,
            bonus_x: 16,
            bonus_y: 0,
        }
    }
}

pub fn attribute(ink: Colour, paper: Colour) -> u8 {
    (ink & 7) | ((paper & 7) << 3)
}

#[derive(Clone, Debug)]
pub struct Scoring {
    pub total: u32,
    level_score: u16,
    level_bonus: u16,
    bonus_step: u16,
    /// Values on screen; `None` forces the next print.
    printed: Option<(u16, u16)>,
    pub screen: ScoreScreenData,
}

impl Default for Scoring {
    fn default() -> Self {
        Scoring {
            total: 0,
            level_score: DEFAULT_LEVEL_SCORE,
            level_bonus: DEFAULT_LEVEL_BONUS,
            bonus_step: DEFAULT_BONUS_STEP,
            printed: None,
            screen: ScoreScreenData::default(),
        }
    }
}

impl Scoring {
    pub fn set_level(&mut self, score: u16, bonus: u16, bonus_step: u16) {
        self.level_score = score;
        self.level_bonus = bonus;
        self.bonus_step = bonus_step;
        self.reset_cached_screen_scores();
    }

    pub fn level_score(&self) -> u16 {
        self.level_score
    }

    pub fn level_bonus(&self) -> u16 {
        self.level_bonus
    }

    pub fn decrement_level_score(&mut self, by: u16) {
        self.level_score = self.level_score.saturating_sub(by);
    }

    /// A slowdown was used.
    pub fn use_bonus(&mut self) {
        self.level_bonus = self.level_bonus.saturating_sub(self.bonus_step);
    }

    /// Level done: bank what is left.
    pub fn bank_level(&mut self) -> u32 {
        let gained = u32::from(self.level_score) + u32::from(self.level_bonus);
        self.total += gained;
        gained
    }

    /// ATTR a, AT y x "Score:nnnnn", AT y x "Bonus:nnnnn".
    pub fn score_print_string(&self) -> Vec<u8> {
        let s = &self.screen;
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(&[PRINT_ATTR, s.attribute]);
        out.extend_from_slice(&[PRINT_AT, s.level_score_y, s.level_score_x]);
        out.extend_from_slice(format!("Score:{:05}", self.level_score).as_bytes());
        out.extend_from_slice(&[PRINT_AT, s.bonus_y, s.bonus_x]);
        out.extend_from_slice(format!("Bonus:{:05}", self.level_bonus).as_bytes());
        out
    }

    /// Print both values if either changed. Returns whether it printed.
    pub fn show_scores(&mut self, display: &mut dyn Display) -> bool {
        let current = (self.level_score, self.level_bonus);
        if self.printed == Some(current) {
            return false;
        }
        display.print_string(&self.score_print_string(), PrintArea::Status);
        self.printed = Some(current);
        true
    }

    pub fn reset_cached_screen_scores(&mut self) {
        self.printed = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::recording::RecordingDisplay;

    #[test]
    fn prints_only_on_change() {
        let mut disp = RecordingDisplay::new();
        let mut s = Scoring::default();
        assert!(s.show_scores(&mut disp));
        assert!(!s.show_scores(&mut disp));
        s.decrement_level_score(1);
        assert!(s.show_scores(&mut disp));
        assert_eq!(disp.prints().len(), 2);
    }

    #[test]
    fn reset_forces_reprint() {
        let mut disp = RecordingDisplay::new();
        let mut s = Scoring::default();
        s.show_scores(&mut disp);
        s.reset_cached_screen_scores();
        assert!(s.show_scores(&mut disp));
    }

    #[test]
    fn print_string_layout() {
        let mut s = Scoring::default();
        s.set_level(42, 7, 5);
        let bytes = s.score_print_string();
        assert_eq!(&bytes[..5], &[PRINT_ATTR, s.screen.attribute, PRINT_AT, 0, 0]);
        let text = String::from_utf8_lossy(&bytes[5..16]);
        assert_eq!(text, "Score:00042");
        assert_eq!(&bytes[16..19], &[PRINT_AT, 0, 16]);
        assert_eq!(String::from_utf8_lossy(&bytes[19..]), "Bonus:00007");
    }

    #[test]
    fn values_saturate_at_zero() {
        let mut s = Scoring::default();
        s.set_level(3, 60, 50);
        s.decrement_level_score(10);
        s.use_bonus();
        s.use_bonus();
        assert_eq!(s.level_score(), 0);
        assert_eq!(s.level_bonus(), 0);
    }

    #[test]
    fn banking_adds_score_and_bonus() {
        let mut s = Scoring::default();
        s.set_level(100, 20, 5);
        assert_eq!(s.bank_level(), 120);
        s.set_level(1, 1, 1);
        s.bank_level();
        assert_eq!(s.total, 122);
    }
}
