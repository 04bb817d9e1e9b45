/// Slowdown pills: a pulsing pickup that halves the runner's action rate
/// for a while. Built on the same collectable contract as door keys.

use crate::domain::collectable::{Availability, Collectable, CollectableOwner};
use crate::platform::{Display, Glyph, Plane, SpriteHandle, OFFSCREEN, PIXELS_PER_CELL};

const PILL_PLANE: Plane = 0;
const PILL_MAX_FRAME: u8 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SlowdownStatus {
    #[default]
    Inactive,
    Active,
}

#[derive(Clone, Debug)]
pub struct SlowdownPill {
    pub collectable: Collectable,
    /// Timer ticks the slowdown lasts.
    pub duration_secs: u16,

    sprite: Option<SpriteHandle>,
    frame: u8,
    expanding: bool,
    status: SlowdownStatus,
}

impl SlowdownPill {
    pub fn new(x: u8, y: u8, duration_secs: u16) -> Self {
        SlowdownPill {
            collectable: Collectable::new(x, y),
            duration_secs,
            sprite: None,
            frame: 0,
            expanding: true,
            status: SlowdownStatus::Inactive,
        }
    }

    #[cfg(test)]
    pub fn sentinel() -> Self {
        let mut pill = SlowdownPill::new(0, 0, 0);
        pill.collectable = Collectable::sentinel();
        pill
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.collectable.is_valid()
    }

    pub fn status(&self) -> SlowdownStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == SlowdownStatus::Active
    }

    pub fn frame(&self) -> u8 {
        self.frame
    }

    pub fn sprite(&self) -> Option<SpriteHandle> {
        self.sprite
    }

    fn screen_location(&self) -> (i32, i32) {
        (
            i32::from(self.collectable.x) * PIXELS_PER_CELL,
            i32::from(self.collectable.y) * PIXELS_PER_CELL,
        )
    }

    pub fn create(&mut self, display: &mut dyn Display) {
        self.frame = 0;
        self.expanding = true;
        self.status = SlowdownStatus::Inactive;
        let sprite = display.create_sprite(Glyph::Pill, PILL_PLANE);
        let (x, y) = self.screen_location();
        display.set_sprite_frame(sprite, 0);
        display.move_sprite(sprite, x, y);
        self.sprite = Some(sprite);
    }

    pub fn destroy(&mut self, display: &mut dyn Display) {
        if let Some(sprite) = self.sprite.take() {
            display.move_sprite(sprite, OFFSCREEN.0, OFFSCREEN.1);
            display.destroy_sprite(sprite);
        }
    }

    /// Pulse 0→1→2→2→1→0→0… while the pill is lying there; kept
    /// off-screen while taken.
    pub fn animate(&mut self, display: &mut dyn Display) {
        let Some(sprite) = self.sprite else { return };

        if !self.collectable.is_available() {
            display.move_sprite(sprite, OFFSCREEN.0, OFFSCREEN.1);
            return;
        }

        if self.expanding {
            if self.frame == PILL_MAX_FRAME {
                self.expanding = false;
            } else {
                self.frame += 1;
            }
        } else if self.frame == 0 {
            self.expanding = true;
        } else {
            self.frame -= 1;
        }

        let (x, y) = self.screen_location();
        display.set_sprite_frame(sprite, self.frame);
        display.move_sprite(sprite, x, y);
    }
}

impl CollectableOwner for SlowdownPill {
    fn collectable(&self) -> &Collectable {
        &self.collectable
    }
    fn collectable_mut(&mut self) -> &mut Collectable {
        &mut self.collectable
    }

    fn collected(&mut self, display: &mut dyn Display) {
        self.status = SlowdownStatus::Active;
        if let Some(sprite) = self.sprite {
            display.move_sprite(sprite, OFFSCREEN.0, OFFSCREEN.1);
        }
        self.collectable.start_timer(self.duration_secs);
    }

    fn timed_out(&mut self, _display: &mut dyn Display) -> u8 {
        log::debug!("slowdown pill at {:?} wore off", self.collectable.cell());
        self.collectable.set_state(Availability::Available);
        self.status = SlowdownStatus::Inactive;
        self.frame = 0;
        self.expanding = true;
        0
    }
}

/// Any live pill currently slowing the runner down?
pub fn slowdown_active(pills: &[SlowdownPill]) -> bool {
    pills.iter().take_while(|p| p.is_valid()).any(|p| p.is_active())
}
