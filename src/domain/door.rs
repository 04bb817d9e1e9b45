/// Doors: a key (a printed tile) gating a door (a sprite).
///
/// The key is the door's embedded `Collectable`. Collecting it starts the
/// door opening and arms the open timer; the timeout brings the key back
/// and starts the door closing. Passing through the door while it is open
/// cancels the timer and disarms the key, so the door stays open.
///
/// ## Motion
///
///   Stationary(0) ──collect──▶ Opening ──offset==8──▶ Stationary(8)
///   Stationary(8) ──timeout──▶ Closing ──offset==0──▶ Stationary(0)
///
/// Opening and closing move one unit per step over the same travel, so a
/// door always returns to exactly its closed offset. A door is never
/// stationary mid-travel. The sprite is repositioned only while moving.

use crate::domain::collectable::{Availability, Collectable, CollectableOwner};
use crate::platform::{
    CellRect, Colour, Display, Glyph, Plane, PrintArea, SpriteHandle, OFFSCREEN, PIXELS_PER_CELL,
    PRINT_AT, PRINT_INK, PRINT_PAPER, TILE_BLANK, TILE_KEY,
};

/// Full travel of a door, in pixels.
pub const DOOR_MAX_TRAVEL: u8 = 8;

/// Doors sit in front of the runner.
const DOOR_PLANE: Plane = 1;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DoorMotion {
    Stationary,
    Opening,
    Closing,
}

/// Most doors are portcullises; some are trapdoors sliding sideways.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum OpensDirection {
    #[default]
    BottomToTop,
    LeftToRight,
    RightToLeft,
}

#[derive(Clone, Debug)]
pub struct Door {
    /// The key.
    pub collectable: Collectable,

    pub cell_x: u8,
    pub cell_y: u8,
    pub ink: Colour,

    pub key_ink: Colour,
    pub key_paper: Colour,
    pub key_tile: u8,

    /// Timer ticks the door stays open after the key is collected.
    pub open_secs: u16,
    /// Non-zero: the door starts the level open for this long.
    pub start_open_secs: u16,
    pub opens: OpensDirection,
    /// Frames per offset unit while moving.
    pub frames_per_step: u8,

    /// Runner standing here has passed through.
    pub pass_x: u8,
    pub pass_y: u8,

    // ── Runtime (not part of level data) ──
    sprite: Option<SpriteHandle>,
    motion: DoorMotion,
    offset: u8,
    anim_step: u8,
}

impl Door {
    /// Key at `key`, door at `cell`. The passthrough cell defaults to the
    /// cell right of the door.
    pub fn new(key: (u8, u8), cell: (u8, u8)) -> Self {
        Door {
            collectable: Collectable::new(key.0, key.1),
            cell_x: cell.0,
            cell_y: cell.1,
            ink: crate::platform::colour::CYAN,
            key_ink: crate::platform::colour::YELLOW,
            key_paper: crate::platform::colour::BLACK,
            key_tile: TILE_KEY,
            open_secs: 3,
            start_open_secs: 0,
            opens: OpensDirection::BottomToTop,
            frames_per_step: 1,
            pass_x: cell.0.saturating_add(1),
            pass_y: cell.1,
            sprite: None,
            motion: DoorMotion::Stationary,
            offset: 0,
            anim_step: 0,
        }
    }

    /// End-of-list marker for door arrays.
    pub fn sentinel() -> Self {
        let mut door = Door::new((0, 0), (0, 0));
        door.collectable = Collectable::sentinel();
        door
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.collectable.is_valid()
    }

    #[inline]
    pub fn motion(&self) -> DoorMotion {
        self.motion
    }

    #[inline]
    pub fn offset(&self) -> u8 {
        self.offset
    }

    pub fn sprite(&self) -> Option<SpriteHandle> {
        self.sprite
    }

    pub fn is_fully_open(&self) -> bool {
        self.offset == DOOR_MAX_TRAVEL
    }

    /// Does the door stop the runner entering this cell?
    pub fn blocks(&self, cx: i32, cy: i32) -> bool {
        self.is_valid()
            && cx == i32::from(self.cell_x)
            && cy == i32::from(self.cell_y)
            && !self.is_fully_open()
    }

    /// Pixel position of the closed door.
    pub fn screen_location(&self) -> (i32, i32) {
        (
            i32::from(self.cell_x) * PIXELS_PER_CELL,
            i32::from(self.cell_y) * PIXELS_PER_CELL,
        )
    }

    /// Pixel position with the current travel applied.
    pub fn screen_location_with_offset(&self) -> (i32, i32) {
        let (x, y) = self.screen_location();
        let off = i32::from(self.offset);
        match self.opens {
            OpensDirection::BottomToTop => (x, y - off),
            OpensDirection::LeftToRight => (x + off, y),
            OpensDirection::RightToLeft => (x - off, y),
        }
    }

    // ── Lifecycle ──

    /// Level setup: show the key, make the sprite, maybe start open.
    pub fn create(&mut self, display: &mut dyn Display) {
        debug_assert!(self.is_valid(), "create on sentinel door");

        self.display_key(true, display);
        self.motion = DoorMotion::Stationary;
        self.offset = 0;
        self.anim_step = 0;

        let sprite = display.create_sprite(Glyph::Door, DOOR_PLANE);
        let (x, y) = self.screen_location();
        display.move_sprite(sprite, x, y);
        display.set_cell_colour(sprite, self.ink);
        self.sprite = Some(sprite);

        if self.start_open_secs > 0 && self.collectable.collect(None).is_ok() {
            log::debug!("door at ({},{}) starts open for {}", self.cell_x, self.cell_y, self.start_open_secs);
            self.open_for(self.start_open_secs, display);
        }
    }

    /// Level teardown: move the sprite away and release it.
    pub fn destroy(&mut self, display: &mut dyn Display) {
        if let Some(sprite) = self.sprite.take() {
            display.move_sprite(sprite, OFFSCREEN.0, OFFSCREEN.1);
            display.destroy_sprite(sprite);
        }
    }

    // ── Key indicator ──

    /// Encoded print payload: AT y x, INK i, PAPER p, tile (or blank).
    pub fn key_print_string(&self, visible: bool) -> [u8; 8] {
        [
            PRINT_AT,
            self.collectable.y,
            self.collectable.x,
            PRINT_INK,
            self.key_ink,
            PRINT_PAPER,
            self.key_paper,
            if visible { self.key_tile } else { TILE_BLANK },
        ]
    }

    pub fn display_key(&self, visible: bool, display: &mut dyn Display) {
        display.print_string(&self.key_print_string(visible), PrintArea::Level);
    }

    // ── Collectable callbacks ──

    /// The runner took the key: hide it, open up, arm the open timer.
    pub fn key_collected(&mut self, display: &mut dyn Display) {
        self.open_for(self.open_secs, display);
    }

    /// Open time is up: key back, door closing. Status 0 = timer stays off.
    pub fn open_timeup(&mut self, display: &mut dyn Display) -> u8 {
        self.collectable.set_state(Availability::Available);
        self.display_key(true, display);
        self.start_motion(DoorMotion::Closing);
        0
    }

    fn open_for(&mut self, secs: u16, display: &mut dyn Display) {
        self.display_key(false, display);
        self.start_motion(DoorMotion::Opening);
        self.collectable.start_timer(secs);
    }

    fn start_motion(&mut self, motion: DoorMotion) {
        self.motion = motion;
        self.anim_step = 0;
    }

    // ── Per-tick ──

    /// Advance the motion by one frame. Called every tick whatever the phase;
    /// does nothing, not even a redraw, while stationary.
    pub fn animate(&mut self, display: &mut dyn Display) {
        if self.motion == DoorMotion::Stationary {
            return;
        }

        self.anim_step = self.anim_step.saturating_add(1);
        if self.anim_step >= self.frames_per_step.max(1) {
            self.anim_step = 0;
            match self.motion {
                DoorMotion::Opening => {
                    self.offset += 1;
                    if self.offset >= DOOR_MAX_TRAVEL {
                        self.offset = DOOR_MAX_TRAVEL;
                        self.motion = DoorMotion::Stationary;
                    }
                }
                DoorMotion::Closing => {
                    self.offset = self.offset.saturating_sub(1);
                    if self.offset == 0 {
                        self.motion = DoorMotion::Stationary;
                    }
                }
                DoorMotion::Stationary => {}
            }
        }

        debug_assert!(self.offset <= DOOR_MAX_TRAVEL);
        if let Some(sprite) = self.sprite {
            let (x, y) = self.screen_location_with_offset();
            display.move_sprite(sprite, x, y);
        }
    }

    /// Runner is in `cell`. If that is the passthrough cell of an opened
    /// door, the door stays open for good. Returns true when that happened.
    pub fn check_passed_through(&mut self, cell: (i32, i32)) -> bool {
        if !self.is_valid() || self.collectable.state() != Availability::NotAvailable {
            return false;
        }
        if cell != (i32::from(self.pass_x), i32::from(self.pass_y)) {
            return false;
        }
        self.collectable.cancel_timer();
        self.collectable.disarm();
        true
    }
}

impl CollectableOwner for Door {
    fn collectable(&self) -> &Collectable {
        &self.collectable
    }
    fn collectable_mut(&mut self) -> &mut Collectable {
        &mut self.collectable
    }
    fn collected(&mut self, display: &mut dyn Display) {
        self.key_collected(display);
    }
    fn timed_out(&mut self, display: &mut dyn Display) -> u8 {
        self.open_timeup(display)
    }
}

/// Ask for each live door's key cell to be redrawn, so the key tile is
/// restored after the door sprite moved across it.
pub fn validate_cells(doors: &[Door], display: &mut dyn Display) {
    for door in doors.iter().take_while(|d| d.is_valid()) {
        display.invalidate_region(CellRect::cell(door.collectable.x, door.collectable.y));
    }
}
