/// Platform collaborator contracts.
///
/// The simulation core never draws, polls hardware or sleeps by itself.
/// Everything it needs from the outside goes through these traits:
///   - `SpriteService`: movable sprites and the frame commit
///   - `TextService`  : encoded print strings
///   - `InputService` : one poll per tick, key-down queries
///   - `FrameSync`    : the single suspension point of each tick
///
/// The terminal implementations live in `ui/`. `recording` holds the
/// scripted fakes used by the unit tests.

use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// Pixels per map cell along either axis.
pub const PIXELS_PER_CELL: i32 = 8;

/// Pixel position that is guaranteed to be off the map.
pub const OFFSCREEN: (i32, i32) = (-8 * PIXELS_PER_CELL, -8 * PIXELS_PER_CELL);

// ── Print string control codes ──

pub const PRINT_AT: u8 = 0x16;
pub const PRINT_INK: u8 = 0x10;
pub const PRINT_PAPER: u8 = 0x11;
pub const PRINT_ATTR: u8 = 0x14;

/// Tile byte that prints nothing (the "hidden" sentinel).
pub const TILE_BLANK: u8 = 255;
pub const TILE_WALL: u8 = 0x80;
pub const TILE_EXIT: u8 = 0x81;
pub const TILE_KEY: u8 = 0x90;

/// Spectrum-style colour index, 0..=7.
pub type Colour = u8;

pub mod colour {
    use super::Colour;
    pub const BLACK: Colour = 0;
    pub const BLUE: Colour = 1;
    pub const RED: Colour = 2;
    pub const MAGENTA: Colour = 3;
    pub const GREEN: Colour = 4;
    pub const CYAN: Colour = 5;
    pub const YELLOW: Colour = 6;
    pub const WHITE: Colour = 7;
}

/// Drawing plane. Higher planes are drawn over lower ones.
pub type Plane = u8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SpriteHandle(pub u16);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Glyph {
    Runner,
    Door,
    Pill,
}

/// Rectangle of map cells.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CellRect {
    pub x: u8,
    pub y: u8,
    pub w: u8,
    pub h: u8,
}

impl CellRect {
    pub fn cell(x: u8, y: u8) -> Self {
        CellRect { x, y, w: 1, h: 1 }
    }
}

/// Where a print string lands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PrintArea {
    /// Map grid: one byte per map cell.
    Level,
    /// Status lines under the map: one byte per terminal column.
    Status,
}

/// Logical key identifier for the single control key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum KeyId {
    Char(char),
    Enter,
}

pub trait SpriteService {
    fn create_sprite(&mut self, glyph: Glyph, plane: Plane) -> SpriteHandle;
    fn move_sprite(&mut self, handle: SpriteHandle, pixel_x: i32, pixel_y: i32);
    /// Select the animation frame drawn for the sprite.
    fn set_sprite_frame(&mut self, handle: SpriteHandle, frame: u8);
    /// Colour the cells the sprite occupies.
    fn set_cell_colour(&mut self, handle: SpriteHandle, colour: Colour);
    fn destroy_sprite(&mut self, handle: SpriteHandle);
    /// Force the cells in `rect` to be redrawn on the next commit.
    fn invalidate_region(&mut self, rect: CellRect);
    /// Commit everything queued this tick to the screen.
    fn update_now(&mut self) -> io::Result<()>;
}

pub trait TextService {
    fn print_string(&mut self, encoded: &[u8], area: PrintArea);
}

/// Everything the core draws through.
pub trait Display: SpriteService + TextService {}

impl<T: SpriteService + TextService> Display for T {}

pub trait InputService {
    /// Sample the device. Called exactly once per tick.
    fn poll(&mut self);
    fn is_key_down(&self, key: KeyId) -> bool;
    /// The player asked for the machine to be reset (Ctrl-C / Esc).
    fn reset_requested(&self) -> bool;
}

pub trait FrameSync {
    /// Block until the next fixed tick boundary.
    fn wait_for_tick(&mut self);
}

/// Fixed-rate heartbeat: sleeps until the next tick deadline.
/// If a frame overran, the schedule restarts from now instead of bursting.
pub struct FixedRateClock {
    period: Duration,
    next: Instant,
}

impl FixedRateClock {
    pub fn new(period: Duration) -> Self {
        FixedRateClock { period, next: Instant::now() + period }
    }
}

impl FrameSync for FixedRateClock {
    fn wait_for_tick(&mut self) {
        let now = Instant::now();
        if now < self.next {
            thread::sleep(self.next - now);
            self.next += self.period;
        } else {
            self.next = now + self.period;
        }
    }
}
