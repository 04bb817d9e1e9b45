/// WorldState: the complete snapshot of a running game.
///
/// One explicit context object owns everything the loop and its
/// collaborators share: the level's tiles, the runner, the current level's
/// door and pill arrays, the control-key flags and the scores. Per-level
/// parts are replaced wholesale by `level::install_level`.
///
/// Door and pill arrays keep sentinel semantics: iteration stops at the
/// first invalid entry, whatever follows it.

use crate::domain::collectable::live;
use crate::domain::door::Door;
use crate::domain::pill::{self, SlowdownPill};
use crate::domain::runner::{Facing, Runner, Terrain};
use crate::domain::tile::Tile;
use crate::platform::{Display, Glyph, SpriteHandle, OFFSCREEN};
use crate::sim::scoring::Scoring;

/// Runner sits between pills (plane 0) and doors (plane 1).
const RUNNER_PLANE: u8 = 0;

pub struct WorldState {
    // ── Level geometry ──
    pub tiles: Vec<Vec<Tile>>,
    pub width: usize,
    pub height: usize,

    // ── Entities ──
    pub runner: Runner,
    pub spawn: (u8, u8),
    pub doors: Vec<Door>,
    pub pills: Vec<SlowdownPill>,
    pub pill_secs: u16,

    // ── Control key ──
    /// Key is down this tick.
    pub key_pressed: bool,
    /// The current press has been acted on; cleared on release.
    pub key_processed: bool,

    // ── Game tracking ──
    pub scoring: Scoring,
    pub slowdowns_disabled: bool,
    pub current_level: usize,
    pub level_name: String,
    pub frame: u64,

    runner_sprite: Option<SpriteHandle>,
}

// ── Construction ──

impl WorldState {
    pub fn new() -> Self {
        WorldState {
            tiles: vec![],
            width: 0,
            height: 0,
            runner: Runner::at_cell(0, 0),
            spawn: (0, 0),
            doors: vec![],
            pills: vec![],
            pill_secs: 0,
            key_pressed: false,
            key_processed: false,
            scoring: Scoring::default(),
            slowdowns_disabled: false,
            current_level: 0,
            level_name: String::new(),
            frame: 0,
            runner_sprite: None,
        }
    }
}

impl Default for WorldState {
    fn default() -> Self {
        WorldState::new()
    }
}

// ── Tile queries ──

impl WorldState {
    /// Tile at (cx, cy); out of bounds = wall.
    #[inline]
    pub fn tile_at(&self, cx: i32, cy: i32) -> Tile {
        if cx < 0 || cy < 0 {
            return Tile::Wall;
        }
        let (x, y) = (cx as usize, cy as usize);
        if x < self.width && y < self.height {
            self.tiles[y][x]
        } else {
            Tile::Wall
        }
    }

    pub fn runner_on_exit(&self) -> bool {
        let (cx, cy) = self.runner.cell();
        self.tile_at(cx, cy).is_exit()
    }

    pub fn slowdown_active(&self) -> bool {
        !self.slowdowns_disabled && pill::slowdown_active(&self.pills)
    }

    pub fn live_doors(&self) -> impl Iterator<Item = &Door> {
        live(&self.doors)
    }
}

impl Terrain for WorldState {
    fn is_solid(&self, cx: i32, cy: i32) -> bool {
        self.tile_at(cx, cy).is_solid() || self.live_doors().any(|d| d.blocks(cx, cy))
    }
}

// ── Runner control ──

impl WorldState {
    /// Apply the level geometry to the runner (jump arc, ceilings, landing).
    pub fn position_runner(&mut self) {
        let mut runner = self.runner;
        runner.position_runner(&*self);
        self.runner = runner;
    }

    pub fn spawn_runner(&mut self, display: &mut dyn Display) {
        self.runner = Runner::at_cell(self.spawn.0, self.spawn.1);
        let sprite = display.create_sprite(Glyph::Runner, RUNNER_PLANE);
        self.runner_sprite = Some(sprite);
        self.draw_runner(display);
    }

    pub fn draw_runner(&self, display: &mut dyn Display) {
        if let Some(sprite) = self.runner_sprite {
            let frame = match self.runner.facing {
                Facing::Left => 0,
                Facing::Right => 1,
            };
            display.set_sprite_frame(sprite, frame);
            display.move_sprite(sprite, self.runner.x, self.runner.y);
        }
    }

    #[cfg(test)]
    pub fn runner_sprite(&self) -> Option<SpriteHandle> {
        self.runner_sprite
    }

    /// Release every sprite of the current level. Every array entry is
    /// visited, sentinel or not, since only created objects hold a sprite.
    pub fn clear_level(&mut self, display: &mut dyn Display) {
        for door in &mut self.doors {
            door.destroy(display);
        }
        for pill in &mut self.pills {
            pill.destroy(display);
        }
        if let Some(sprite) = self.runner_sprite.take() {
            display.move_sprite(sprite, OFFSCREEN.0, OFFSCREEN.1);
            display.destroy_sprite(sprite);
        }
        self.doors.clear();
        self.pills.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collectable::collect;
    use crate::platform::recording::RecordingDisplay;

    fn world() -> WorldState {
        let mut w = WorldState::new();
        w.width = 4;
        w.height = 3;
        w.tiles = vec![vec![Tile::Empty; 4]; 3];
        w.tiles[2] = vec![Tile::Wall; 4];
        w.tiles[1][3] = Tile::Exit;
        w
    }

    #[test]
    fn outside_the_map_is_wall() {
        let w = world();
        assert!(w.is_solid(-1, 0));
        assert!(w.is_solid(4, 0));
        assert!(w.is_solid(0, 3));
        assert!(!w.is_solid(0, 0));
        assert!(w.is_solid(1, 2));
    }

    #[test]
    fn closed_door_is_solid_until_fully_open() {
        let mut disp = RecordingDisplay::new();
        let mut w = world();
        let mut door = Door::new((0, 1), (2, 1));
        door.create(&mut disp);
        w.doors.push(door);
        assert!(w.is_solid(2, 1));

        collect(&mut w.doors[0], &mut disp).unwrap();
        for _ in 0..8 {
            w.doors[0].animate(&mut disp);
        }
        assert!(!w.is_solid(2, 1));
    }

    #[test]
    fn doors_past_a_sentinel_are_ignored() {
        let mut w = world();
        w.doors.push(Door::sentinel());
        w.doors.push(Door::new((0, 1), (2, 1)));
        assert!(!w.is_solid(2, 1));
    }

    #[test]
    fn exit_detection_uses_runner_cell() {
        let mut w = world();
        w.runner = Runner::at_cell(3, 1);
        assert!(w.runner_on_exit());
        w.runner = Runner::at_cell(2, 1);
        assert!(!w.runner_on_exit());
    }

    #[test]
    fn clear_level_destroys_all_sprites() {
        let mut disp = RecordingDisplay::new();
        let mut w = world();
        w.spawn = (0, 1);
        w.spawn_runner(&mut disp);
        let mut door = Door::new((0, 1), (2, 1));
        door.create(&mut disp);
        w.doors.push(door);
        let mut pill = SlowdownPill::new(1, 1, 5);
        pill.create(&mut disp);
        w.pills.push(pill);

        w.clear_level(&mut disp);
        let destroyed = disp
            .calls
            .iter()
            .filter(|c| matches!(c, crate::platform::recording::Call::Destroy(_)))
            .count();
        assert_eq!(destroyed, 3);
        assert!(w.doors.is_empty());
        assert!(w.runner_sprite().is_none());
    }
}
