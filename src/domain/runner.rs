/// The runner: the one thing the player controls, with a single key.
///
/// Position is in pixels, 8 per map cell. The runner is one cell in size.
/// It runs sideways on its own, turns at walls, and jumps when the key
/// goes down. Falling, turning and moving are chosen by the action
/// resolver; the jump arc is advanced here by `position_runner`.

use crate::platform::PIXELS_PER_CELL;

/// Anything the runner can collide with.
pub trait Terrain {
    /// Cell coordinates; out-of-map cells must report solid.
    fn is_solid(&self, cx: i32, cy: i32) -> bool;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    pub fn dx(self) -> i32 {
        match self {
            Facing::Left => -1,
            Facing::Right => 1,
        }
    }

    pub fn flipped(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Vertical pixel deltas of one jump, one entry per tick.
pub const JUMP_TABLE: [i8; 18] = [-2, -2, -2, -2, -1, -1, -1, -1, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];

/// First entry of the descending half.
const JUMP_DESCENT: u8 = 10;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Runner {
    pub x: i32,
    pub y: i32,
    pub facing: Facing,
    /// Index into `JUMP_TABLE`; `None` when not jumping.
    jump: Option<u8>,
}

fn cell_of(px: i32) -> i32 {
    px.div_euclid(PIXELS_PER_CELL)
}

fn aligned(px: i32) -> bool {
    px.rem_euclid(PIXELS_PER_CELL) == 0
}

impl Runner {
    pub fn at_cell(cx: u8, cy: u8) -> Self {
        Runner {
            x: i32::from(cx) * PIXELS_PER_CELL,
            y: i32::from(cy) * PIXELS_PER_CELL,
            facing: Facing::Right,
            jump: None,
        }
    }

    #[inline]
    pub fn is_jumping(&self) -> bool {
        self.jump.is_some()
    }

    /// Cell the runner's centre is in.
    pub fn cell(&self) -> (i32, i32) {
        let half = PIXELS_PER_CELL / 2;
        (cell_of(self.x + half), cell_of(self.y + half))
    }

    /// Columns covered by the runner's box.
    fn columns(&self) -> [i32; 2] {
        [cell_of(self.x), cell_of(self.x + PIXELS_PER_CELL - 1)]
    }

    fn rows(&self) -> [i32; 2] {
        [cell_of(self.y), cell_of(self.y + PIXELS_PER_CELL - 1)]
    }

    pub fn on_floor(&self, terrain: &impl Terrain) -> bool {
        if !aligned(self.y) {
            return false;
        }
        let below = cell_of(self.y) + 1;
        self.columns().iter().any(|&cx| terrain.is_solid(cx, below))
    }

    pub fn ceiling_above(&self, terrain: &impl Terrain) -> bool {
        if !aligned(self.y) {
            return false;
        }
        let above = cell_of(self.y) - 1;
        self.columns().iter().any(|&cx| terrain.is_solid(cx, above))
    }

    /// Solid cell directly in the running direction.
    pub fn wall_ahead(&self, terrain: &impl Terrain) -> bool {
        if !aligned(self.x) {
            return false;
        }
        let ahead = cell_of(self.x) + self.facing.dx();
        self.rows().iter().any(|&cy| terrain.is_solid(ahead, cy))
    }

    pub fn start_jumping(&mut self) {
        debug_assert!(!self.is_jumping(), "jump started mid-jump");
        self.jump = Some(0);
    }

    pub fn toggle_direction(&mut self) {
        self.facing = self.facing.flipped();
    }

    /// Settle the runner against the level for this tick: advance the jump
    /// arc one entry, a pixel at a time. Hitting a ceiling cuts straight to
    /// the descent; touching a floor on the way down ends the jump.
    pub fn position_runner(&mut self, terrain: &impl Terrain) {
        let Some(step) = self.jump else { return };

        let dy = JUMP_TABLE[usize::from(step)];
        let mut next = step + 1;

        for _ in 0..dy.unsigned_abs() {
            if dy < 0 {
                if self.ceiling_above(terrain) {
                    next = next.max(JUMP_DESCENT);
                    break;
                }
                self.y -= 1;
            } else {
                if self.on_floor(terrain) {
                    self.jump = None;
                    return;
                }
                self.y += 1;
            }
        }

        if dy > 0 && self.on_floor(terrain) {
            self.jump = None;
        } else if usize::from(next) >= JUMP_TABLE.len() {
            // arc finished in mid air; gravity takes over
            self.jump = None;
        } else {
            self.jump = Some(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Open room 10x6 with a floor on row 5.
    struct Room {
        walls: Vec<(i32, i32)>,
    }

    impl Room {
        fn new() -> Self {
            Room { walls: (0..10).map(|x| (x, 5)).collect() }
        }
        fn with(mut self, x: i32, y: i32) -> Self {
            self.walls.push((x, y));
            self
        }
    }

    impl Terrain for Room {
        fn is_solid(&self, cx: i32, cy: i32) -> bool {
            !(0..10).contains(&cx) || !(0..6).contains(&cy) || self.walls.contains(&(cx, cy))
        }
    }

    #[test]
    fn standing_on_floor() {
        let room = Room::new();
        let r = Runner::at_cell(2, 4);
        assert!(r.on_floor(&room));
        let mut air = r;
        air.y -= 8;
        assert!(!air.on_floor(&room));
    }

    #[test]
    fn straddling_a_ledge_is_still_on_floor() {
        let room = Room { walls: vec![(3, 3)] };
        let mut r = Runner::at_cell(2, 2);
        r.x += 4;
        assert!(r.on_floor(&room));
    }

    #[test]
    fn wall_ahead_depends_on_facing() {
        let room = Room::new().with(3, 4);
        let mut r = Runner::at_cell(2, 4);
        assert!(r.wall_ahead(&room));
        r.toggle_direction();
        assert!(!r.wall_ahead(&room));
        r.x += 1;
        r.toggle_direction();
        assert!(!r.wall_ahead(&room));
    }

    #[test]
    fn jump_arc_lands_where_it_started() {
        let room = Room::new();
        let mut r = Runner::at_cell(2, 4);
        let start_y = r.y;
        r.start_jumping();
        let mut peak = r.y;
        let mut ticks = 0;
        while r.is_jumping() {
            r.position_runner(&room);
            peak = peak.min(r.y);
            ticks += 1;
            assert!(ticks <= JUMP_TABLE.len());
        }
        assert_eq!(r.y, start_y);
        assert_eq!(start_y - peak, 12);
        assert!(r.on_floor(&room));
    }

    #[test]
    fn ceiling_cuts_jump_short() {
        let room = Room::new().with(2, 3);
        let mut r = Runner::at_cell(2, 4);
        r.start_jumping();
        r.position_runner(&room);
        assert_eq!(r.y, 32);
        assert!(r.is_jumping());
        while r.is_jumping() {
            r.position_runner(&room);
        }
        assert_eq!(r.y, 32);
    }

    #[test]
    fn cell_uses_centre() {
        let mut r = Runner::at_cell(2, 4);
        assert_eq!(r.cell(), (2, 4));
        r.x += 4;
        assert_eq!(r.cell(), (3, 4));
    }

    #[test]
    fn out_of_map_is_solid() {
        let room = Room::new();
        let r = Runner::at_cell(0, 4);
        let mut left = r;
        left.facing = Facing::Left;
        assert!(left.wall_ahead(&room));
    }
}
