/// Level tiles and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.

use crate::platform::{TILE_BLANK, TILE_EXIT, TILE_WALL};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tile {
    #[default]
    Empty,
    Wall,
    Exit,
}

impl Tile {
    /// Does this tile stop the runner (floor, ceiling or wall)?
    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Wall)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Tile::Exit)
    }

    /// Byte used when printing the tile through the text service.
    pub fn print_byte(self) -> u8 {
        match self {
            Tile::Empty => TILE_BLANK,
            Tile::Wall => TILE_WALL,
            Tile::Exit => TILE_EXIT,
        }
    }
}
