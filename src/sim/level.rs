/// Level loader.
///
/// ## Sources (in play order):
///   1. Built-in embedded levels
///   2. `levels/` directory (individual `.txt` files, sorted by file name)
///
/// A file that fails to parse is logged and skipped.
///
/// ## Level format (`.txt`):
///   Line 1: `# Level Name`
///   `@` lines: metadata (anywhere in the file)
///   Other lines: map rows, all the same width
///
/// ## Metadata:
///   `@ score=5000 bonus=350 bonus_step=50 pill_secs=10`
///   `@ score_at=0,0 bonus_at=16,0 score_ink=7 score_paper=0`   (status line layout)
///   `@ door=A open=3 start=0 ink=5 key_ink=6 key_paper=0 tile=144 pass=12,7 opens=up step=1`
///   `@ door=A invalid`   (append an end-of-list marker after the live doors)
///
/// `opens` is `up` (bottom to top), `right` (left to right) or `left`
/// (right to left). `pass` defaults to the cell right of the door.
///
/// ## Tile legend:
///   '#' = Wall            'X' = Exit
///   'P' = Runner spawn    '*' = Slowdown pill
///   'A'..'O' = Door       'a'..'o' = Key for the door with that letter
///   ' ' = Empty

use std::path::Path;

use thiserror::Error;

use crate::domain::collectable::live_mut;
use crate::domain::door::{Door, OpensDirection};
use crate::domain::pill::SlowdownPill;
use crate::domain::tile::Tile;
use crate::platform::{colour, Display, PrintArea, PRINT_AT, PRINT_INK, PRINT_PAPER};
use crate::sim::scoring::{
    attribute, ScoreScreenData, DEFAULT_BONUS_STEP, DEFAULT_LEVEL_BONUS, DEFAULT_LEVEL_SCORE,
};
use crate::sim::world::WorldState;

const DEFAULT_PILL_SECS: u16 = 10;
const MAX_DIMENSION: usize = 255;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("level has no map rows")]
    Empty,
    #[error("row {row} is {len} wide, expected {expected}")]
    RaggedRows { row: usize, len: usize, expected: usize },
    #[error("map is larger than 255x255")]
    TooLarge,
    #[error("no runner spawn ('P') in map")]
    MissingSpawn,
    #[error("metadata refers to door '{0}' which is not in the map")]
    UnknownDoor(char),
    #[error("key '{0}' has no matching door")]
    UnknownKey(char),
    #[error("door '{0}' has no key")]
    MissingKey(char),
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// A parsed level, ready to be installed into the world.
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Vec<Tile>>,
    pub spawn: (u8, u8),
    /// Live doors in letter order, then any sentinels.
    pub doors: Vec<Door>,
    pub pills: Vec<SlowdownPill>,
    pub score: u16,
    pub bonus: u16,
    pub bonus_step: u16,
    pub pill_secs: u16,
    pub score_screen: ScoreScreenData,
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Embedded levels followed by the directory's levels.
pub fn load_levels(dir: &Path) -> Vec<LevelDef> {
    let mut levels: Vec<LevelDef> = embedded_levels()
        .iter()
        .filter_map(|(label, text)| match parse_level(text) {
            Ok(def) => Some(def),
            Err(e) => {
                log::error!("built-in level {label}: {e}");
                None
            }
        })
        .collect();

    if dir.is_dir() {
        levels.extend(load_from_directory(dir));
    }
    log::info!("{} levels available", levels.len());
    levels
}

/// Replace the world's per-level state with `def` and draw it.
pub fn install_level(world: &mut WorldState, def: &LevelDef, index: usize, display: &mut dyn Display) {
    world.clear_level(display);

    world.tiles = def.tiles.clone();
    world.width = def.width;
    world.height = def.height;
    world.spawn = def.spawn;
    world.pill_secs = def.pill_secs;
    world.current_level = index;
    world.level_name = def.name.clone();
    world.frame = 0;

    for (y, row) in def.tiles.iter().enumerate() {
        display.print_string(&row_print_string(y as u8, row), PrintArea::Level);
    }

    world.doors = def.doors.clone();
    for door in live_mut(&mut world.doors) {
        door.create(display);
    }
    world.pills = def.pills.clone();
    for pill in live_mut(&mut world.pills) {
        pill.create(display);
    }

    world.scoring.screen = def.score_screen;
    world.scoring.set_level(def.score, def.bonus, def.bonus_step);
    world.spawn_runner(display);
    // a key held across the level change is not a fresh press
    world.key_processed = world.key_pressed;

    log::info!(
        "level {} \"{}\": {} doors, {} pills",
        index + 1,
        def.name,
        world.live_doors().count(),
        world.pills.len()
    );
}

/// AT y 0, INK, PAPER, then one tile byte per cell.
fn row_print_string(y: u8, row: &[Tile]) -> Vec<u8> {
    let mut out = vec![PRINT_AT, y, 0, PRINT_INK, colour::WHITE, PRINT_PAPER, colour::BLACK];
    out.extend(row.iter().map(|t| t.print_byte()));
    out
}

// ══════════════════════════════════════════════════════════════
// Single-level parsing
// ══════════════════════════════════════════════════════════════

pub fn parse_level(content: &str) -> Result<LevelDef, LevelError> {
    let mut name = String::new();
    let mut rows: Vec<(usize, &str)> = vec![];
    let mut meta: Vec<(usize, &str)> = vec![];

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if let Some(rest) = line.strip_prefix('@') {
            meta.push((line_no, rest));
        } else if name.is_empty() && rows.is_empty() && is_name_line(line) {
            name = line[1..].trim().to_string();
        } else if !(rows.is_empty() && line.trim().is_empty()) {
            rows.push((line_no, line));
        }
    }

    while rows.last().map_or(false, |(_, r)| r.trim().is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return Err(LevelError::Empty);
    }

    let width = rows[0].1.chars().count();
    let height = rows.len();
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(LevelError::TooLarge);
    }

    let mut tiles = vec![vec![Tile::Empty; width]; height];
    let mut spawn = None;
    let mut door_cells: [Option<(u8, u8)>; 15] = [None; 15];
    let mut key_cells: [Option<(u8, u8)>; 15] = [None; 15];
    let mut pills = vec![];

    for (y, (line_no, row)) in rows.iter().enumerate() {
        let len = row.chars().count();
        if len != width {
            return Err(LevelError::RaggedRows { row: y, len, expected: width });
        }
        for (x, ch) in row.chars().enumerate() {
            let cell = (x as u8, y as u8);
            match ch {
                '#' => tiles[y][x] = Tile::Wall,
                'X' => tiles[y][x] = Tile::Exit,
                'P' => spawn = Some(cell),
                '*' => pills.push(cell),
                'A'..='O' => {
                    let slot = &mut door_cells[letter_index(ch)];
                    if slot.is_some() {
                        return Err(malformed(*line_no, format!("door '{ch}' appears twice")));
                    }
                    *slot = Some(cell);
                }
                'a'..='o' => {
                    let slot = &mut key_cells[letter_index(ch)];
                    if slot.is_some() {
                        return Err(malformed(*line_no, format!("key '{ch}' appears twice")));
                    }
                    *slot = Some(cell);
                }
                ' ' | '.' => {}
                other => {
                    return Err(malformed(*line_no, format!("unknown tile {other:?}")));
                }
            }
        }
    }

    let spawn = spawn.ok_or(LevelError::MissingSpawn)?;

    // Doors in letter order; every door needs its key and vice versa.
    let mut doors: Vec<(char, Door)> = vec![];
    for i in 0..door_cells.len() {
        let letter = (b'A' + i as u8) as char;
        match (door_cells[i], key_cells[i]) {
            (Some(cell), Some(key)) => doors.push((letter, Door::new(key, cell))),
            (Some(_), None) => return Err(LevelError::MissingKey(letter)),
            (None, Some(_)) => return Err(LevelError::UnknownKey(letter.to_ascii_lowercase())),
            (None, None) => {}
        }
    }

    let mut def = LevelDef {
        name: if name.is_empty() { "Unnamed Level".to_string() } else { name },
        width,
        height,
        tiles,
        spawn,
        doors: vec![],
        pills: vec![],
        score: DEFAULT_LEVEL_SCORE,
        bonus: DEFAULT_LEVEL_BONUS,
        bonus_step: DEFAULT_BONUS_STEP,
        pill_secs: DEFAULT_PILL_SECS,
        score_screen: ScoreScreenData::default(),
    };

    let mut sentinels = 0;
    for (line_no, text) in meta {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        match tokens.first().and_then(|t| t.strip_prefix("door=")) {
            Some(letter) => {
                let letter = single_letter(letter).ok_or_else(|| malformed(line_no, "bad door letter".into()))?;
                if tokens[1..] == ["invalid"] {
                    sentinels += 1;
                    continue;
                }
                let door = doors
                    .iter_mut()
                    .find(|(l, _)| *l == letter)
                    .map(|(_, d)| d)
                    .ok_or(LevelError::UnknownDoor(letter))?;
                apply_door_meta(door, &tokens[1..], line_no)?;
            }
            None => apply_level_meta(&mut def, &tokens, line_no)?,
        }
    }

    def.doors = doors.into_iter().map(|(_, d)| d).collect();
    def.doors.extend((0..sentinels).map(|_| Door::sentinel()));
    def.pills = pills
        .into_iter()
        .map(|(x, y)| SlowdownPill::new(x, y, def.pill_secs))
        .collect();

    Ok(def)
}

fn apply_level_meta(def: &mut LevelDef, tokens: &[&str], line: usize) -> Result<(), LevelError> {
    let screen = &def.score_screen;
    let (mut ink, mut paper) = (screen.attribute & 7, (screen.attribute >> 3) & 7);
    for token in tokens {
        let (key, value) = split_pair(token, line)?;
        match key {
            "score" => def.score = number(value, line)?,
            "bonus" => def.bonus = number(value, line)?,
            "bonus_step" => def.bonus_step = number(value, line)?,
            "pill_secs" => def.pill_secs = number(value, line)?,
            "score_at" => {
                (def.score_screen.level_score_x, def.score_screen.level_score_y) = cell_pair(value, line)?
            }
            "bonus_at" => (def.score_screen.bonus_x, def.score_screen.bonus_y) = cell_pair(value, line)?,
            "score_ink" => ink = colour_value(value, line)?,
            "score_paper" => paper = colour_value(value, line)?,
            _ => return Err(malformed(line, format!("unknown level setting '{key}'"))),
        }
    }
    def.score_screen.attribute = attribute(ink, paper);
    Ok(())
}

fn apply_door_meta(door: &mut Door, tokens: &[&str], line: usize) -> Result<(), LevelError> {
    for token in tokens {
        let (key, value) = split_pair(token, line)?;
        match key {
            "open" => door.open_secs = number(value, line)?,
            "start" => door.start_open_secs = number(value, line)?,
            "ink" => door.ink = colour_value(value, line)?,
            "key_ink" => door.key_ink = colour_value(value, line)?,
            "key_paper" => door.key_paper = colour_value(value, line)?,
            "tile" => door.key_tile = number(value, line)?,
            "step" => door.frames_per_step = number(value, line)?,
            "pass" => (door.pass_x, door.pass_y) = cell_pair(value, line)?,
            "opens" => {
                door.opens = match value {
                    "up" => OpensDirection::BottomToTop,
                    "right" => OpensDirection::LeftToRight,
                    "left" => OpensDirection::RightToLeft,
                    _ => return Err(malformed(line, format!("unknown direction '{value}'"))),
                }
            }
            _ => return Err(malformed(line, format!("unknown door setting '{key}'"))),
        }
    }
    Ok(())
}

fn split_pair<'a>(token: &'a str, line: usize) -> Result<(&'a str, &'a str), LevelError> {
    token
        .split_once('=')
        .ok_or_else(|| malformed(line, format!("expected key=value, got '{token}'")))
}

fn cell_pair(value: &str, line: usize) -> Result<(u8, u8), LevelError> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| malformed(line, format!("expected x,y, got '{value}'")))?;
    Ok((number(x, line)?, number(y, line)?))
}

fn number<T: std::str::FromStr>(value: &str, line: usize) -> Result<T, LevelError> {
    value
        .parse()
        .map_err(|_| malformed(line, format!("bad number '{value}'")))
}

fn colour_value(value: &str, line: usize) -> Result<u8, LevelError> {
    let c: u8 = number(value, line)?;
    if c > colour::WHITE {
        return Err(malformed(line, format!("colour {c} out of range 0..7")));
    }
    Ok(c)
}

fn malformed(line: usize, reason: String) -> LevelError {
    LevelError::Malformed { line, reason }
}

fn letter_index(ch: char) -> usize {
    (ch.to_ascii_uppercase() as u8 - b'A') as usize
}

fn single_letter(s: &str) -> Option<char> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c @ 'A'..='O'), None) => Some(c),
        _ => None,
    }
}

/// Distinguish `# Level Name` from a map row starting with a wall.
/// A name line has a character that is not a tile, or two lowercase
/// letters in a row (keys are never written side by side).
fn is_name_line(line: &str) -> bool {
    let Some(after_hash) = line.strip_prefix('#') else { return false };
    let is_tile = |c: char| matches!(c, '#' | ' ' | '.' | 'X' | 'P' | '*' | 'A'..='O' | 'a'..='o');
    if after_hash.chars().any(|c| !is_tile(c)) {
        return true;
    }
    let chars: Vec<char> = after_hash.chars().collect();
    chars.windows(2).any(|w| w[0].is_ascii_lowercase() && w[1].is_ascii_lowercase())
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            log::warn!("cannot read levels dir {}: {e}", dir.display());
            return vec![];
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |e| e == "txt"))
        .collect();
    paths.sort();

    let mut results = vec![];
    for path in paths {
        match std::fs::read_to_string(&path) {
            Ok(content) => match parse_level(&content) {
                Ok(def) => results.push(def),
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            },
            Err(e) => log::warn!("could not read {}: {e}", path.display()),
        }
    }
    results
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

fn embedded_levels() -> [(&'static str, &'static str); 3] {
    [
        ("1", LEVEL_FIRST_KEY),
        ("2", LEVEL_TWO_GATES),
        ("3", LEVEL_OPEN_SESAME),
    ]
}

const LEVEL_FIRST_KEY: &str = "\
# First Key
@ score=5000 bonus=350 bonus_step=50 pill_secs=8
@ door=A open=4 ink=5 key_ink=6
################################
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#  P    a     #    *  A     X  #
################################
";

const LEVEL_TWO_GATES: &str = "\
# Two Gates
@ score=6000 bonus=400 bonus_step=50 pill_secs=10
@ door=A open=3 ink=2 key_ink=2
@ door=B open=5 ink=3 key_ink=3 opens=left pass=24,12
################################
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#  P a   #   A  ## * b B  #  X #
################################
";

const LEVEL_OPEN_SESAME: &str = "\
# Open Sesame
@ score=7000 bonus=500 bonus_step=100 pill_secs=6
@ door=A open=3 start=6 ink=4 key_ink=4 opens=right step=2
@ door=B open=3 ink=6 key_ink=6 key_paper=1
@ door=B invalid
################################
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#                              #
#  P a A  #   *      #  b  B X #
################################
";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collectable::Availability;
    use crate::domain::door::DoorMotion;
    use crate::platform::recording::RecordingDisplay;
    use crate::platform::{Glyph, TILE_BLANK, TILE_KEY, TILE_WALL};

    const SMALL: &str = "\
# Small Room
@ score=100 bonus=10 bonus_step=5 pill_secs=4
@ door=A open=2 start=0 ink=2 key_ink=6 key_paper=0 tile=144 pass=4,1 opens=left step=3
######
#PaA*X
######
";

    #[test]
    fn embedded_levels_all_parse() {
        for (label, text) in embedded_levels() {
            let def = parse_level(text).unwrap_or_else(|e| panic!("level {label}: {e}"));
            assert_eq!(def.width, 32, "level {label}");
            assert!(!def.doors.is_empty());
        }
    }

    #[test]
    fn parses_name_tiles_and_metadata() {
        let def = parse_level(SMALL).unwrap();
        assert_eq!(def.name, "Small Room");
        assert_eq!((def.width, def.height), (6, 3));
        assert_eq!(def.spawn, (1, 1));
        assert_eq!(def.tiles[1][5], Tile::Exit);
        assert_eq!(def.tiles[0][0], Tile::Wall);
        assert_eq!((def.score, def.bonus, def.bonus_step, def.pill_secs), (100, 10, 5, 4));

        assert_eq!(def.doors.len(), 1);
        let door = &def.doors[0];
        assert_eq!((door.cell_x, door.cell_y), (3, 1));
        assert_eq!(door.collectable.cell(), (2, 1));
        assert_eq!(door.open_secs, 2);
        assert_eq!(door.opens, OpensDirection::RightToLeft);
        assert_eq!(door.frames_per_step, 3);
        assert_eq!((door.pass_x, door.pass_y), (4, 1));

        assert_eq!(def.pills.len(), 1);
        assert_eq!(def.pills[0].duration_secs, 4);
    }

    #[test]
    fn score_layout_metadata() {
        let def = parse_level("@ score_at=2,1 bonus_at=20,1 score_ink=6 score_paper=1\n#PaA\n").unwrap();
        let screen = def.score_screen;
        assert_eq!((screen.level_score_x, screen.level_score_y), (2, 1));
        assert_eq!((screen.bonus_x, screen.bonus_y), (20, 1));
        assert_eq!(screen.attribute, attribute(6, 1));

        let def = parse_level(SMALL).unwrap();
        assert_eq!(def.score_screen, ScoreScreenData::default());
    }

    #[test]
    fn map_rows_starting_with_wall_are_not_names() {
        assert!(is_name_line("# First Key"));
        assert!(!is_name_line("#  P a   #   A  ## * b B  #  X #"));
        assert!(!is_name_line("##########"));
    }

    #[test]
    fn invalid_door_appends_sentinel() {
        let def = parse_level(LEVEL_OPEN_SESAME).unwrap();
        assert_eq!(def.doors.len(), 3);
        assert!(def.doors[1].is_valid());
        assert!(!def.doors[2].is_valid());
        assert_eq!(def.doors[0].start_open_secs, 6);
    }

    #[test]
    fn errors() {
        assert_eq!(parse_level("# Nothing Here\n").err(), Some(LevelError::Empty));
        assert_eq!(parse_level("###\n#  \n###\n").err(), Some(LevelError::MissingSpawn));
        assert_eq!(
            parse_level("####\n#P#\n").err(),
            Some(LevelError::RaggedRows { row: 1, len: 3, expected: 4 })
        );
        assert_eq!(parse_level("#PA#\n").err(), Some(LevelError::MissingKey('A')));
        assert_eq!(parse_level("#Pb#\n").err(), Some(LevelError::UnknownKey('b')));
        assert_eq!(parse_level("@ door=C open=1\n#PaA\n").err(), Some(LevelError::UnknownDoor('C')));
        assert!(matches!(
            parse_level("@ door=A open=soon\n#PaA\n"),
            Err(LevelError::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            parse_level("@ door=A opens=down\n#PaA\n"),
            Err(LevelError::Malformed { .. })
        ));
        assert!(matches!(parse_level("####\n#P?#\n"), Err(LevelError::Malformed { line: 2, .. })));
    }

    #[test]
    fn install_draws_map_and_creates_objects() {
        let mut disp = RecordingDisplay::new();
        let mut world = WorldState::new();
        let def = parse_level(SMALL).unwrap();
        install_level(&mut world, &def, 0, &mut disp);

        let prints = disp.prints();
        assert_eq!(prints[0][..3], [PRINT_AT, 0, 0]);
        assert_eq!(prints[0][7], TILE_WALL);
        assert_eq!(prints[1][7 + 2], TILE_BLANK);
        // key tile printed after the map
        assert_eq!(prints[3][7], TILE_KEY);

        assert_eq!(disp.created(Glyph::Door).len(), 1);
        assert_eq!(disp.created(Glyph::Pill).len(), 1);
        assert_eq!(disp.created(Glyph::Runner).len(), 1);
        assert_eq!(world.doors[0].motion(), DoorMotion::Stationary);
        assert_eq!(world.scoring.level_score(), 100);
        assert_eq!(world.runner.cell(), (1, 1));
    }

    #[test]
    fn reinstall_swaps_arrays_and_frees_sprites() {
        let mut disp = RecordingDisplay::new();
        let mut world = WorldState::new();
        let first = parse_level(SMALL).unwrap();
        let second = parse_level(LEVEL_OPEN_SESAME).unwrap();
        install_level(&mut world, &first, 0, &mut disp);
        let old_door = world.doors[0].sprite().unwrap();
        install_level(&mut world, &second, 1, &mut disp);

        assert!(disp.calls.contains(&crate::platform::recording::Call::Destroy(old_door)));
        assert_eq!(world.doors.len(), 3);
        assert_eq!(world.current_level, 1);
        // start-open door begins opening straight away
        assert_eq!(world.doors[0].collectable.state(), Availability::NotAvailable);
        assert_eq!(world.doors[0].motion(), DoorMotion::Opening);
    }
}
