/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// The renderer is the sprite and text service of the game. It keeps
/// three layers and composes them on every commit:
///   - the level print layer: one tile byte + ink/paper per map cell
///   - the status print layer: ASCII text under the map
///   - sprites: pixel-positioned glyphs, drawn at their nearest map cell
///     in plane order over the level layer
///
/// How a commit works:
///   1. Compose the layers into the `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// `invalidate_region` poisons cells in `back`, so they are re-emitted
/// on the next commit even if unchanged.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::platform::{
    colour, CellRect, Colour, Glyph, Plane, PrintArea, SpriteHandle, SpriteService, TextService,
    PIXELS_PER_CELL, PRINT_AT, PRINT_ATTR, PRINT_INK, PRINT_PAPER, TILE_BLANK, TILE_EXIT, TILE_KEY,
    TILE_WALL,
};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// gap between rows matches the cell colour on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell { ch: [b' ', 0, 0, 0], ch_len: 1, fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: [b'?', 0, 0, 0], ch_len: 1, fg: Color::Magenta, bg: Color::Magenta };

    /// Normalize bg: Color::Reset → BASE_BG.
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        let len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.ch_len = len;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width {
                break;
            }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }
}

// ── Layers ──

/// One printed map cell.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct PrintCell {
    tile: u8,
    ink: Colour,
    paper: Colour,
}

impl PrintCell {
    const EMPTY: PrintCell = PrintCell { tile: TILE_BLANK, ink: colour::WHITE, paper: colour::BLACK };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct StatusCell {
    ch: u8,
    ink: Colour,
    paper: Colour,
}

#[derive(Clone, Copy, Debug)]
struct Sprite {
    glyph: Glyph,
    plane: Plane,
    x: i32,
    y: i32,
    frame: u8,
    ink: Colour,
}

/// Grows on demand; out-of-range reads are empty.
struct Grid<T: Copy> {
    width: usize,
    height: usize,
    cells: Vec<T>,
    empty: T,
}

impl<T: Copy> Grid<T> {
    fn new(empty: T) -> Self {
        Grid { width: 0, height: 0, cells: vec![], empty }
    }

    fn get(&self, x: usize, y: usize) -> T {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            self.empty
        }
    }

    fn set(&mut self, x: usize, y: usize, value: T) {
        if x >= self.width || y >= self.height {
            let (w, h) = (self.width.max(x + 1), self.height.max(y + 1));
            let mut cells = vec![self.empty; w * h];
            for row in 0..self.height {
                for col in 0..self.width {
                    cells[row * w + col] = self.cells[row * self.width + col];
                }
            }
            self.width = w;
            self.height = h;
            self.cells = cells;
        }
        self.cells[y * self.width + x] = value;
    }
}

// ── Renderer ──

/// Each map cell = 2 terminal columns.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

/// Sprites on planes up to this one are hidden behind wall tiles.
const BEHIND_WALLS_PLANE: Plane = 1;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    level: Grid<PrintCell>,
    status: Grid<Option<StatusCell>>,
    sprites: Vec<Option<Sprite>>,
    /// Map cells poisoned since the last commit.
    invalid: Vec<CellRect>,
    title: String,
    /// Terminal reports key releases.
    enhanced_keys: bool,
}

impl Renderer {
    pub fn new(title: &str) -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            level: Grid::new(PrintCell::EMPTY),
            status: Grid::new(None),
            sprites: vec![],
            invalid: vec![],
            title: title.to_string(),
            enhanced_keys: false,
        }
    }

    /// Enter the alternate screen. Returns whether key releases will be reported.
    pub fn init(&mut self) -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        self.enhanced_keys = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if self.enhanced_keys {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.resize_buffers(tw as usize, th as usize);
        Ok(self.enhanced_keys)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    fn resize_buffers(&mut self, w: usize, h: usize) {
        self.term_w = w;
        self.term_h = h;
        self.front.resize(w, h);
        self.back.resize(w, h);
        // Force full repaint: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);
    }

    // ── Compose: build front buffer content ──

    fn compose(&mut self) {
        self.front.clear();

        let hud = format!("{}   [control key] jump   [Esc] reset", self.title);
        self.front.put_str(0, HUD_ROW, &hud, Color::Grey, Color::Reset);

        for gy in 0..self.level.height {
            for gx in 0..self.level.width {
                let cell = self.level.get(gx, gy);
                let (text, fg, bg) = tile_glyph(cell);
                self.put_cell(gx, gy, text, fg, bg);
            }
        }

        let mut order: Vec<&Sprite> = self.sprites.iter().flatten().collect();
        order.sort_by_key(|s| s.plane);
        let draws: Vec<(usize, usize, [char; 2], Color)> = order
            .into_iter()
            .filter_map(|s| {
                let half = PIXELS_PER_CELL / 2;
                let cx = (s.x + half).div_euclid(PIXELS_PER_CELL);
                let cy = (s.y + half).div_euclid(PIXELS_PER_CELL);
                if cx < 0 || cy < 0 {
                    return None;
                }
                let (cx, cy) = (cx as usize, cy as usize);
                if cx >= self.level.width || cy >= self.level.height {
                    return None;
                }
                if s.plane <= BEHIND_WALLS_PLANE && self.level.get(cx, cy).tile == TILE_WALL {
                    return None;
                }
                Some((cx, cy, sprite_glyph(s), zx_colour(s.ink)))
            })
            .collect();
        for (cx, cy, text, fg) in draws {
            let bg = zx_paper(self.level.get(cx, cy).paper);
            self.put_cell(cx, cy, text, fg, bg);
        }

        let status_row = MAP_ROW + self.level.height + 1;
        for y in 0..self.status.height {
            for x in 0..self.status.width {
                if let Some(c) = self.status.get(x, y) {
                    let ch = if c.ch.is_ascii_graphic() { c.ch as char } else { ' ' };
                    self.front.set(x, status_row + y, Cell::from_char(ch, zx_colour(c.ink), zx_paper(c.paper)));
                }
            }
        }
    }

    fn put_cell(&mut self, gx: usize, gy: usize, text: [char; 2], fg: Color, bg: Color) {
        let col = gx * CELL_W;
        let row = MAP_ROW + gy;
        self.front.set(col, row, Cell::from_char(text[0], fg, bg));
        self.front.set(col + 1, row, Cell::from_char(text[1], fg, bg));
    }

    fn apply_invalidations(&mut self) {
        for rect in std::mem::take(&mut self.invalid) {
            for gy in rect.y as usize..rect.y as usize + rect.h as usize {
                for gx in rect.x as usize..rect.x as usize + rect.w as usize {
                    for dx in 0..CELL_W {
                        self.back.set(gx * CELL_W + dx, MAP_ROW + gy, Cell::INVALID);
                    }
                }
            }
        }
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors; ResetColor would fall back to the terminal default.
        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(Cell::BASE_BG))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.as_str()))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }
}

// ── Glyphs ──

fn zx_colour(c: Colour) -> Color {
    match c & 7 {
        colour::BLACK => Color::Rgb { r: 0, g: 0, b: 0 },
        colour::BLUE => Color::Rgb { r: 0, g: 0, b: 215 },
        colour::RED => Color::Rgb { r: 215, g: 0, b: 0 },
        colour::MAGENTA => Color::Rgb { r: 215, g: 0, b: 215 },
        colour::GREEN => Color::Rgb { r: 0, g: 215, b: 0 },
        colour::CYAN => Color::Rgb { r: 0, g: 215, b: 215 },
        colour::YELLOW => Color::Rgb { r: 215, g: 215, b: 0 },
        _ => Color::Rgb { r: 215, g: 215, b: 215 },
    }
}

/// Black paper blends into the terminal background.
fn zx_paper(c: Colour) -> Color {
    if c & 7 == colour::BLACK {
        Color::Reset
    } else {
        zx_colour(c)
    }
}

fn tile_glyph(cell: PrintCell) -> ([char; 2], Color, Color) {
    let bg = zx_paper(cell.paper);
    match cell.tile {
        TILE_BLANK => ([' ', ' '], Color::Reset, bg),
        TILE_WALL => (['█', '█'], Color::Rgb { r: 120, g: 120, b: 120 }, Color::Rgb { r: 70, g: 70, b: 70 }),
        TILE_EXIT => (['▐', '▌'], zx_colour(colour::GREEN), bg),
        TILE_KEY => (['o', '┐'], zx_colour(cell.ink), bg),
        b if b.is_ascii_graphic() => ([b as char, ' '], zx_colour(cell.ink), bg),
        _ => (['▪', ' '], zx_colour(cell.ink), bg),
    }
}

fn sprite_glyph(s: &Sprite) -> [char; 2] {
    match s.glyph {
        Glyph::Runner => {
            if s.frame == 0 {
                ['◄', '@']
            } else {
                ['@', '►']
            }
        }
        Glyph::Door => ['▓', '▓'],
        Glyph::Pill => match s.frame {
            0 => ['·', ' '],
            1 => ['o', ' '],
            _ => ['O', ' '],
        },
    }
}

// ── Services ──

impl SpriteService for Renderer {
    fn create_sprite(&mut self, glyph: Glyph, plane: Plane) -> SpriteHandle {
        let sprite = Sprite { glyph, plane, x: -PIXELS_PER_CELL * 8, y: -PIXELS_PER_CELL * 8, frame: 0, ink: colour::WHITE };
        let slot = match self.sprites.iter().position(|s| s.is_none()) {
            Some(i) => {
                self.sprites[i] = Some(sprite);
                i
            }
            None => {
                self.sprites.push(Some(sprite));
                self.sprites.len() - 1
            }
        };
        SpriteHandle(slot as u16)
    }

    fn move_sprite(&mut self, handle: SpriteHandle, pixel_x: i32, pixel_y: i32) {
        if let Some(Some(s)) = self.sprites.get_mut(handle.0 as usize) {
            s.x = pixel_x;
            s.y = pixel_y;
        }
    }

    fn set_sprite_frame(&mut self, handle: SpriteHandle, frame: u8) {
        if let Some(Some(s)) = self.sprites.get_mut(handle.0 as usize) {
            s.frame = frame;
        }
    }

    fn set_cell_colour(&mut self, handle: SpriteHandle, colour: Colour) {
        if let Some(Some(s)) = self.sprites.get_mut(handle.0 as usize) {
            s.ink = colour;
        }
    }

    fn destroy_sprite(&mut self, handle: SpriteHandle) {
        match self.sprites.get_mut(handle.0 as usize) {
            Some(slot) => *slot = None,
            None => log::warn!("destroy of unknown sprite {:?}", handle),
        }
    }

    fn invalidate_region(&mut self, rect: CellRect) {
        self.invalid.push(rect);
    }

    fn update_now(&mut self) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.resize_buffers(tw as usize, th as usize);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        self.compose();
        self.apply_invalidations();
        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }
}

impl TextService for Renderer {
    /// Decode a print string: AT y x / INK i / PAPER p / ATTR a control
    /// codes, everything else is a tile byte (level) or a character (status).
    /// A truncated control sequence ends the string.
    fn print_string(&mut self, encoded: &[u8], area: PrintArea) {
        let (mut x, mut y) = (0usize, 0usize);
        let (mut ink, mut paper) = (colour::WHITE, colour::BLACK);
        let mut bytes = encoded.iter().copied();

        while let Some(b) = bytes.next() {
            match b {
                PRINT_AT => match (bytes.next(), bytes.next()) {
                    (Some(ny), Some(nx)) => {
                        y = ny as usize;
                        x = nx as usize;
                    }
                    _ => break,
                },
                PRINT_INK => match bytes.next() {
                    Some(v) => ink = v & 7,
                    None => break,
                },
                PRINT_PAPER => match bytes.next() {
                    Some(v) => paper = v & 7,
                    None => break,
                },
                PRINT_ATTR => match bytes.next() {
                    Some(a) => {
                        ink = a & 7;
                        paper = (a >> 3) & 7;
                    }
                    None => break,
                },
                byte => {
                    match area {
                        PrintArea::Level => self.level.set(x, y, PrintCell { tile: byte, ink, paper }),
                        PrintArea::Status => self.status.set(x, y, Some(StatusCell { ch: byte, ink, paper })),
                    }
                    x += 1;
                }
            }
        }
    }
}
