//! ASCII rendering of the world
//!
//! [`AsciiBuffer`] is the plain-text [`BufferAdapter`]; the free functions
//! render the whole region for the CLI and colour cells with ANSI escapes.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};

use crate::classifier::TerrainTag;
use crate::fog::Visibility;
use crate::trees::TreeKind;
use crate::world::{
    BufferAdapter, Core, Glyph, Viewport, CANOPY_SYMBOL, DEER_SYMBOL, PLAYER_SYMBOL, TRUNK_SYMBOL,
};

/// Character grid filled by [`Core::render_view`].
#[derive(Clone, Debug, Default)]
pub struct AsciiBuffer {
    width: usize,
    cells: Vec<Glyph>,
}

impl AsciiBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.cells.len() / self.width
        }
    }

    pub fn glyph(&self, column: usize, row: usize) -> Option<&Glyph> {
        if column >= self.width {
            return None;
        }
        self.cells.get(row * self.width + column)
    }

    pub fn symbol(&self, column: usize, row: usize) -> Option<char> {
        self.glyph(column, row).map(|g| g.symbol)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Glyph]> {
        self.cells.chunks(self.width.max(1))
    }

    /// ANSI true-colour rendition; explored cells are dimmed.
    pub fn to_colored_string(&self) -> String {
        let mut out = String::new();
        for row in self.rows() {
            for glyph in row {
                let fg = class_color(glyph.class);
                let fg = if glyph.visibility == Visibility::Explored { dim(fg) } else { fg };
                out.push_str(&ansi_fg_char(glyph.symbol, fg));
            }
            out.push('\n');
        }
        out
    }
}

impl BufferAdapter for AsciiBuffer {
    fn begin(&mut self, viewport: Viewport) {
        self.width = viewport.width;
        let blank = Glyph {
            symbol: ' ',
            class: "fog",
            visibility: Visibility::Hidden,
        };
        self.cells = vec![blank; viewport.width * viewport.height];
    }

    fn put(&mut self, column: usize, row: usize, glyph: Glyph) {
        if column < self.width {
            if let Some(cell) = self.cells.get_mut(row * self.width + column) {
                *cell = glyph;
            }
        }
    }
}

impl fmt::Display for AsciiBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: String = row.iter().map(|g| g.symbol).collect();
            writeln!(f, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/// The whole region without fog: terrain, river glyphs, trees, deer and the
/// player.
pub fn render_region(core: &Core) -> String {
    let bounds = core.bounds();
    let player = core.player();
    let mut out = String::with_capacity((bounds.width() + 1) * bounds.height());
    for y in bounds.min_y..=bounds.max_y {
        for x in bounds.min_x..=bounds.max_x {
            if player.x == x && player.y == y {
                out.push(PLAYER_SYMBOL);
            } else {
                out.push(core.terrain_at(x, y).symbol);
            }
        }
        out.push('\n');
    }
    out
}

/// Colour class of a cell as drawn by [`render_region`].
fn region_class(core: &Core, x: i32, y: i32) -> &'static str {
    let cell = core.terrain_at(x, y);
    if cell.deer.is_some() && cell.symbol == DEER_SYMBOL {
        return "deer";
    }
    match cell.feature.map(|f| f.kind) {
        Some(TreeKind::Trunk) => "trunk",
        Some(TreeKind::Canopy) => "canopy",
        None => cell.tag.class_name(),
    }
}

pub fn print_colored_region(core: &Core) {
    let bounds = core.bounds();
    let player = core.player();
    let mut out = String::new();
    for y in bounds.min_y..=bounds.max_y {
        for x in bounds.min_x..=bounds.max_x {
            if player.x == x && player.y == y {
                out.push_str(&ansi_fg_char(PLAYER_SYMBOL, class_color("player")));
            } else {
                let symbol = core.terrain_at(x, y).symbol;
                out.push_str(&ansi_fg_char(symbol, class_color(region_class(core, x, y))));
            }
        }
        out.push('\n');
    }
    print!("{}", out);
}

/// Write the region, legend and statistics to a text file.
pub fn export_region_file(core: &Core, path: &str) -> io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "=== WILDLAND REGION ===")?;
    writeln!(file, "{}", core.stats())?;
    writeln!(file)?;
    writeln!(file, "=== MAP ===")?;
    write!(file, "{}", render_region(core))?;
    writeln!(file)?;
    write!(file, "{}", legend())?;
    Ok(())
}

pub fn legend() -> String {
    let mut s = String::from("Legend:\n");
    let tags = [
        TerrainTag::Plains,
        TerrainTag::Foothills,
        TerrainTag::Stone,
        TerrainTag::Rocks,
        TerrainTag::Boulders,
        TerrainTag::Lake,
    ];
    for tag in tags {
        s.push_str(&format!("  {}  {}\n", tag.symbol(), tag.class_name()));
    }
    s.push_str("  ║═╔╗╚╝  river (flow)\n");
    s.push_str("  ●  spring   ▼  mouth   ╬  confluence\n");
    s.push_str(&format!("  {}  trunk   {}  canopy\n", TRUNK_SYMBOL, CANOPY_SYMBOL));
    s.push_str(&format!("  {}  deer    {}  you\n", DEER_SYMBOL, PLAYER_SYMBOL));
    s
}

/// Foreground colour for a render class.
pub fn class_color(class: &str) -> (u8, u8, u8) {
    match class {
        "plains" => (140, 190, 90),
        "foothills" => (170, 150, 100),
        "stone" => (150, 150, 140),
        "rocks" => (125, 120, 115),
        "boulders" => (200, 200, 205),
        "river" => (70, 140, 230),
        "lake" => (40, 90, 200),
        "trunk" => (120, 80, 40),
        "canopy" => (40, 130, 50),
        "deer" => (210, 150, 80),
        "player" => (255, 255, 80),
        _ => (60, 60, 60),
    }
}

fn dim((r, g, b): (u8, u8, u8)) -> (u8, u8, u8) {
    ((r as f32 * 0.45) as u8, (g as f32 * 0.45) as u8, (b as f32 * 0.45) as u8)
}

/// Format a single character with ANSI true colour (24-bit) foreground
pub fn ansi_fg_char(ch: char, fg: (u8, u8, u8)) -> String {
    format!("\x1b[38;2;{};{};{}m{}\x1b[0m", fg.0, fg.1, fg.2, ch)
}
