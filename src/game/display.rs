use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::DisplaySection;

/// How a cell is being drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisplayMode {
    Map,
    /// Under the cursor.
    MapSelected,
    /// Placement preview that fits.
    GhostValid,
    /// Placement preview that would be rejected.
    GhostInvalid,
}

impl DisplayMode {
    pub fn index(self) -> usize {
        match self {
            Self::Map => 0,
            Self::MapSelected => 1,
            Self::GhostValid => 2,
            Self::GhostInvalid => 3,
        }
    }
}

/// Glyph tables a symbol set provides. Each table is indexed by a rotation
/// or variant number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlyphKind {
    /// Four density tiers, empty first.
    Resource,
    /// `entry * 3 + bend`.
    Belt,
    /// top-left, top-right, bottom-right, bottom-left
    FillerCorner,
    /// top, right, bottom, left
    FillerMid,
    FillerCenter,
    Input,
    Output,
    Chest,
    SplitterLeft,
    SplitterRight,
}

/// A named set of glyph tables.
#[derive(Clone, Debug)]
pub struct SymbolConfig {
    pub name: String,
    glyphs: HashMap<GlyphKind, Vec<char>>,
}

impl SymbolConfig {
    pub fn new(name: &str, tables: &[(GlyphKind, &str)]) -> Self {
        Self {
            name: name.to_string(),
            glyphs: tables
                .iter()
                .map(|(kind, chars)| (*kind, chars.chars().collect()))
                .collect(),
        }
    }

    pub fn unicode() -> Self {
        Self::new(
            "unicode",
            &[
                (GlyphKind::Resource, " ░▒▓"),
                (GlyphKind::Belt, "↓↲↳←↖↙↑↱↰→↘↗"),
                (GlyphKind::FillerCorner, "▛▜▟▙"),
                (GlyphKind::FillerMid, "▀▐▄▌"),
                (GlyphKind::FillerCenter, "█"),
                (GlyphKind::Input, "↥↦↧↤"),
                (GlyphKind::Output, "⇓⇐⇑⇒"),
                (GlyphKind::Chest, "▣"),
                (GlyphKind::SplitterLeft, "╘╓╕╜"),
                (GlyphKind::SplitterRight, "╛╙╒╖"),
            ],
        )
    }

    pub fn ascii() -> Self {
        Self::new(
            "ascii",
            &[
                (GlyphKind::Resource, " .:#"),
                (GlyphKind::Belt, "v<><^v^><>v^"),
                (GlyphKind::FillerCorner, "/\\/\\"),
                (GlyphKind::FillerMid, "-|-|"),
                (GlyphKind::FillerCenter, "#"),
                (GlyphKind::Input, "^<v>"),
                (GlyphKind::Output, "v<^>"),
                (GlyphKind::Chest, "="),
                (GlyphKind::SplitterLeft, "[[[["),
                (GlyphKind::SplitterRight, "]]]]"),
            ],
        )
    }

    /// Glyph `index` of `kind`, wrapping around the table. `?` for a missing table.
    pub fn glyph(&self, kind: GlyphKind, index: usize) -> char {
        match self.glyphs.get(&kind) {
            Some(table) if !table.is_empty() => table[index % table.len()],
            _ => '?',
        }
    }
}

/// ANSI foreground color and attribute per display mode.
#[derive(Clone, Debug)]
pub struct ColorConfig {
    pub name: String,
    pub structure: [(u8, u8); 4],
    pub resource: (u8, u8),
    pub resource_selected: (u8, u8),
}

impl ColorConfig {
    pub fn eight_color() -> Self {
        Self {
            name: "8 color".to_string(),
            structure: [(36, 1), (37, 1), (36, 1), (31, 1)],
            resource: (33, 0),
            resource_selected: (37, 7),
        }
    }

    pub fn structure_color(&self, mode: DisplayMode) -> (u8, u8) {
        self.structure[mode.index()]
    }

    pub fn resource_color(&self, mode: DisplayMode) -> (u8, u8) {
        match mode {
            DisplayMode::MapSelected => self.resource_selected,
            _ => self.resource,
        }
    }
}

/// One rendered terminal cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub glyph: char,
    pub fg: u8,
    pub attr: u8,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\x1b[{};{}m{}\x1b[0m", self.fg, self.attr, self.glyph)
    }
}

/// The symbol and color sets available to a renderer, plus which of each is active.
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    symbols: Vec<SymbolConfig>,
    colors: Vec<ColorConfig>,
    selected_symbols: usize,
    selected_colors: usize,
}

impl DisplayConfig {
    pub fn new() -> Self {
        Self {
            symbols: vec![SymbolConfig::unicode(), SymbolConfig::ascii()],
            colors: vec![ColorConfig::eight_color()],
            selected_symbols: 0,
            selected_colors: 0,
        }
    }

    pub fn from_section(section: &DisplaySection) -> Self {
        let mut config = Self::new();
        if !config.select_symbols_by_name(&section.symbols) {
            log::warn!(
                "Unknown symbol set '{}'. Using '{}'.",
                section.symbols,
                config.symbols().name
            );
        }
        if !config.select_colors_by_name(&section.colors) {
            log::warn!("Unknown color set '{}'. Using '{}'.", section.colors, config.colors().name);
        }
        config
    }

    pub fn symbols(&self) -> &SymbolConfig {
        &self.symbols[self.selected_symbols]
    }

    pub fn colors(&self) -> &ColorConfig {
        &self.colors[self.selected_colors]
    }

    /// Out-of-range indices clamp to the first set.
    pub fn select_symbols(&mut self, index: usize) {
        self.selected_symbols = if index < self.symbols.len() { index } else { 0 };
    }

    pub fn select_colors(&mut self, index: usize) {
        self.selected_colors = if index < self.colors.len() { index } else { 0 };
    }

    /// Returns false (and selects the first set) when no set has this name.
    pub fn select_symbols_by_name(&mut self, name: &str) -> bool {
        let found = self.symbols.iter().position(|s| s.name == name);
        self.select_symbols(found.unwrap_or(0));
        found.is_some()
    }

    pub fn select_colors_by_name(&mut self, name: &str) -> bool {
        let found = self.colors.iter().position(|c| c.name == name);
        self.select_colors(found.unwrap_or(0));
        found.is_some()
    }

    pub fn structure_cell(&self, kind: GlyphKind, index: usize, mode: DisplayMode) -> Cell {
        let (fg, attr) = self.colors().structure_color(mode);
        Cell {
            glyph: self.symbols().glyph(kind, index),
            fg,
            attr,
        }
    }

    pub fn resource_cell(&self, amount: u32, mode: DisplayMode) -> Cell {
        let (fg, attr) = self.colors().resource_color(mode);
        Cell {
            glyph: self.symbols().glyph(GlyphKind::Resource, density_tier(amount)),
            fg,
            attr,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// 0 when depleted, then one tier per hundred units up to 3.
pub fn density_tier(amount: u32) -> usize {
    match amount {
        0 => 0,
        1..=99 => 1,
        100..=199 => 2,
        _ => 3,
    }
}
