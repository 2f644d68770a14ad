use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::belt::{Belt, BeltShape};
use super::chest::Chest;
use super::extractor::Extractor;
use super::factory::Factory;
use super::splitter::TransitQueue;
use crate::game::display::{Cell, DisplayConfig, DisplayMode, GlyphKind};
use crate::game::geometry::{Direction, Rotate, TileGrid, Transfer};
use crate::game::items::{ProductCatalog, ProductId};
use crate::game::world::RawResource;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StructureKind {
    Belt,
    Extractor,
    Chest,
    Splitter,
    Factory,
    Underground,
}

impl StructureKind {
    pub const ALL: [StructureKind; 6] = [
        StructureKind::Belt,
        StructureKind::Extractor,
        StructureKind::Chest,
        StructureKind::Splitter,
        StructureKind::Factory,
        StructureKind::Underground,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Belt => "Belt",
            Self::Extractor => "Extractor",
            Self::Chest => "Chest",
            Self::Splitter => "Splitter",
            Self::Factory => "Factory",
            Self::Underground => "Underground",
        }
    }

    /// A fresh structure of this kind in its default (downward) orientation.
    pub fn prototype(self) -> Structure {
        match self {
            Self::Belt => Structure::belt(Direction::Down, BeltShape::Straight),
            Self::Extractor => Structure::extractor(),
            Self::Chest => Structure::chest(),
            Self::Splitter => Structure::splitter(),
            Self::Factory => Structure::factory(),
            Self::Underground => Structure::underground(),
        }
    }
}

/// Artwork of a single structure cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileArt {
    Belt(BeltShape),
    Corner,
    Edge,
    Center,
    Input,
    Output,
    Chest,
    SplitterLeft,
    SplitterRight,
}

/// One occupied cell of a structure footprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureTile {
    pub art: TileArt,
    /// Quarter turns from the art's base orientation. For ports and belts
    /// this is the flow direction's index.
    pub rotation: u8,
    /// Resource the cell covered when the structure was placed.
    pub underlying: Option<RawResource>,
}

impl StructureTile {
    pub fn new(art: TileArt, rotation: u8) -> Self {
        Self {
            art,
            rotation: rotation % 4,
            underlying: None,
        }
    }

    pub fn facing(art: TileArt, direction: Direction) -> Self {
        Self::new(art, direction.index() as u8)
    }

    pub fn direction(&self) -> Direction {
        Direction::from_index(self.rotation as usize)
    }

    /// Glyph table and index that draw this tile.
    pub fn glyph(&self) -> (GlyphKind, usize) {
        let r = self.rotation as usize;
        match self.art {
            TileArt::Belt(shape) => (GlyphKind::Belt, r * 3 + shape.index()),
            TileArt::Corner => (GlyphKind::FillerCorner, r),
            TileArt::Edge => (GlyphKind::FillerMid, r),
            TileArt::Center => (GlyphKind::FillerCenter, 0),
            TileArt::Input => (GlyphKind::Input, r),
            TileArt::Output => (GlyphKind::Output, r),
            TileArt::Chest => (GlyphKind::Chest, 0),
            TileArt::SplitterLeft => (GlyphKind::SplitterLeft, r),
            TileArt::SplitterRight => (GlyphKind::SplitterRight, r),
        }
    }
}

impl Rotate for StructureTile {
    fn rotate_cw(&mut self) {
        self.rotation = (self.rotation + 1) % 4;
    }

    fn rotate_ccw(&mut self) {
        self.rotation = (self.rotation + 3) % 4;
    }
}

/// Answer to "could you hand over a product right now?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    Empty,
    /// Holding a product that has not finished its delay.
    Pending(ProductId),
    Ready(ProductId),
}

impl Offer {
    pub fn product(self) -> Option<ProductId> {
        match self {
            Self::Empty => None,
            Self::Pending(p) | Self::Ready(p) => Some(p),
        }
    }

    pub fn ready(self) -> Option<ProductId> {
        match self {
            Self::Ready(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Per-variant simulation state.
#[derive(Clone, Debug)]
pub enum Machine {
    Belt(Belt),
    Extractor(Extractor),
    Chest(Chest),
    Splitter(TransitQueue),
    Factory(Factory),
    Underground(TransitQueue),
}

impl Machine {
    pub fn kind(&self) -> StructureKind {
        match self {
            Self::Belt(_) => StructureKind::Belt,
            Self::Extractor(_) => StructureKind::Extractor,
            Self::Chest(_) => StructureKind::Chest,
            Self::Splitter(_) => StructureKind::Splitter,
            Self::Factory(_) => StructureKind::Factory,
            Self::Underground(_) => StructureKind::Underground,
        }
    }

    /// Same configuration with all transient state cleared.
    fn fresh(&self) -> Self {
        match self {
            Self::Belt(_) => Self::Belt(Belt::new()),
            Self::Extractor(_) => Self::Extractor(Extractor::new()),
            Self::Chest(_) => Self::Chest(Chest::new()),
            Self::Splitter(q) => Self::Splitter(q.fresh()),
            Self::Factory(f) => Self::Factory(f.fresh()),
            Self::Underground(q) => Self::Underground(q.fresh()),
        }
    }
}

/// A placeable machine: footprint, ports and simulation state.
#[derive(Clone, Debug)]
pub struct Structure {
    pub(crate) tiles: TileGrid<StructureTile>,
    pub(crate) inputs: SmallVec<[Transfer; 4]>,
    pub(crate) outputs: SmallVec<[Transfer; 2]>,
    pub(crate) machine: Machine,
}

impl Structure {
    pub fn new(
        tiles: TileGrid<StructureTile>,
        inputs: &[Transfer],
        outputs: &[Transfer],
        machine: Machine,
    ) -> Self {
        Self {
            tiles,
            inputs: SmallVec::from_slice(inputs),
            outputs: SmallVec::from_slice(outputs),
            machine,
        }
    }

    pub fn kind(&self) -> StructureKind {
        self.machine.kind()
    }

    pub fn tiles(&self) -> &TileGrid<StructureTile> {
        &self.tiles
    }

    pub fn height(&self) -> usize {
        self.tiles.height()
    }

    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    pub fn inputs(&self) -> &[Transfer] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Transfer] {
        &self.outputs
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn is_splitter(&self) -> bool {
        matches!(self.machine, Machine::Splitter(_))
    }

    /// Quarter turn clockwise. Chests are symmetric and ignore it.
    pub fn rotate_right(&mut self) {
        if self.kind() == StructureKind::Chest {
            return;
        }
        let height = self.tiles.height();
        self.tiles.rotate_cw();
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            *port = port.rotated_cw(height);
        }
    }

    pub fn rotate_left(&mut self) {
        if self.kind() == StructureKind::Chest {
            return;
        }
        let width = self.tiles.width();
        self.tiles.rotate_ccw();
        for port in self.inputs.iter_mut().chain(self.outputs.iter_mut()) {
            *port = port.rotated_ccw(width);
        }
    }

    /// Copy with the same shape, orientation and configuration, but no held
    /// products and no captured resources.
    pub fn copy_structure(&self) -> Self {
        Self {
            tiles: self.tiles.map(|t| StructureTile {
                underlying: None,
                ..t.clone()
            }),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            machine: self.machine.fresh(),
        }
    }

    pub fn tick(&mut self, catalog: &ProductCatalog) {
        match &mut self.machine {
            Machine::Belt(belt) => belt.tick(),
            Machine::Extractor(extractor) => extractor.tick(&mut self.tiles, catalog),
            Machine::Chest(_) => {}
            Machine::Splitter(queue) | Machine::Underground(queue) => queue.tick(),
            Machine::Factory(factory) => factory.tick(),
        }
    }

    pub fn can_retrieve_product(&self) -> Offer {
        match &self.machine {
            Machine::Belt(belt) => belt.offer(),
            Machine::Extractor(extractor) => extractor.offer(),
            Machine::Chest(_) => Offer::Empty,
            Machine::Splitter(queue) | Machine::Underground(queue) => queue.offer(),
            Machine::Factory(factory) => factory.offer(),
        }
    }

    /// Take the held product if it is ready. No effect otherwise.
    pub fn retrieve_product(&mut self) -> Option<ProductId> {
        match &mut self.machine {
            Machine::Belt(belt) => belt.retrieve(),
            Machine::Extractor(extractor) => extractor.retrieve(),
            Machine::Chest(_) => None,
            Machine::Splitter(queue) | Machine::Underground(queue) => queue.retrieve(),
            Machine::Factory(factory) => factory.retrieve(),
        }
    }

    pub fn can_accept_product(&self, product: ProductId) -> bool {
        match &self.machine {
            Machine::Belt(belt) => belt.can_accept(),
            Machine::Extractor(_) => false,
            Machine::Chest(chest) => chest.can_accept(),
            Machine::Splitter(queue) | Machine::Underground(queue) => queue.can_accept(),
            Machine::Factory(factory) => factory.can_accept(product),
        }
    }

    /// Hand `product` over. Returns false, taking nothing, when it cannot be accepted.
    pub fn accept_product(&mut self, product: ProductId) -> bool {
        match &mut self.machine {
            Machine::Belt(belt) => belt.accept(product),
            Machine::Extractor(_) => false,
            Machine::Chest(chest) => chest.accept(product),
            Machine::Splitter(queue) | Machine::Underground(queue) => queue.accept(product),
            Machine::Factory(factory) => factory.accept(product),
        }
    }

    pub fn display_cell(
        &self,
        row: usize,
        col: usize,
        mode: DisplayMode,
        config: &DisplayConfig,
    ) -> Option<Cell> {
        let (kind, index) = self.tiles.get(row, col)?.glyph();
        Some(config.structure_cell(kind, index, mode))
    }

    pub fn as_factory(&self) -> Option<&Factory> {
        match &self.machine {
            Machine::Factory(factory) => Some(factory),
            _ => None,
        }
    }

    pub fn as_factory_mut(&mut self) -> Option<&mut Factory> {
        match &mut self.machine {
            Machine::Factory(factory) => Some(factory),
            _ => None,
        }
    }

    pub fn as_chest(&self) -> Option<&Chest> {
        match &self.machine {
            Machine::Chest(chest) => Some(chest),
            _ => None,
        }
    }

    pub fn as_chest_mut(&mut self) -> Option<&mut Chest> {
        match &mut self.machine {
            Machine::Chest(chest) => Some(chest),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(s: &Structure) -> (TileGrid<StructureTile>, Vec<Transfer>, Vec<Transfer>) {
        (s.tiles().clone(), s.inputs().to_vec(), s.outputs().to_vec())
    }

    #[test]
    fn test_four_right_turns_restore_every_kind() {
        for kind in StructureKind::ALL {
            let mut s = kind.prototype();
            let original = snapshot(&s);
            for _ in 0..4 {
                s.rotate_right();
            }
            assert_eq!(snapshot(&s), original, "{kind:?}");
        }
    }

    #[test]
    fn test_four_left_turns_restore_every_kind() {
        for kind in StructureKind::ALL {
            let mut s = kind.prototype();
            let original = snapshot(&s);
            for _ in 0..4 {
                s.rotate_left();
            }
            assert_eq!(snapshot(&s), original, "{kind:?}");
        }
    }

    #[test]
    fn test_right_then_left_is_identity() {
        for kind in StructureKind::ALL {
            let mut s = kind.prototype();
            let original = snapshot(&s);
            s.rotate_right();
            s.rotate_left();
            assert_eq!(snapshot(&s), original, "{kind:?}");
        }
    }

    #[test]
    fn test_ports_stay_on_occupied_cells() {
        for kind in StructureKind::ALL {
            let mut s = kind.prototype();
            for _ in 0..4 {
                for port in s.inputs().iter().chain(s.outputs()) {
                    let cell = s.tiles().get(port.offset.y as usize, port.offset.x as usize);
                    assert!(cell.is_some(), "{kind:?} port {port:?} off footprint");
                }
                s.rotate_right();
            }
        }
    }

    #[test]
    fn test_output_glyph_tracks_port_direction() {
        let mut s = Structure::extractor();
        for _ in 0..4 {
            let port = s.outputs()[0];
            let tile = s.tiles().get(port.offset.y as usize, port.offset.x as usize).unwrap();
            assert_eq!(tile.art, TileArt::Output);
            assert_eq!(tile.direction(), port.direction);
            s.rotate_right();
        }
    }

    #[test]
    fn test_chest_ignores_rotation() {
        let mut s = Structure::chest();
        let original = snapshot(&s);
        s.rotate_right();
        assert_eq!(snapshot(&s), original);
    }

    #[test]
    fn test_underground_rotation_swaps_dimensions() {
        let mut s = Structure::underground();
        assert_eq!((s.height(), s.width()), (4, 1));
        s.rotate_right();
        assert_eq!((s.height(), s.width()), (1, 4));
        assert_eq!(s.inputs()[0], Transfer::new(3, 0, Direction::Left));
        assert_eq!(s.outputs()[0], Transfer::new(0, 0, Direction::Left));
    }

    #[test]
    fn test_copy_structure_resets_state_and_resources() {
        let catalog = ProductCatalog::standard();
        let plate = catalog.by_name("plate").unwrap();
        let mut belt = Structure::belt(Direction::Right, BeltShape::TurnCw);
        assert!(belt.accept_product(plate));
        belt.tiles.get_mut(0, 0).unwrap().underlying = Some(RawResource::new(5, Some(0)));

        let copy = belt.copy_structure();
        assert_eq!(copy.can_retrieve_product(), Offer::Empty);
        assert!(copy.can_accept_product(plate));
        assert_eq!(copy.tiles().get(0, 0).unwrap().underlying, None);
        assert_eq!(copy.inputs(), belt.inputs());
        assert_eq!(copy.outputs(), belt.outputs());
        // The source keeps its state.
        assert_eq!(belt.can_retrieve_product(), Offer::Pending(plate));
    }

    #[test]
    fn test_display_cell_uses_rotation() {
        let config = DisplayConfig::new();
        let mut belt = Structure::belt(Direction::Down, BeltShape::Straight);
        assert_eq!(belt.display_cell(0, 0, DisplayMode::Map, &config).unwrap().glyph, '↓');
        belt.rotate_right();
        assert_eq!(belt.display_cell(0, 0, DisplayMode::Map, &config).unwrap().glyph, '←');
        assert!(belt.display_cell(1, 0, DisplayMode::Map, &config).is_none());
    }

    #[test]
    fn test_hidden_underground_cells_draw_nothing() {
        let config = DisplayConfig::new();
        let s = Structure::underground();
        assert!(s.display_cell(0, 0, DisplayMode::Map, &config).is_some());
        assert!(s.display_cell(1, 0, DisplayMode::Map, &config).is_none());
        assert!(s.display_cell(2, 0, DisplayMode::Map, &config).is_none());
        assert!(s.display_cell(3, 0, DisplayMode::Map, &config).is_some());
    }
}
