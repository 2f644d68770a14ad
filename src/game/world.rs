use std::collections::BTreeMap;
use std::sync::Arc;

use glam::IVec2;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use super::display::{Cell, DisplayConfig, DisplayMode};
use super::geometry::{Direction, PortKind, Transfer};
use super::items::{ProductCatalog, ProductId};
use super::recipes::Recipe;
use crate::sim::storage::Storage;
use crate::sim::structure::{Structure, StructureKind};

new_key_type! {
    /// Stable handle into the game's structure arena. Map cells refer to
    /// structures through it, so removal never leaves a dangling reference.
    pub struct StructureId;
}

pub const INVENTORY_CAPACITY: u32 = 100;

/// Structures the player starts with.
pub const STARTER_STOCK: [(StructureKind, u32); 6] = [
    (StructureKind::Belt, 50),
    (StructureKind::Chest, 3),
    (StructureKind::Extractor, 3),
    (StructureKind::Splitter, 6),
    (StructureKind::Factory, 8),
    (StructureKind::Underground, 4),
];

/// A minable deposit. `kind` indexes the catalog's resource products.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResource {
    pub amount: u32,
    pub kind: Option<usize>,
}

impl RawResource {
    pub fn new(amount: u32, kind: Option<usize>) -> Self {
        Self { amount, kind }
    }

    pub fn is_depleted(&self) -> bool {
        self.amount == 0
    }
}

/// Contents of one map cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tile {
    Resource(RawResource),
    /// Cell `(row, col)` of a structure's footprint.
    Structure {
        id: StructureId,
        row: usize,
        col: usize,
    },
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("footprint leaves the map")]
    OutOfBounds,
    #[error("footprint overlaps another structure")]
    Overlap,
    #[error("{0:?} has no inventory product")]
    NotBuildable(StructureKind),
    #[error("no {0} left in the inventory")]
    OutOfStock(String),
}

/// The world: a fixed-size map, the structures on it, and the player's inventory.
#[derive(Debug)]
pub struct Game {
    pub(crate) map: Vec<Tile>,
    pub(crate) height: usize,
    pub(crate) width: usize,
    pub(crate) structures: SlotMap<StructureId, Structure>,
    /// Structures whose output nothing consumes. The tick walk starts here.
    pub(crate) roots: BTreeMap<StructureId, IVec2>,
    pub(crate) splitters: BTreeMap<StructureId, IVec2>,
    pub(crate) cursor: IVec2,
    pub(crate) inventory: Storage,
    pub(crate) catalog: Arc<ProductCatalog>,
    pub(crate) tick_count: u64,
}

impl Game {
    /// Empty map of bare ground with a stocked starter inventory.
    pub fn new(height: usize, width: usize, catalog: Arc<ProductCatalog>) -> Self {
        let mut inventory = Storage::new(INVENTORY_CAPACITY);
        for (kind, count) in STARTER_STOCK {
            if let Some(product) = catalog.structure_product(kind) {
                inventory.add(product, count);
            }
        }
        Self {
            map: vec![Tile::Resource(RawResource::default()); height * width],
            height,
            width,
            structures: SlotMap::with_key(),
            roots: BTreeMap::new(),
            splitters: BTreeMap::new(),
            cursor: IVec2::ZERO,
            inventory,
            catalog,
            tick_count: 0,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn catalog(&self) -> &Arc<ProductCatalog> {
        &self.catalog
    }

    pub fn inventory(&self) -> &Storage {
        &self.inventory
    }

    pub fn inventory_mut(&mut self) -> &mut Storage {
        &mut self.inventory
    }

    /// World ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Note the `(x, y)` order, matching the cursor.
    pub fn within_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    fn index(&self, y: i32, x: i32) -> Option<usize> {
        self.within_bounds(x, y)
            .then(|| y as usize * self.width + x as usize)
    }

    /// Cursor position as `(x, y)`.
    pub fn cursor(&self) -> IVec2 {
        self.cursor
    }

    /// Move the cursor by `(dx, dy)`. Moves that would leave the map are refused.
    pub fn move_cursor(&mut self, dx: i32, dy: i32) -> bool {
        let x = self.cursor.x.checked_add(dx);
        let y = self.cursor.y.checked_add(dy);
        let (Some(x), Some(y)) = (x, y) else {
            return false;
        };
        if !self.within_bounds(x, y) {
            return false;
        }
        self.cursor = IVec2::new(x, y);
        true
    }

    pub fn tile(&self, y: i32, x: i32) -> Option<&Tile> {
        self.index(y, x).map(|i| &self.map[i])
    }

    /// Overwrite the resource on a bare cell. Cells under structures are left alone.
    pub fn set_resource(&mut self, y: i32, x: i32, resource: RawResource) -> bool {
        let Some(i) = self.index(y, x) else {
            return false;
        };
        match &mut self.map[i] {
            Tile::Resource(r) => {
                *r = resource;
                true
            }
            Tile::Structure { .. } => false,
        }
    }

    /// Resource at a cell, including one captured under a structure.
    pub fn resource_at(&self, y: i32, x: i32) -> Option<RawResource> {
        match *self.tile(y, x)? {
            Tile::Resource(r) => Some(r),
            Tile::Structure { id, row, col } => {
                self.structures.get(id)?.tiles().get(row, col)?.underlying
            }
        }
    }

    pub fn structure(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(id)
    }

    pub fn structure_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(id)
    }

    pub fn structures(&self) -> impl Iterator<Item = (StructureId, &Structure)> {
        self.structures.iter()
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn roots(&self) -> impl Iterator<Item = (StructureId, IVec2)> + '_ {
        self.roots.iter().map(|(&id, &origin)| (id, origin))
    }

    pub fn is_root(&self, id: StructureId) -> bool {
        self.roots.contains_key(&id)
    }

    pub fn splitters(&self) -> impl Iterator<Item = (StructureId, IVec2)> + '_ {
        self.splitters.iter().map(|(&id, &origin)| (id, origin))
    }

    pub fn is_splitter(&self, id: StructureId) -> bool {
        self.splitters.contains_key(&id)
    }

    /// Structure covering `(y, x)` and its top-left corner as `(x, y)`.
    pub fn get_structure_at(&self, y: i32, x: i32) -> Option<(StructureId, IVec2)> {
        match *self.tile(y, x)? {
            Tile::Structure { id, row, col } => {
                Some((id, IVec2::new(x - col as i32, y - row as i32)))
            }
            Tile::Resource(_) => None,
        }
    }

    /// The structure connected to a port at `pos` flowing in `direction`.
    ///
    /// For an input port this looks one step upstream for a producer with an
    /// output at that cell flowing the same way; for an output port one step
    /// downstream for a consumer with a matching input. Touching is not enough.
    pub fn get_neighbour(
        &self,
        pos: IVec2,
        direction: Direction,
        side: PortKind,
    ) -> Option<(StructureId, IVec2)> {
        let adjacent = match side {
            PortKind::Input => pos - direction.offset(),
            PortKind::Output => pos + direction.offset(),
        };
        let (id, origin) = self.get_structure_at(adjacent.y, adjacent.x)?;
        let neighbour = self.structures.get(id)?;
        let ports = match side {
            PortKind::Input => neighbour.outputs(),
            PortKind::Output => neighbour.inputs(),
        };
        ports
            .iter()
            .any(|port| port.direction == direction && port.at(origin) == adjacent)
            .then_some((id, origin))
    }

    /// Whether any output of the structure at `origin` feeds a non-splitter.
    fn is_claimed(&self, id: StructureId, origin: IVec2) -> bool {
        let Some(structure) = self.structures.get(id) else {
            return false;
        };
        structure.outputs().iter().any(|port| {
            self.get_neighbour(port.at(origin), port.direction, PortKind::Output)
                .is_some_and(|(consumer, _)| !self.splitters.contains_key(&consumer))
        })
    }

    /// Producers feeding the inputs of the structure at `origin`.
    fn input_neighbours(
        &self,
        inputs: &[Transfer],
        origin: IVec2,
    ) -> SmallVec<[(StructureId, IVec2); 4]> {
        inputs
            .iter()
            .filter_map(|port| self.get_neighbour(port.at(origin), port.direction, PortKind::Input))
            .collect()
    }

    /// Check a placement without performing it.
    pub fn can_place(&self, y: i32, x: i32, structure: &Structure) -> Result<(), PlacementError> {
        if y < 0 || x < 0 {
            return Err(PlacementError::OutOfBounds);
        }
        // Far-off coordinates must not overflow.
        let bottom = (y as usize).saturating_add(structure.height());
        let right = (x as usize).saturating_add(structure.width());
        if bottom > self.height || right > self.width {
            return Err(PlacementError::OutOfBounds);
        }
        for (row, col, _) in structure.tiles().iter() {
            if let Some(Tile::Structure { .. }) = self.tile(y + row as i32, x + col as i32) {
                return Err(PlacementError::Overlap);
            }
        }
        Ok(())
    }

    /// Put `structure` with its top-left corner at `(y, x)`, capturing the
    /// resources it covers and updating the root and splitter sets.
    pub fn place_structure(
        &mut self,
        y: i32,
        x: i32,
        mut structure: Structure,
    ) -> Result<StructureId, PlacementError> {
        self.can_place(y, x, &structure)?;
        let origin = IVec2::new(x, y);

        let mut cells: SmallVec<[(usize, usize, usize); 16]> = SmallVec::new();
        for (row, col, tile) in structure.tiles.iter_mut() {
            let Some(i) = self.index(y + row as i32, x + col as i32) else {
                return Err(PlacementError::OutOfBounds);
            };
            if let Tile::Resource(resource) = self.map[i] {
                tile.underlying = Some(resource);
            }
            cells.push((i, row, col));
        }

        let kind = structure.kind();
        let inputs: SmallVec<[Transfer; 4]> = SmallVec::from_slice(structure.inputs());
        let id = self.structures.insert(structure);
        for (i, row, col) in cells {
            self.map[i] = Tile::Structure { id, row, col };
        }

        if kind == StructureKind::Splitter {
            self.splitters.insert(id, origin);
            log::debug!("Placed splitter {id:?} at ({x}, {y})");
            return Ok(id);
        }

        for (producer, _) in self.input_neighbours(&inputs, origin) {
            if self.roots.remove(&producer).is_some() {
                log::debug!("{producer:?} now feeds {id:?} and is no longer a root");
            }
        }
        if !self.is_claimed(id, origin) {
            self.roots.insert(id, origin);
        }
        log::debug!(
            "Placed {} {id:?} at ({x}, {y}), root: {}",
            kind.display_name(),
            self.roots.contains_key(&id)
        );
        Ok(id)
    }

    /// Take the structure covering `(y, x)` off the map, restoring the
    /// resources under it.
    pub fn remove_structure(&mut self, y: i32, x: i32) -> Option<Structure> {
        let (id, origin) = self.get_structure_at(y, x)?;
        let mut structure = self.structures.remove(id)?;

        for (row, col, tile) in structure.tiles.iter_mut() {
            let resource = tile.underlying.take().unwrap_or_default();
            if let Some(i) = self.index(origin.y + row as i32, origin.x + col as i32) {
                self.map[i] = Tile::Resource(resource);
            }
        }

        self.splitters.remove(&id);
        self.roots.remove(&id);
        for (producer, producer_origin) in self.input_neighbours(structure.inputs(), origin) {
            if self.splitters.contains_key(&producer) {
                continue;
            }
            if !self.is_claimed(producer, producer_origin) {
                self.roots.insert(producer, producer_origin);
                log::debug!("{producer:?} lost its consumer and is a root again");
            }
        }
        log::debug!(
            "Removed {} {id:?} from ({}, {})",
            structure.kind().display_name(),
            origin.x,
            origin.y
        );
        Some(structure)
    }

    /// Place a copy of `ghost`, paying one unit of its product from the inventory.
    pub fn build(
        &mut self,
        y: i32,
        x: i32,
        ghost: &Structure,
    ) -> Result<StructureId, PlacementError> {
        let kind = ghost.kind();
        let product = self
            .catalog
            .structure_product(kind)
            .ok_or(PlacementError::NotBuildable(kind))?;
        if self.inventory.count(product) == 0 {
            return Err(PlacementError::OutOfStock(self.catalog.name(product).to_string()));
        }
        let id = self.place_structure(y, x, ghost.copy_structure())?;
        self.inventory.remove(product, 1);
        Ok(id)
    }

    /// Remove the structure at `(y, x)` and return it, plus any chest
    /// contents, to the inventory. Whatever does not fit is lost.
    pub fn deconstruct(&mut self, y: i32, x: i32) -> Option<StructureKind> {
        let mut structure = self.remove_structure(y, x)?;
        let kind = structure.kind();
        let mut refund: Vec<(ProductId, u32)> = Vec::new();
        if let Some(product) = self.catalog.structure_product(kind) {
            refund.push((product, 1));
        }
        if let Some(chest) = structure.as_chest_mut() {
            let mut contents: Vec<(ProductId, u32)> =
                chest.storage_mut().drain().into_iter().collect();
            contents.sort_by_key(|(id, _)| self.catalog.position(*id).unwrap_or(usize::MAX));
            refund.extend(contents);
        }
        for (product, count) in refund {
            let added = self.inventory.add(product, count);
            if added < count {
                log::warn!(
                    "Inventory full: dropped {} {}",
                    count - added,
                    self.catalog.name(product)
                );
            }
        }
        Some(kind)
    }

    /// Assign or clear the recipe of the factory covering `(y, x)`.
    pub fn set_recipe(&mut self, y: i32, x: i32, recipe: Option<Recipe>) -> bool {
        let Some((id, _)) = self.get_structure_at(y, x) else {
            return false;
        };
        match self.structures.get_mut(id).and_then(Structure::as_factory_mut) {
            Some(factory) => {
                factory.set_recipe(recipe);
                true
            }
            None => false,
        }
    }

    pub fn display_cell(
        &self,
        y: i32,
        x: i32,
        mode: DisplayMode,
        config: &DisplayConfig,
    ) -> Option<Cell> {
        match *self.tile(y, x)? {
            Tile::Resource(r) => Some(config.resource_cell(r.amount, mode)),
            Tile::Structure { id, row, col } => {
                self.structures.get(id)?.display_cell(row, col, mode, config)
            }
        }
    }
}
