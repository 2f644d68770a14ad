use super::structure::{Machine, Offer, Structure, StructureTile, TileArt};
use crate::game::geometry::{Direction, TileGrid, Transfer};
use crate::game::items::ProductId;

/// Ticks a product spends on one belt cell.
pub const BELT_DELAY: u32 = 20;

/// Where a belt sends products relative to where they came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BeltShape {
    #[default]
    Straight,
    /// Exit is one quarter turn clockwise of the entry.
    TurnCw,
    TurnCcw,
}

impl BeltShape {
    pub fn index(self) -> usize {
        match self {
            Self::Straight => 0,
            Self::TurnCw => 1,
            Self::TurnCcw => 2,
        }
    }

    pub fn exit(self, entry: Direction) -> Direction {
        match self {
            Self::Straight => entry,
            Self::TurnCw => entry.rotate_cw(),
            Self::TurnCcw => entry.rotate_ccw(),
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Straight => Self::TurnCw,
            Self::TurnCw => Self::TurnCcw,
            Self::TurnCcw => Self::Straight,
        }
    }
}

/// Single-slot conveyor state.
#[derive(Clone, Debug, Default)]
pub struct Belt {
    product: Option<ProductId>,
    counter: u32,
}

impl Belt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(&self) -> Option<ProductId> {
        self.product
    }

    fn is_ready(&self) -> bool {
        self.product.is_some() && self.counter >= BELT_DELAY - 1
    }

    /// Ages the held product. The counter only resets on retrieval.
    pub fn tick(&mut self) {
        if self.product.is_some() && !self.is_ready() {
            self.counter += 1;
        }
    }

    pub fn offer(&self) -> Offer {
        match self.product {
            None => Offer::Empty,
            Some(p) if self.is_ready() => Offer::Ready(p),
            Some(p) => Offer::Pending(p),
        }
    }

    pub fn retrieve(&mut self) -> Option<ProductId> {
        if !self.is_ready() {
            return None;
        }
        self.counter = 0;
        self.product.take()
    }

    pub fn can_accept(&self) -> bool {
        self.product.is_none()
    }

    pub fn accept(&mut self, product: ProductId) -> bool {
        if !self.can_accept() {
            return false;
        }
        self.product = Some(product);
        true
    }
}

impl Structure {
    /// A 1×1 belt receiving products travelling in `entry`.
    pub fn belt(entry: Direction, shape: BeltShape) -> Self {
        Structure::new(
            TileGrid::from_rows(vec![vec![Some(StructureTile::facing(
                TileArt::Belt(shape),
                entry,
            ))]]),
            &[Transfer::new(0, 0, entry)],
            &[Transfer::new(0, 0, shape.exit(entry))],
            Machine::Belt(Belt::new()),
        )
    }

    pub fn belt_shape(&self) -> Option<BeltShape> {
        match self.tiles.get(0, 0)?.art {
            TileArt::Belt(shape) if matches!(self.machine, Machine::Belt(_)) => Some(shape),
            _ => None,
        }
    }

    /// Switch a belt to its next shape, keeping the entry side. False for non-belts.
    pub fn cycle_belt_shape(&mut self) -> bool {
        let Some(shape) = self.belt_shape() else {
            return false;
        };
        let next = shape.next();
        let entry = self.inputs[0].direction;
        if let Some(tile) = self.tiles.get_mut(0, 0) {
            tile.art = TileArt::Belt(next);
        }
        self.outputs[0].direction = next.exit(entry);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::items::ProductCatalog;

    fn plate() -> ProductId {
        ProductCatalog::standard().by_name("plate").unwrap()
    }

    #[test]
    fn test_belt_ready_after_delay() {
        let p = plate();
        let mut belt = Belt::new();
        assert!(belt.accept(p));
        for _ in 0..BELT_DELAY - 2 {
            belt.tick();
            assert_eq!(belt.offer(), Offer::Pending(p));
            assert_eq!(belt.retrieve(), None);
        }
        belt.tick();
        assert_eq!(belt.offer(), Offer::Ready(p));
        assert_eq!(belt.retrieve(), Some(p));
        assert_eq!(belt.offer(), Offer::Empty);
        assert!(belt.can_accept());
    }

    #[test]
    fn test_belt_holds_one_product() {
        let p = plate();
        let mut belt = Belt::new();
        assert!(belt.accept(p));
        assert!(!belt.can_accept());
        assert!(!belt.accept(p));
    }

    #[test]
    fn test_ready_belt_stops_counting() {
        let p = plate();
        let mut belt = Belt::new();
        belt.accept(p);
        for _ in 0..100 {
            belt.tick();
        }
        assert_eq!(belt.counter, BELT_DELAY - 1);
        belt.retrieve();
        assert_eq!(belt.counter, 0);
    }

    #[test]
    fn test_empty_belt_retrieve_is_noop() {
        let mut belt = Belt::new();
        belt.tick();
        assert_eq!(belt.retrieve(), None);
        assert_eq!(belt.retrieve(), None);
        assert_eq!(belt.counter, 0);
    }

    #[test]
    fn test_belt_shapes_turn_exit() {
        let s = Structure::belt(Direction::Down, BeltShape::TurnCw);
        assert_eq!(s.inputs()[0].direction, Direction::Down);
        assert_eq!(s.outputs()[0].direction, Direction::Left);
        let s = Structure::belt(Direction::Down, BeltShape::TurnCcw);
        assert_eq!(s.outputs()[0].direction, Direction::Right);
    }

    #[test]
    fn test_cycle_belt_shape() {
        let mut s = Structure::belt(Direction::Up, BeltShape::Straight);
        assert!(s.cycle_belt_shape());
        assert_eq!(s.belt_shape(), Some(BeltShape::TurnCw));
        assert_eq!(s.outputs()[0].direction, Direction::Right);
        assert!(s.cycle_belt_shape());
        assert!(s.cycle_belt_shape());
        assert_eq!(s.belt_shape(), Some(BeltShape::Straight));
        assert_eq!(s.outputs()[0].direction, Direction::Up);
        assert!(!Structure::chest().cycle_belt_shape());
    }

    #[test]
    fn test_rotated_turn_keeps_exit_relative_to_entry() {
        let mut s = Structure::belt(Direction::Down, BeltShape::TurnCcw);
        s.rotate_right();
        assert_eq!(s.inputs()[0].direction, Direction::Left);
        assert_eq!(s.outputs()[0].direction, Direction::Down);
        assert_eq!(s.tiles().get(0, 0).unwrap().glyph().1, 1 * 3 + 2);
    }
}
