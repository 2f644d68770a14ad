use super::storage::Storage;
use super::structure::{Machine, Structure, StructureTile, TileArt};
use crate::game::geometry::{Direction, TileGrid, Transfer};
use crate::game::items::ProductId;

/// Units of any product mix a chest holds.
pub const CHEST_CAPACITY: u32 = 1000;

/// Sink that accepts from every side and never hands anything back to the line.
#[derive(Clone, Debug)]
pub struct Chest {
    storage: Storage,
}

impl Chest {
    pub fn new() -> Self {
        Self {
            storage: Storage::new(CHEST_CAPACITY),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    pub fn can_accept(&self) -> bool {
        !self.storage.is_full()
    }

    pub fn accept(&mut self, product: ProductId) -> bool {
        self.storage.add(product, 1) == 1
    }
}

impl Default for Chest {
    fn default() -> Self {
        Self::new()
    }
}

impl Structure {
    pub fn chest() -> Self {
        let inputs: Vec<Transfer> = Direction::ALL
            .iter()
            .map(|&d| Transfer::new(0, 0, d))
            .collect();
        Structure::new(
            TileGrid::from_rows(vec![vec![Some(StructureTile::new(TileArt::Chest, 0))]]),
            &inputs,
            &[],
            Machine::Chest(Chest::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::items::ProductCatalog;
    use crate::sim::structure::Offer;

    #[test]
    fn test_chest_accepts_from_all_sides() {
        let s = Structure::chest();
        let dirs: Vec<Direction> = s.inputs().iter().map(|t| t.direction).collect();
        assert_eq!(dirs, Direction::ALL.to_vec());
        assert!(s.outputs().is_empty());
    }

    #[test]
    fn test_chest_never_offers() {
        let catalog = ProductCatalog::standard();
        let gear = catalog.by_name("gear").unwrap();
        let mut s = Structure::chest();
        assert!(s.accept_product(gear));
        s.tick(&catalog);
        assert_eq!(s.can_retrieve_product(), Offer::Empty);
        assert_eq!(s.retrieve_product(), None);
        assert_eq!(s.as_chest().unwrap().storage().count(gear), 1);
    }

    #[test]
    fn test_full_chest_rejects() {
        let catalog = ProductCatalog::standard();
        let gear = catalog.by_name("gear").unwrap();
        let mut s = Structure::chest();
        for _ in 0..CHEST_CAPACITY {
            assert!(s.accept_product(gear));
        }
        assert!(!s.can_accept_product(gear));
        assert!(!s.accept_product(gear));
        assert_eq!(s.as_chest().unwrap().storage().size(), CHEST_CAPACITY);
    }
}
