use super::belt::BELT_DELAY;
use super::splitter::TransitQueue;
use super::structure::{Machine, Structure, StructureTile, TileArt};
use crate::game::geometry::{Direction, TileGrid, Transfer};

pub const UNDERGROUND_CAPACITY: usize = 4;
/// Transit time across the four cells.
pub const UNDERGROUND_DELAY: u32 = 4 * BELT_DELAY;

impl Structure {
    /// Four cells long. Only the two end caps are drawn; the middle runs
    /// underneath whatever is placed over it on screen.
    pub fn underground() -> Self {
        let tiles = TileGrid::from_rows(vec![
            vec![Some(StructureTile::facing(TileArt::Input, Direction::Down))],
            vec![None],
            vec![None],
            vec![Some(StructureTile::facing(TileArt::Output, Direction::Down))],
        ]);
        Structure::new(
            tiles,
            &[Transfer::new(0, 0, Direction::Down)],
            &[Transfer::new(0, 3, Direction::Down)],
            Machine::Underground(TransitQueue::new(UNDERGROUND_CAPACITY, UNDERGROUND_DELAY)),
        )
    }
}
