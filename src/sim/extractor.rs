//! Extractors mine the resources under their own footprint, one unit per cycle.

use super::structure::{Machine, Offer, Structure, StructureTile, TileArt};
use crate::game::geometry::{Direction, TileGrid, Transfer};
use crate::game::items::{ProductCatalog, ProductId};

/// Ticks between an extraction and the product being ready.
pub const EXTRACTOR_DELAY: u32 = 40;

#[derive(Clone, Debug, Default)]
pub struct Extractor {
    product: Option<ProductId>,
    counter: u32,
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(&self) -> Option<ProductId> {
        self.product
    }

    fn is_ready(&self) -> bool {
        self.product.is_some() && self.counter >= EXTRACTOR_DELAY - 1
    }

    /// Age the held product, or mine one unit from the first non-empty
    /// resource under `footprint` when holding nothing.
    pub fn tick(&mut self, footprint: &mut TileGrid<StructureTile>, catalog: &ProductCatalog) {
        if self.product.is_some() {
            if !self.is_ready() {
                self.counter += 1;
            }
            return;
        }
        for (_, _, tile) in footprint.iter_mut() {
            let Some(resource) = tile.underlying.as_mut() else {
                continue;
            };
            if resource.amount == 0 {
                continue;
            }
            let Some(product) = resource.kind.and_then(|kind| catalog.resource(kind)) else {
                continue;
            };
            resource.amount -= 1;
            self.product = Some(product);
            self.counter = 0;
            return;
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
}

impl Structure {
    /// 3×3 extractor with one output at the bottom centre.
    pub fn extractor() -> Self {
        let t = |art, rotation| Some(StructureTile::new(art, rotation));
        let tiles = TileGrid::from_rows(vec![
            vec![t(TileArt::Corner, 0), t(TileArt::Edge, 0), t(TileArt::Corner, 1)],
            vec![t(TileArt::Edge, 3), t(TileArt::Center, 0), t(TileArt::Edge, 1)],
            vec![
                t(TileArt::Corner, 3),
                Some(StructureTile::facing(TileArt::Output, Direction::Down)),
                t(TileArt::Corner, 2),
            ],
        ]);
        Structure::new(
            tiles,
            &[],
            &[Transfer::new(1, 2, Direction::Down)],
            Machine::Extractor(Extractor::new()),
        )
    }
}
