use smallvec::SmallVec;

use super::structure::{Machine, Offer, Structure, StructureTile, TileArt};
use crate::game::geometry::{Direction, TileGrid, Transfer};
use crate::game::items::ProductId;
use crate::game::recipes::Recipe;

/// Recipe-driven assembler. Collects a full batch of inputs, then produces
/// for `production_ticks` ticks. Idle without a recipe.
#[derive(Clone, Debug, Default)]
pub struct Factory {
    recipe: Option<Recipe>,
    /// Units received so far, aligned with `recipe.inputs`.
    received: SmallVec<[u32; 4]>,
    /// 0 while collecting; 1..=production_ticks while producing.
    progress: u32,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recipe(recipe: Recipe) -> Self {
        let mut factory = Self::new();
        factory.set_recipe(Some(recipe));
        factory
    }

    /// Same recipe, nothing received, not producing.
    pub fn fresh(&self) -> Self {
        match &self.recipe {
            Some(recipe) => Self::with_recipe(recipe.clone()),
            None => Self::new(),
        }
    }

    /// Replace the recipe. Collected inputs and progress are discarded.
    pub fn set_recipe(&mut self, recipe: Option<Recipe>) {
        self.received = recipe
            .as_ref()
            .map(|r| r.inputs.iter().map(|_| 0).collect())
            .unwrap_or_default();
        self.recipe = recipe;
        self.progress = 0;
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn progress(&self) -> u32 {
        self.progress
    }

    pub fn is_producing(&self) -> bool {
        self.progress > 0
    }

    pub fn received(&self, product: ProductId) -> u32 {
        self.recipe
            .as_ref()
            .and_then(|r| r.input_index(product))
            .map_or(0, |i| self.received[i])
    }

    /// Ticks to finish one batch. Zero-tick recipes still take one.
    fn target(recipe: &Recipe) -> u32 {
        recipe.production_ticks.max(1)
    }

    pub fn tick(&mut self) {
        let Some(recipe) = &self.recipe else {
            return;
        };
        if self.progress > 0 {
            if self.progress < Self::target(recipe) {
                self.progress += 1;
            }
            return;
        }
        let complete = recipe
            .inputs
            .iter()
            .zip(&self.received)
            .all(|(&(_, required), &got)| got >= required);
        if complete {
            self.received.iter_mut().for_each(|c| *c = 0);
            self.progress = 1;
        }
    }

    pub fn offer(&self) -> Offer {
        match &self.recipe {
            Some(recipe) if self.progress >= Self::target(recipe) => Offer::Ready(recipe.output),
            Some(recipe) if self.progress > 0 => Offer::Pending(recipe.output),
            _ => Offer::Empty,
        }
    }

    pub fn retrieve(&mut self) -> Option<ProductId> {
        let product = self.offer().ready()?;
        self.progress = 0;
        Some(product)
    }

    pub fn can_accept(&self, product: ProductId) -> bool {
        let Some(recipe) = &self.recipe else {
            return false;
        };
        if self.is_producing() {
            return false;
        }
        match recipe.input_index(product) {
            Some(i) => self.received[i] < recipe.inputs[i].1,
            None => false,
        }
    }

    pub fn accept(&mut self, product: ProductId) -> bool {
        if !self.can_accept(product) {
            return false;
        }
        if let Some(i) = self.recipe.as_ref().and_then(|r| r.input_index(product)) {
            self.received[i] += 1;
        }
        true
    }
}

impl Structure {
    /// 3×3 factory with two inputs along the top and one output at the bottom.
    pub fn factory() -> Self {
        let t = |art, rotation| Some(StructureTile::new(art, rotation));
        let port = |art| Some(StructureTile::facing(art, Direction::Down));
        let tiles = TileGrid::from_rows(vec![
            vec![port(TileArt::Input), t(TileArt::Edge, 0), port(TileArt::Input)],
            vec![t(TileArt::Edge, 3), t(TileArt::Center, 0), t(TileArt::Edge, 1)],
            vec![t(TileArt::Corner, 3), port(TileArt::Output), t(TileArt::Corner, 2)],
        ]);
        Structure::new(
            tiles,
            &[
                Transfer::new(0, 0, Direction::Down),
                Transfer::new(2, 0, Direction::Down),
            ],
            &[Transfer::new(1, 2, Direction::Down)],
            Machine::Factory(Factory::new()),
        )
    }
}
