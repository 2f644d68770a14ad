use std::collections::HashMap;

use smallvec::SmallVec;

use super::items::ProductId;
use crate::sim::storage::Storage;

/// A conversion of counted input products into one output product.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipe {
    pub inputs: SmallVec<[(ProductId, u32); 4]>,
    pub output: ProductId,
    pub production_ticks: u32,
}

impl Recipe {
    pub fn new(output: ProductId, production_ticks: u32) -> Self {
        Self {
            inputs: SmallVec::new(),
            output,
            production_ticks,
        }
    }

    /// Add an input requirement. Naming the same product twice replaces its count.
    pub fn with_input(mut self, product: ProductId, count: u32) -> Self {
        match self.inputs.iter_mut().find(|(p, _)| *p == product) {
            Some(entry) => entry.1 = count,
            None => self.inputs.push((product, count)),
        }
        self
    }

    /// Position of `product` in `inputs`.
    pub fn input_index(&self, product: ProductId) -> Option<usize> {
        self.inputs.iter().position(|(p, _)| *p == product)
    }

    pub fn required(&self, product: ProductId) -> Option<u32> {
        self.input_index(product).map(|i| self.inputs[i].1)
    }
}

/// All recipes known to a catalog, indexed by output and by input product.
#[derive(Clone, Debug, Default)]
pub struct RecipeBook {
    all: Vec<Recipe>,
    by_output: HashMap<ProductId, Vec<usize>>,
    by_input: HashMap<ProductId, Vec<usize>>,
}

impl RecipeBook {
    pub fn new(all: Vec<Recipe>) -> Self {
        let mut by_output: HashMap<ProductId, Vec<usize>> = HashMap::new();
        let mut by_input: HashMap<ProductId, Vec<usize>> = HashMap::new();

        for (i, recipe) in all.iter().enumerate() {
            by_output.entry(recipe.output).or_default().push(i);
            for &(input, _) in &recipe.inputs {
                by_input.entry(input).or_default().push(i);
            }
        }

        Self { all, by_output, by_input }
    }

    pub fn all(&self) -> &[Recipe] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn recipes_for(&self, output: ProductId) -> Vec<&Recipe> {
        self.by_output
            .get(&output)
            .map(|indices| indices.iter().map(|&i| &self.all[i]).collect())
            .unwrap_or_default()
    }

    pub fn recipes_using(&self, input: ProductId) -> Vec<&Recipe> {
        self.by_input
            .get(&input)
            .map(|indices| indices.iter().map(|&i| &self.all[i]).collect())
            .unwrap_or_default()
    }

    /// Whether `storage` holds every input of `recipe` in the required amount.
    pub fn can_supply(&self, recipe: &Recipe, storage: &Storage) -> bool {
        recipe.inputs.iter().all(|&(product, count)| storage.count(product) >= count)
    }
}
