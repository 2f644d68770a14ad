use std::collections::HashMap;

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use super::recipes::{Recipe, RecipeBook};
use crate::sim::structure::StructureKind;

new_key_type! {
    /// Handle to a catalog product. Each name is interned once, so two
    /// handles are equal exactly when they name the same product.
    pub struct ProductId;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProductCategory {
    /// Mined from the map by extractors.
    Resource,
    Intermediate,
    /// Placeable on the map.
    Structure,
}

#[derive(Clone, Debug)]
pub struct Product {
    pub name: String,
    pub glyph: char,
    pub category: ProductCategory,
    /// Structure built when this product is placed.
    pub prototype: Option<StructureKind>,
}

/// Immutable registry of products and recipes, shared by every part of a game.
#[derive(Debug)]
pub struct ProductCatalog {
    products: SlotMap<ProductId, Product>,
    order: Vec<ProductId>,
    positions: SecondaryMap<ProductId, usize>,
    by_name: HashMap<String, ProductId>,
    resources: Vec<ProductId>,
    structures: HashMap<StructureKind, ProductId>,
    recipes: RecipeBook,
}

impl ProductCatalog {
    /// The stock catalog: three ores, four intermediates, six buildables.
    pub fn standard() -> Self {
        let mut b = CatalogBuilder::new();
        let copper = b.resource("copper", 'c');
        let iron = b.resource("iron", 'i');
        let stone = b.resource("stone", 's');
        let wire = b.intermediate("wire", 'w');
        let circuit = b.intermediate("circuit", 'C');
        let plate = b.intermediate("plate", 'p');
        let gear = b.intermediate("gear", 'g');
        let extractor = b.structure(StructureKind::Extractor, "extractor", 'e');
        let chest = b.structure(StructureKind::Chest, "chest", 'S');
        let belt = b.structure(StructureKind::Belt, "belt", 'b');
        let splitter = b.structure(StructureKind::Splitter, "splitter", 's');
        let factory = b.structure(StructureKind::Factory, "factory", 'f');
        let underground = b.structure(StructureKind::Underground, "underground", 'u');

        b.recipe(Recipe::new(wire, 100).with_input(copper, 4));
        b.recipe(Recipe::new(circuit, 200).with_input(wire, 6));
        b.recipe(Recipe::new(gear, 120).with_input(iron, 4));
        b.recipe(Recipe::new(plate, 120).with_input(iron, 10));
        b.recipe(Recipe::new(extractor, 200).with_input(stone, 10).with_input(plate, 10));
        b.recipe(Recipe::new(factory, 200).with_input(stone, 10).with_input(plate, 10));
        b.recipe(Recipe::new(chest, 100).with_input(plate, 4));
        b.recipe(Recipe::new(belt, 40).with_input(plate, 1).with_input(gear, 1));
        b.recipe(Recipe::new(splitter, 80).with_input(plate, 3).with_input(gear, 3));
        b.recipe(Recipe::new(underground, 80).with_input(plate, 5).with_input(gear, 5));
        b.build()
    }

    pub fn get(&self, id: ProductId) -> Option<&Product> {
        self.products.get(id)
    }

    pub fn name(&self, id: ProductId) -> &str {
        self.products.get(id).map_or("?", |p| p.name.as_str())
    }

    pub fn by_name(&self, name: &str) -> Option<ProductId> {
        self.by_name.get(name).copied()
    }

    /// Products in canonical (registration) order.
    pub fn canonical_order(&self) -> &[ProductId] {
        &self.order
    }

    pub fn position(&self, id: ProductId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Product mined from a resource of the given kind index.
    pub fn resource(&self, kind: usize) -> Option<ProductId> {
        self.resources.get(kind).copied()
    }

    pub fn resource_kinds(&self) -> usize {
        self.resources.len()
    }

    /// Inventory product that builds a structure of `kind`.
    pub fn structure_product(&self, kind: StructureKind) -> Option<ProductId> {
        self.structures.get(&kind).copied()
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Collects products and recipes, then freezes them into a [`ProductCatalog`].
#[derive(Default)]
pub struct CatalogBuilder {
    products: SlotMap<ProductId, Product>,
    order: Vec<ProductId>,
    by_name: HashMap<String, ProductId>,
    resources: Vec<ProductId>,
    structures: HashMap<StructureKind, ProductId>,
    recipes: Vec<Recipe>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mined product. Resource kind indices follow call order.
    pub fn resource(&mut self, name: &str, glyph: char) -> ProductId {
        let (id, fresh) = self.intern(name, glyph, ProductCategory::Resource, None);
        if fresh {
            self.resources.push(id);
        }
        id
    }

    pub fn intermediate(&mut self, name: &str, glyph: char) -> ProductId {
        self.intern(name, glyph, ProductCategory::Intermediate, None).0
    }

    pub fn structure(&mut self, kind: StructureKind, name: &str, glyph: char) -> ProductId {
        let (id, fresh) = self.intern(name, glyph, ProductCategory::Structure, Some(kind));
        if fresh {
            self.structures.entry(kind).or_insert(id);
        }
        id
    }

    pub fn recipe(&mut self, recipe: Recipe) -> &mut Self {
        self.recipes.push(recipe);
        self
    }

    pub fn build(self) -> ProductCatalog {
        let mut positions = SecondaryMap::new();
        for (i, &id) in self.order.iter().enumerate() {
            positions.insert(id, i);
        }
        ProductCatalog {
            products: self.products,
            order: self.order,
            positions,
            by_name: self.by_name,
            resources: self.resources,
            structures: self.structures,
            recipes: RecipeBook::new(self.recipes),
        }
    }

    /// Returns the existing handle when `name` is already registered.
    fn intern(
        &mut self,
        name: &str,
        glyph: char,
        category: ProductCategory,
        prototype: Option<StructureKind>,
    ) -> (ProductId, bool) {
        if let Some(&id) = self.by_name.get(name) {
            return (id, false);
        }
        let id = self.products.insert(Product {
            name: name.to_string(),
            glyph,
            category,
            prototype,
        });
        self.order.push(id);
        self.by_name.insert(name.to_string(), id);
        (id, true)
    }
}
