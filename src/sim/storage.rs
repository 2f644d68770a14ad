use std::collections::HashMap;

use crate::game::items::{ProductCatalog, ProductId};

/// Capacity-bounded multiset of products. Used for chest contents and the
/// player inventory.
#[derive(Clone, Debug)]
pub struct Storage {
    items: HashMap<ProductId, u32>,
    capacity: u32,
    size: u32,
}

impl Storage {
    pub fn new(capacity: u32) -> Self {
        Self {
            items: HashMap::new(),
            capacity,
            size: 0,
        }
    }

    /// Add up to `count` units, clamped to the free space. Returns how many were added.
    pub fn add(&mut self, product: ProductId, count: u32) -> u32 {
        let added = count.min(self.capacity - self.size);
        if added > 0 {
            *self.items.entry(product).or_insert(0) += added;
            self.size += added;
        }
        added
    }

    /// Remove up to `count` units. Returns how many were removed.
    pub fn remove(&mut self, product: ProductId, count: u32) -> u32 {
        let current = self.count(product);
        let removed = count.min(current);
        if removed == current {
            self.items.remove(&product);
        } else {
            self.items.insert(product, current - removed);
        }
        self.size -= removed;
        removed
    }

    pub fn count(&self, product: ProductId) -> u32 {
        self.items.get(&product).copied().unwrap_or(0)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Total units held across all products.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of distinct products held.
    pub fn unique_products(&self) -> usize {
        self.items.len()
    }

    /// Held products in the catalog's canonical order.
    pub fn contents(&self, catalog: &ProductCatalog) -> Vec<(ProductId, u32)> {
        let mut items: Vec<(ProductId, u32)> = self.items
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&id, &count)| (id, count))
            .collect();
        items.sort_by_key(|(id, _)| catalog.position(*id).unwrap_or(usize::MAX));
        items
    }

    /// Move everything out, leaving the storage empty.
    pub fn drain(&mut self) -> HashMap<ProductId, u32> {
        self.size = 0;
        std::mem::take(&mut self.items)
    }
}
