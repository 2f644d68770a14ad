use std::collections::VecDeque;

use super::belt::BELT_DELAY;
use super::structure::{Machine, Offer, Structure, StructureTile, TileArt};
use crate::game::geometry::{Direction, TileGrid, Transfer};
use crate::game::items::ProductId;

pub const SPLITTER_CAPACITY: usize = 2;
pub const SPLITTER_DELAY: u32 = BELT_DELAY;

#[derive(Clone, Copy, Debug)]
struct Transit {
    product: ProductId,
    age: u32,
}

/// FIFO of products in transit, each aging independently. Only the head
/// can leave, once it has aged `delay - 1` ticks.
#[derive(Clone, Debug)]
pub struct TransitQueue {
    entries: VecDeque<Transit>,
    capacity: usize,
    delay: u32,
}

impl TransitQueue {
    pub fn new(capacity: usize, delay: u32) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            delay,
        }
    }

    /// Empty queue with the same capacity and delay.
    pub fn fresh(&self) -> Self {
        Self::new(self.capacity, self.delay)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn products(&self) -> impl Iterator<Item = ProductId> + '_ {
        self.entries.iter().map(|e| e.product)
    }

    fn threshold(&self) -> u32 {
        self.delay.saturating_sub(1)
    }

    pub fn tick(&mut self) {
        let threshold = self.threshold();
        for entry in self.entries.iter_mut() {
            if entry.age < threshold {
                entry.age += 1;
            }
        }
    }

    pub fn offer(&self) -> Offer {
        match self.entries.front() {
            None => Offer::Empty,
            Some(head) if head.age >= self.threshold() => Offer::Ready(head.product),
            Some(head) => Offer::Pending(head.product),
        }
    }

    pub fn retrieve(&mut self) -> Option<ProductId> {
        self.offer().ready()?;
        self.entries.pop_front().map(|e| e.product)
    }

    pub fn can_accept(&self) -> bool {
        self.entries.len() < self.capacity
    }

    pub fn accept(&mut self, product: ProductId) -> bool {
        if !self.can_accept() {
            return false;
        }
        self.entries.push_back(Transit { product, age: 0 });
        true
    }
}

impl Structure {
    /// Two cells wide, one input and one output per half.
    pub fn splitter() -> Self {
        let tiles = TileGrid::from_rows(vec![vec![
            Some(StructureTile::new(TileArt::SplitterLeft, 0)),
            Some(StructureTile::new(TileArt::SplitterRight, 0)),
        ]]);
        let ports = [
            Transfer::new(0, 0, Direction::Down),
            Transfer::new(1, 0, Direction::Down),
        ];
        Structure::new(
            tiles,
            &ports,
            &ports,
            Machine::Splitter(TransitQueue::new(SPLITTER_CAPACITY, SPLITTER_DELAY)),
        )
    }
}
