//! Item storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::Clock;
use crate::items::model::{Item, ItemInput};

/// Storage behind the item handlers.
pub trait ItemStore: Send + Sync {
    fn create(&self, input: ItemInput) -> Item;
    fn get(&self, id: u64) -> Option<Item>;
    /// Newest first.
    fn list(&self) -> Vec<Item>;
    fn update(&self, id: u64, input: ItemInput) -> Option<Item>;
    fn delete(&self, id: u64) -> bool;
}

/// Process-local store. Ids start at 1 and are never reused.
pub struct MemoryItemStore {
    items: DashMap<u64, Item>,
    next_id: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemoryItemStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock,
        }
    }
}

impl ItemStore for MemoryItemStore {
    fn create(&self, input: ItemInput) -> Item {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now_utc();
        let item = Item {
            id,
            name: input.name,
            description: input.description,
            price: input.price,
            category: input.category,
            created_at: now,
            updated_at: now,
        };
        self.items.insert(id, item.clone());
        item
    }

    fn get(&self, id: u64) -> Option<Item> {
        self.items.get(&id).map(|r| r.value().clone())
    }

    fn list(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.items.iter().map(|r| r.value().clone()).collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    fn update(&self, id: u64, input: ItemInput) -> Option<Item> {
        let mut entry = self.items.get_mut(&id)?;
        let item = entry.value_mut();
        item.name = input.name;
        item.description = input.description;
        item.price = input.price;
        item.category = input.category;
        item.updated_at = self.clock.now_utc();
        Some(item.clone())
    }

    fn delete(&self, id: u64) -> bool {
        self.items.remove(&id).is_some()
    }
}
