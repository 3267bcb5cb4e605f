use std::collections::BTreeMap;

use crate::tags::Tags;

/// Bounded multiset of named items.
///
/// `size` caps the total quantity held across all items. Shrinking an
/// inventory below its content keeps the items; it just has no room left.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    size: u32,
    items: BTreeMap<String, u32>,
}

impl Inventory {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            items: BTreeMap::new(),
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn resize(&mut self, size: u32) {
        self.size = size;
    }

    /// Quantity held of `item`.
    pub fn get(&self, item: &str) -> u32 {
        self.items.get(item).copied().unwrap_or(0)
    }

    /// Every held item with its quantity, by name.
    pub fn get_all(&self) -> Vec<(String, u32)> {
        self.items.iter().map(|(k, &v)| (k.clone(), v)).collect()
    }

    pub fn total(&self) -> u32 {
        self.items.values().fold(0u32, |acc, &q| acc.saturating_add(q))
    }

    pub fn available(&self) -> u32 {
        self.size.saturating_sub(self.total())
    }

    /// Add as much of `quantity` as fits. Returns the quantity added.
    pub fn add(&mut self, quantity: u32, item: &str) -> u32 {
        let added = quantity.min(self.available());
        self.put(added, item);
        added
    }

    /// Add `quantity` only if all of it fits. Returns `quantity` or 0.
    pub fn add_all(&mut self, quantity: u32, item: &str) -> u32 {
        if quantity > self.available() {
            return 0;
        }
        self.put(quantity, item);
        quantity
    }

    /// Remove up to `quantity`. Returns the quantity removed.
    pub fn del(&mut self, quantity: u32, item: &str) -> u32 {
        let removed = quantity.min(self.get(item));
        self.take(removed, item);
        removed
    }

    /// Remove `quantity` only if that much is held. Returns `quantity` or 0.
    pub fn del_all(&mut self, quantity: u32, item: &str) -> u32 {
        if quantity > self.get(item) {
            return 0;
        }
        self.take(quantity, item);
        quantity
    }

    /// Move as much of `quantity` as is held here and fits in `dst`.
    pub fn move_to(&mut self, dst: &mut Inventory, quantity: u32, item: &str) -> u32 {
        let moved = quantity.min(self.get(item)).min(dst.available());
        self.take(moved, item);
        dst.put(moved, item);
        moved
    }

    /// Move exactly `quantity`, or nothing.
    pub fn move_all_to(&mut self, dst: &mut Inventory, quantity: u32, item: &str) -> u32 {
        if quantity > self.get(item) || quantity > dst.available() {
            return 0;
        }
        self.take(quantity, item);
        dst.put(quantity, item);
        quantity
    }

    fn put(&mut self, quantity: u32, item: &str) {
        if quantity == 0 {
            return;
        }
        let held = self.items.entry(item.to_string()).or_insert(0);
        *held = held.saturating_add(quantity);
    }

    fn take(&mut self, quantity: u32, item: &str) {
        if quantity == 0 {
            return;
        }
        if let Some(held) = self.items.get_mut(item) {
            *held -= quantity.min(*held);
            if *held == 0 {
                self.items.remove(item);
            }
        }
    }
}

/// Named object carrying script-defined tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub tags: Tags,
}

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
        }
    }
}
