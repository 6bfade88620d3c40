use std::collections::HashMap;

use crate::config::WILDCARD;
use crate::types::{attr_or_wildcard, AvailabilityRecord, InventoryItem, WantedStoreInventory};

/// Running quantity-weighted average for one (key, seller) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceAccumulator {
    pub price: f64,
    pub quantity: u32,
}

impl PriceAccumulator {
    pub fn merge(&mut self, price: f64, quantity: u32) {
        if self.quantity == 0 {
            self.price = price;
            self.quantity = quantity;
            return;
        }
        if quantity == 0 {
            return;
        }
        let total = self.quantity.saturating_add(quantity);
        self.price = (self.price * self.quantity as f64 + price * quantity as f64)
            / (self.quantity as f64 + quantity as f64);
        self.quantity = total;
    }
}

/// Keys a lot can satisfy: `number:X:X`, `number:color:X`, `number:X:cond`
/// and `number:color:cond`. A lot without a color collapses onto the
/// wildcard keys, which are listed once.
pub fn expand_keys(item: &InventoryItem) -> Vec<String> {
    let color = attr_or_wildcard(item.color.as_deref());
    let condition = item.condition.to_string();
    let n = &item.number;

    let mut keys = Vec::with_capacity(4);
    for key in [
        format!("{n}:{WILDCARD}:{WILDCARD}"),
        format!("{n}:{color}:{WILDCARD}"),
        format!("{n}:{WILDCARD}:{condition}"),
        format!("{n}:{color}:{condition}"),
    ] {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Build the availability table: one row per (expanded key, seller). Lots of
/// the same seller that land on one key are merged; sellers are never merged
/// with each other. Rows follow inventory order, then first occurrence of
/// each key within the seller.
pub fn aggregate(inventories: &[WantedStoreInventory]) -> Vec<AvailabilityRecord> {
    let mut rows = Vec::new();

    for inventory in inventories {
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, PriceAccumulator> = HashMap::new();

        for item in &inventory.items {
            for key in expand_keys(item) {
                merged
                    .entry(key.clone())
                    .or_insert_with(|| {
                        order.push(key);
                        PriceAccumulator::default()
                    })
                    .merge(item.price, item.quantity);
            }
        }

        rows.extend(order.into_iter().map(|id| {
            let acc = merged[&id];
            AvailabilityRecord {
                store: inventory.store.username.clone(),
                id,
                min_buy: inventory.store.min_buy,
                price: acc.price,
                quantity: acc.quantity,
            }
        }));
    }

    rows
}
