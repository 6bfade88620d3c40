use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WILDCARD;

// ---------------------------------------------------------------------------
// Wanted list
// ---------------------------------------------------------------------------

/// One line of a wanted list. `color` and `condition` hold `"X"` when the
/// buyer accepts any value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantedItem {
    pub number: String,
    pub color: Option<String>,
    pub quantity: u32,
    pub condition: Option<String>,
}

impl WantedItem {
    /// Exact identity key `number:color:condition` used in `items.csv`.
    pub fn key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.number,
            attr_or_wildcard(self.color.as_deref()),
            attr_or_wildcard(self.condition.as_deref()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WantedList {
    pub id: String,
    pub items: Vec<WantedItem>,
    pub fetched: Option<DateTime<Utc>>,
}

impl WantedList {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
            fetched: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Sellers
// ---------------------------------------------------------------------------

/// A seller as observed in one search result, before its id is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreCandidate {
    pub username: String,
    /// Minimum order value; `None` = no minimum
    pub min_buy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    /// Marketplace-internal seller id
    pub id: String,
    pub username: String,
    pub min_buy: Option<f64>,
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[serde(rename = "N")]
    New,
    #[serde(rename = "U")]
    Used,
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Condition::New => "N",
            Condition::Used => "U",
        };
        write!(f, "{s}")
    }
}

/// A lot in a seller's catalog that matched the wanted list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub number: String,
    pub color: Option<String>,
    pub quantity: u32,
    pub condition: Condition,
    /// Unit price, converted to the buyer's currency
    pub price: f64,
}

/// Cached inventory of one seller for one wanted list.
#[derive(Debug, Clone, PartialEq)]
pub struct WantedStoreInventory {
    pub wanted_id: String,
    pub store: Store,
    pub items: Vec<InventoryItem>,
    pub fetched: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Availability — one row per (key, seller) for the solver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailabilityRecord {
    pub store: String,
    pub id: String,
    #[serde(rename = "minBuy")]
    pub min_buy: Option<f64>,
    pub price: f64,
    pub quantity: u32,
}

pub(crate) fn attr_or_wildcard(attr: Option<&str>) -> &str {
    match attr {
        Some(a) if !a.is_empty() => a,
        _ => WILDCARD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wanted_key_uses_wildcard_for_missing_attributes() {
        let item = WantedItem {
            number: "3001".into(),
            color: None,
            quantity: 4,
            condition: Some("N".into()),
        };
        assert_eq!(item.key(), "3001:X:N");

        let any = WantedItem {
            condition: Some(String::new()),
            color: Some("11".into()),
            ..item
        };
        assert_eq!(any.key(), "3001:11:X");
    }

    #[test]
    fn condition_serializes_as_single_letter() {
        assert_eq!(serde_json::to_string(&Condition::Used).unwrap(), "\"U\"");
        let parsed: Condition = serde_json::from_str("\"N\"").unwrap();
        assert_eq!(parsed, Condition::New);
    }
}
