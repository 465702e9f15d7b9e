//! Item records and request bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of create and update requests. Missing fields take their zero value
/// and are then caught by [`ItemInput::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemInput {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: String,
}

impl ItemInput {
    /// Check every field, reporting all problems joined with `"; "`.
    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name is required");
        }
        if self.price < 0.0 || self.price.is_nan() {
            errors.push("price must be non-negative");
        }
        if self.category.trim().is_empty() {
            errors.push("category is required");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }
}

/// Body of `GET /api/v1/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemList {
    pub items: Vec<Item>,
    pub total: usize,
}
