//! # Cart Types
//!
//! The values the cart store holds and hands to subscribers.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Cart Types                                      │
//! │                                                                         │
//! │  ┌─────────────────────────┐        ┌─────────────────────────┐        │
//! │  │       CartState         │        │       CartPatch         │        │
//! │  │  ─────────────────────  │        │  ─────────────────────  │        │
//! │  │  items: Vec<LineItem>   │◄───────│  items: Option<...>     │        │
//! │  │  is_loading: bool       │ merge  │  is_loading: Option<..> │        │
//! │  │  is_initialized: bool   │        │  is_initialized: Option │        │
//! │  └───────────┬─────────────┘        └─────────────────────────┘        │
//! │              │ 0..n, unique by product_id                              │
//! │  ┌───────────▼─────────────┐                                           │
//! │  │       LineItem          │                                           │
//! │  │  ─────────────────────  │                                           │
//! │  │  product_id (opaque)    │                                           │
//! │  │  quantity (> 0)         │                                           │
//! │  │  note (optional)        │                                           │
//! │  │  metadata (flattened)   │                                           │
//! │  └─────────────────────────┘                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shape
//! All types serialize with camelCase field names so persisted snapshots and
//! front-end payloads share one format:
//! ```json
//! { "productId": "p1", "quantity": 2, "note": "no chili", "name": "Pho", "price": 1200 }
//! ```
//! Anything that is not `productId`, `quantity` or `note` lands in `metadata`
//! and is written back out unchanged.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

// =============================================================================
// Product Identifier
// =============================================================================

/// Opaque product identifier assigned by the external catalog.
///
/// The catalog hands out either strings or integers; both are accepted on
/// input and normalised to their string form, so `7` and `"7"` name the same
/// line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a product identifier.
    pub fn new(id: impl Into<String>) -> Self {
        ProductId(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(text) => ProductId(text),
            Raw::Signed(n) => ProductId(n.to_string()),
            Raw::Unsigned(n) => ProductId(n.to_string()),
        })
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        ProductId(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        ProductId(id)
    }
}

impl From<u64> for ProductId {
    fn from(id: u64) -> Self {
        ProductId(id.to_string())
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One product entry in the cart.
///
/// ## Invariants (held by the reducer, not by construction)
/// - At most one `LineItem` per `product_id` in a [`CartState`]
/// - `quantity > 0` for every line at rest; a non-positive quantity on an
///   intent means "remove"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    /// Catalog product identifier, unique within the cart.
    pub product_id: ProductId,

    /// Number of units.
    pub quantity: i64,

    /// Free-text annotation ("no chili", "gift wrap").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Name, price, options and whatever else the catalog attached.
    /// Carried through every transition untouched.
    #[serde(flatten)]
    #[ts(skip)]
    pub metadata: Map<String, Value>,
}

impl LineItem {
    /// Creates a line without note or metadata.
    pub fn new(product_id: impl Into<ProductId>, quantity: i64) -> Self {
        LineItem {
            product_id: product_id.into(),
            quantity,
            note: None,
            metadata: Map::new(),
        }
    }

    /// Sets the note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Attaches one metadata field.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns true if the line carries a non-empty note.
    ///
    /// Only a non-empty note may replace an existing one on merge.
    #[inline]
    pub fn has_note(&self) -> bool {
        self.note.as_deref().is_some_and(|note| !note.is_empty())
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// The complete cart value held by the store.
///
/// ## Lifecycle Flags
/// ```text
/// is_initialized:  false ──Initialize──► true   (never goes back)
/// is_loading:      true  ──Initialize──► false
///                  any   ──SetLoading──► any
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartState {
    /// Lines in arrival order.
    pub items: Vec<LineItem>,

    /// True while the store is (re)hydrating from persistence.
    pub is_loading: bool,

    /// True once the first hydration has completed.
    pub is_initialized: bool,
}

impl CartState {
    /// Creates the startup state: empty, loading, not yet initialized.
    pub fn new() -> Self {
        CartState {
            items: Vec::new(),
            is_loading: true,
            is_initialized: false,
        }
    }

    /// Looks up a line by product.
    pub fn find(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Returns true if the product has a line in the cart.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.find(product_id).is_some()
    }

    /// Returns the number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total number of units across all lines.
    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Checks if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for CartState {
    fn default() -> Self {
        CartState::new()
    }
}

// =============================================================================
// Cart Patch
// =============================================================================

/// Partial cart state consumed by the Initialize intent.
///
/// Only fields that are `Some` are merged. Initialize forces both lifecycle
/// flags afterwards, so the flag fields here exist for snapshot compatibility
/// and are effectively overridden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct CartPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<LineItem>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_initialized: Option<bool>,
}

impl CartPatch {
    /// A patch that carries only items.
    pub fn with_items(items: Vec<LineItem>) -> Self {
        CartPatch {
            items: Some(items),
            ..CartPatch::default()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_state() {
        let state = CartState::default();
        assert!(state.is_empty());
        assert!(state.is_loading);
        assert!(!state.is_initialized);
    }

    #[test]
    fn test_product_id_accepts_numbers() {
        let from_int: ProductId = serde_json::from_value(json!(42)).unwrap();
        let from_text: ProductId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(from_int, from_text);
        assert_eq!(serde_json::to_value(&from_int).unwrap(), json!("42"));
    }

    #[test]
    fn test_line_item_keeps_metadata() {
        let raw = json!({
            "productId": "p1",
            "quantity": 2,
            "name": "Pho Bo",
            "price": 1200,
            "options": ["large"]
        });

        let item: LineItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(item.product_id.as_str(), "p1");
        assert_eq!(item.quantity, 2);
        assert!(item.note.is_none());
        assert_eq!(item.metadata.get("name"), Some(&json!("Pho Bo")));

        // Unknown fields survive the trip back out
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_has_note() {
        assert!(!LineItem::new("p1", 1).has_note());
        assert!(!LineItem::new("p1", 1).with_note("").has_note());
        assert!(LineItem::new("p1", 1).with_note("extra sauce").has_note());
    }

    #[test]
    fn test_cart_state_helpers() {
        let state = CartState {
            items: vec![LineItem::new("a", 2), LineItem::new("b", 3)],
            is_loading: false,
            is_initialized: true,
        };

        assert_eq!(state.item_count(), 2);
        assert_eq!(state.total_quantity(), 5);
        assert!(state.contains(&"b".into()));
        assert!(!state.contains(&"c".into()));
    }

    #[test]
    fn test_cart_state_camel_case() {
        let value = serde_json::to_value(CartState::new()).unwrap();
        assert_eq!(
            value,
            json!({ "items": [], "isLoading": true, "isInitialized": false })
        );
    }

    #[test]
    fn test_patch_missing_fields_are_none() {
        let patch: CartPatch = serde_json::from_value(json!({ "isLoading": true })).unwrap();
        assert!(patch.items.is_none());
        assert_eq!(patch.is_loading, Some(true));
        assert!(patch.is_initialized.is_none());
    }
}
