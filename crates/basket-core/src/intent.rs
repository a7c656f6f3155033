//! # Intents
//!
//! Descriptions of requested cart changes, and their constructors.
//!
//! ## Wire Format
//! Intents travel as the same `{type, payload}` action objects the front-end
//! dispatches:
//! ```text
//! ┌────────────────────┬──────────────────────────────────────────────────┐
//! │ type               │ payload                                          │
//! ├────────────────────┼──────────────────────────────────────────────────┤
//! │ INITIALIZE         │ CartPatch   { items?, isLoading?, isInitialized? }│
//! │ ADD_ITEM           │ LineItem    { productId, quantity, note?, ... }  │
//! │ REMOVE_ITEM        │ { productId }                                    │
//! │ UPDATE_QUANTITY    │ { productId, quantity }                          │
//! │ UPDATE_ITEM        │ LineItem                                         │
//! │ CLEAR_CART         │ null / absent                                    │
//! │ SET_LOADING        │ bool                                             │
//! │ anything else      │ kept verbatim as Intent::Unknown                 │
//! └────────────────────┴──────────────────────────────────────────────────┘
//! ```
//! REMOVE_ITEM and UPDATE_QUANTITY accept a whole line item as payload; only
//! the fields listed above are read.
//!
//! Unrecognised `type` values deserialize into [`Intent::Unknown`] instead
//! of failing, so a newer front-end can talk to an older store.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::types::{CartPatch, LineItem, ProductId};

// =============================================================================
// Intent
// =============================================================================

/// A requested state change, consumed by [`crate::reducer::transition`].
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Hydrate from persisted data; forces the lifecycle flags.
    Initialize(CartPatch),

    /// Add units of a product, merging with an existing line.
    AddItem(LineItem),

    /// Drop a product's line.
    RemoveItem { product_id: ProductId },

    /// Set a line's quantity; `<= 0` removes the line.
    UpdateQuantity { product_id: ProductId, quantity: i64 },

    /// Replace a whole line, matched by product.
    UpdateItem(LineItem),

    /// Empty the cart.
    ClearCart,

    /// Set the loading flag.
    SetLoading(bool),

    /// An intent kind this build does not know. Always a no-op.
    Unknown { kind: String, payload: Value },
}

impl Intent {
    pub const INITIALIZE: &'static str = "INITIALIZE";
    pub const ADD_ITEM: &'static str = "ADD_ITEM";
    pub const REMOVE_ITEM: &'static str = "REMOVE_ITEM";
    pub const UPDATE_QUANTITY: &'static str = "UPDATE_QUANTITY";
    pub const UPDATE_ITEM: &'static str = "UPDATE_ITEM";
    pub const CLEAR_CART: &'static str = "CLEAR_CART";
    pub const SET_LOADING: &'static str = "SET_LOADING";

    /// Returns the wire tag of this intent.
    pub fn kind(&self) -> &str {
        match self {
            Intent::Initialize(_) => Self::INITIALIZE,
            Intent::AddItem(_) => Self::ADD_ITEM,
            Intent::RemoveItem { .. } => Self::REMOVE_ITEM,
            Intent::UpdateQuantity { .. } => Self::UPDATE_QUANTITY,
            Intent::UpdateItem(_) => Self::UPDATE_ITEM,
            Intent::ClearCart => Self::CLEAR_CART,
            Intent::SetLoading(_) => Self::SET_LOADING,
            Intent::Unknown { kind, .. } => kind,
        }
    }

    /// Returns the product this intent targets, if any.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            Intent::AddItem(item) | Intent::UpdateItem(item) => Some(&item.product_id),
            Intent::RemoveItem { product_id } | Intent::UpdateQuantity { product_id, .. } => {
                Some(product_id)
            }
            _ => None,
        }
    }

    /// Returns true for kinds this build does not recognise.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Intent::Unknown { .. })
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Builds an Initialize intent.
pub fn initialize(patch: CartPatch) -> Intent {
    Intent::Initialize(patch)
}

/// Builds an AddItem intent.
pub fn add_item(item: LineItem) -> Intent {
    Intent::AddItem(item)
}

/// Builds a RemoveItem intent.
pub fn remove_item(product_id: impl Into<ProductId>) -> Intent {
    Intent::RemoveItem {
        product_id: product_id.into(),
    }
}

/// Builds an UpdateQuantity intent.
pub fn update_quantity(product_id: impl Into<ProductId>, quantity: i64) -> Intent {
    Intent::UpdateQuantity {
        product_id: product_id.into(),
        quantity,
    }
}

/// Builds an UpdateItem intent.
pub fn update_item(item: LineItem) -> Intent {
    Intent::UpdateItem(item)
}

/// Builds a ClearCart intent.
pub fn clear_cart() -> Intent {
    Intent::ClearCart
}

/// Builds a SetLoading intent.
pub fn set_loading(is_loading: bool) -> Intent {
    Intent::SetLoading(is_loading)
}

// =============================================================================
// Serialization
// =============================================================================

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductPayload<P> {
    product_id: P,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuantityPayload<P> {
    product_id: P,
    quantity: i64,
}

#[derive(Deserialize)]
struct RawIntent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl TryFrom<RawIntent> for Intent {
    type Error = serde_json::Error;

    fn try_from(raw: RawIntent) -> Result<Self, Self::Error> {
        let RawIntent { kind, payload } = raw;

        let intent = match kind.as_str() {
            Intent::INITIALIZE => {
                // A missing payload hydrates nothing but still flips the flags
                if payload.is_null() {
                    Intent::Initialize(CartPatch::default())
                } else {
                    Intent::Initialize(serde_json::from_value(payload)?)
                }
            }
            Intent::ADD_ITEM => Intent::AddItem(serde_json::from_value(payload)?),
            Intent::REMOVE_ITEM => {
                let ProductPayload { product_id } = serde_json::from_value(payload)?;
                Intent::RemoveItem { product_id }
            }
            Intent::UPDATE_QUANTITY => {
                let QuantityPayload {
                    product_id,
                    quantity,
                } = serde_json::from_value(payload)?;
                Intent::UpdateQuantity {
                    product_id,
                    quantity,
                }
            }
            Intent::UPDATE_ITEM => Intent::UpdateItem(serde_json::from_value(payload)?),
            Intent::CLEAR_CART => Intent::ClearCart,
            Intent::SET_LOADING => Intent::SetLoading(serde_json::from_value(payload)?),
            _ => Intent::Unknown { kind, payload },
        };

        Ok(intent)
    }
}

impl<'de> Deserialize<'de> for Intent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawIntent::deserialize(deserializer)?;
        Intent::try_from(raw).map_err(D::Error::custom)
    }
}

impl Serialize for Intent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", self.kind())?;

        match self {
            Intent::Initialize(patch) => map.serialize_entry("payload", patch)?,
            Intent::AddItem(item) | Intent::UpdateItem(item) => {
                map.serialize_entry("payload", item)?
            }
            Intent::RemoveItem { product_id } => {
                map.serialize_entry("payload", &ProductPayload { product_id })?
            }
            Intent::UpdateQuantity {
                product_id,
                quantity,
            } => map.serialize_entry(
                "payload",
                &QuantityPayload {
                    product_id,
                    quantity: *quantity,
                },
            )?,
            Intent::ClearCart => map.serialize_entry("payload", &Value::Null)?,
            Intent::SetLoading(flag) => map.serialize_entry("payload", flag)?,
            Intent::Unknown { payload, .. } => map.serialize_entry("payload", payload)?,
        }

        map.end()
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
    fn test_constructors_set_kind() {
        assert_eq!(initialize(CartPatch::default()).kind(), "INITIALIZE");
        assert_eq!(add_item(LineItem::new("p1", 1)).kind(), "ADD_ITEM");
        assert_eq!(remove_item("p1").kind(), "REMOVE_ITEM");
        assert_eq!(update_quantity("p1", 3).kind(), "UPDATE_QUANTITY");
        assert_eq!(update_item(LineItem::new("p1", 1)).kind(), "UPDATE_ITEM");
        assert_eq!(clear_cart().kind(), "CLEAR_CART");
        assert_eq!(set_loading(true).kind(), "SET_LOADING");
    }

    #[test]
    fn test_parse_front_end_actions() {
        let intent: Intent = serde_json::from_value(json!({
            "type": "ADD_ITEM",
            "payload": { "productId": "p1", "quantity": 2, "name": "Banh Mi" }
        }))
        .unwrap();
        match intent {
            Intent::AddItem(item) => {
                assert_eq!(item.product_id.as_str(), "p1");
                assert_eq!(item.metadata.get("name"), Some(&json!("Banh Mi")));
            }
            other => panic!("expected AddItem, got {other:?}"),
        }

        // REMOVE_ITEM is dispatched with a whole line item in the front-end
        let intent: Intent = serde_json::from_value(json!({
            "type": "REMOVE_ITEM",
            "payload": { "productId": 17, "quantity": 4, "note": "x" }
        }))
        .unwrap();
        assert_eq!(intent, remove_item("17"));

        let intent: Intent = serde_json::from_value(json!({ "type": "CLEAR_CART" })).unwrap();
        assert_eq!(intent, clear_cart());

        let intent: Intent =
            serde_json::from_value(json!({ "type": "SET_LOADING", "payload": false })).unwrap();
        assert_eq!(intent, set_loading(false));
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let raw = json!({ "type": "APPLY_COUPON", "payload": { "code": "TET2025" } });
        let intent: Intent = serde_json::from_value(raw.clone()).unwrap();

        assert!(intent.is_unknown());
        assert_eq!(intent.kind(), "APPLY_COUPON");
        assert_eq!(serde_json::to_value(&intent).unwrap(), raw);
    }

    #[test]
    fn test_bad_payload_for_known_kind_is_an_error() {
        let result: Result<Intent, _> =
            serde_json::from_value(json!({ "type": "SET_LOADING", "payload": "yes" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_update_quantity() {
        let value = serde_json::to_value(update_quantity("p1", 0)).unwrap();
        assert_eq!(
            value,
            json!({ "type": "UPDATE_QUANTITY", "payload": { "productId": "p1", "quantity": 0 } })
        );
    }

    #[test]
    fn test_product_id_accessor() {
        assert_eq!(remove_item("p9").product_id().map(ProductId::as_str), Some("p9"));
        assert!(clear_cart().product_id().is_none());
    }
}
