//! # Validation Module
//!
//! Input checks a UI layer can run before it builds an intent.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front-end form                                               │
//! │  ├── Basic format checks (empty, length)                               │
//! │  └── Immediate user feedback                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (optional, before dispatch)                      │
//! │  ├── Quantity limits, note length, cart size                           │
//! │  └── Returns ValidationError for the UI to show                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Reducer                                                      │
//! │  └── Accepts everything; invalid input degrades to a no-op/removal     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use basket_core::validation::{validate_line_item, validate_quantity};
//! use basket_core::LineItem;
//!
//! validate_quantity(5).unwrap();
//! validate_line_item(&LineItem::new("p1", 2)).unwrap();
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::{ValidationError, ValidationResult};
use crate::types::{CartState, LineItem, ProductId};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_NOTE_LENGTH};

/// Validates a product identifier.
///
/// ## Rules
/// - Must not be empty or whitespace
pub fn validate_product_id(product_id: &ProductId) -> ValidationResult<()> {
    if product_id.as_str().trim().is_empty() {
        return Err(ValidationError::required("productId"));
    }
    Ok(())
}

/// Validates a quantity the customer asked for.
///
/// ## Rules
/// - Must be positive (use RemoveItem or UpdateQuantity(0) to remove)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
///
/// ## Example
/// ```rust
/// use basket_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(-1).is_err());
/// assert!(validate_quantity(10_000).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates an optional note.
pub fn validate_note(note: Option<&str>) -> ValidationResult<()> {
    match note {
        Some(note) if note.chars().count() > MAX_NOTE_LENGTH => Err(ValidationError::TooLong {
            field: "note".to_string(),
            max: MAX_NOTE_LENGTH,
        }),
        _ => Ok(()),
    }
}

/// Validates a whole line item before AddItem/UpdateItem.
pub fn validate_line_item(item: &LineItem) -> ValidationResult<()> {
    validate_product_id(&item.product_id)?;
    validate_quantity(item.quantity)?;
    validate_note(item.note.as_deref())?;
    Ok(())
}

/// Validates that `item` can be added to `cart` without breaking limits.
///
/// ## Rules
/// - A new product needs a free line (at most [`MAX_CART_ITEMS`])
/// - The merged quantity must stay within [`MAX_ITEM_QUANTITY`]
pub fn validate_cart_size(cart: &CartState, item: &LineItem) -> ValidationResult<()> {
    match cart.find(&item.product_id) {
        Some(existing) => validate_quantity(existing.quantity.saturating_add(item.quantity)),
        None if cart.item_count() >= MAX_CART_ITEMS => {
            Err(ValidationError::CartFull { max: MAX_CART_ITEMS })
        }
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id(&"p1".into()).is_ok());
        assert!(validate_product_id(&"   ".into()).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(matches!(
            validate_quantity(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_quantity(MAX_ITEM_QUANTITY + 1),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_note() {
        assert!(validate_note(None).is_ok());
        assert!(validate_note(Some("")).is_ok());
        assert!(validate_note(Some(&"x".repeat(MAX_NOTE_LENGTH))).is_ok());
        assert!(validate_note(Some(&"x".repeat(MAX_NOTE_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_validate_line_item() {
        assert!(validate_line_item(&LineItem::new("p1", 2).with_note("ok")).is_ok());
        assert!(validate_line_item(&LineItem::new("", 2)).is_err());
        assert!(validate_line_item(&LineItem::new("p1", 0)).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        let mut cart = CartState::new();
        cart.items = (0..MAX_CART_ITEMS)
            .map(|i| LineItem::new(i.to_string(), 1))
            .collect();

        // Existing product still fits
        assert!(validate_cart_size(&cart, &LineItem::new("0", 5)).is_ok());
        // New product does not
        assert_eq!(
            validate_cart_size(&cart, &LineItem::new("new", 1)),
            Err(ValidationError::CartFull { max: MAX_CART_ITEMS })
        );
        // Merged quantity over the limit
        assert!(validate_cart_size(&cart, &LineItem::new("0", MAX_ITEM_QUANTITY)).is_err());
    }
}
