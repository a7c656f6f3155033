//! # basket-core: Pure Cart Logic for Basket
//!
//! This crate is the **heart** of Basket. It holds the shopping-cart state,
//! the intents that describe requested changes, and the transition function
//! that turns one into the other. Zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Front-end (cart badge, cart page, ...)       │   │
//! │  │        dispatch(Intent) ──────────────►  subscribe(state)       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    basket-store (CartStore)                     │   │
//! │  │     single writer, watch broadcast, background persister       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ basket-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  intent   │  │  reducer  │  │ validation│  │   │
//! │  │   │ LineItem  │  │  Intent   │  │ transition│  │   rules   │  │   │
//! │  │   │ CartState │  │  ctors    │  │  Outcome  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Cart state types (LineItem, CartState, CartPatch)
//! - [`intent`] - Intents and their constructors
//! - [`reducer`] - The pure transition function
//! - [`validation`] - Optional checks UI layers run before dispatching
//! - [`error`] - Validation error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: `transition` is deterministic and total
//! 2. **No Errors in the Reducer**: absent targets and unknown intents are no-ops
//! 3. **New Values, Never Edits**: every accepted intent yields a fresh `CartState`
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use basket_core::intent;
//! use basket_core::reducer::transition;
//! use basket_core::{CartState, LineItem};
//!
//! let state = Arc::new(CartState::new());
//! let state = transition(state, &intent::add_item(LineItem::new("p1", 2)));
//! let state = transition(state, &intent::add_item(LineItem::new("p1", 3).with_note("no chili")));
//!
//! let line = state.find(&"p1".into()).unwrap();
//! assert_eq!(line.quantity, 5);
//! assert_eq!(line.note.as_deref(), Some("no chili"));
//!
//! let state = transition(state, &intent::update_quantity("p1", 0));
//! assert!(state.is_empty());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod intent;
pub mod reducer;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::ValidationError;
pub use intent::Intent;
pub use reducer::{reduce, transition, Outcome};
pub use types::{CartPatch, CartState, LineItem, ProductId};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
///
/// Enforced by [`validation::validate_cart_size`] before dispatch. The reducer
/// itself never rejects an intent.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length (in characters) of a line note.
pub const MAX_NOTE_LENGTH: usize = 500;
