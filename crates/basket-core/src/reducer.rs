//! # Reducer
//!
//! The pure transition function: `(state, intent) -> state'`.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Intent              Target present          Target absent              │
//! │  ─────────────────   ─────────────────────   ────────────────────────   │
//! │  AddItem             qty += n, note if set   append (if n > 0)          │
//! │  RemoveItem          drop line               no-op                      │
//! │  UpdateQuantity n>0  qty = n                 no-op                      │
//! │  UpdateQuantity n<=0 drop line               no-op                      │
//! │  UpdateItem          replace line            no-op                      │
//! │                                                                         │
//! │  Initialize          merge patch, is_initialized = true, loading = false│
//! │  ClearCart           items = [], flags untouched                        │
//! │  SetLoading          is_loading = flag, items untouched                 │
//! │  Unknown             no-op                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The function is total: there is no error path. A merge or update that
//! would leave a quantity `<= 0` removes the line instead, so every resting
//! line is positive and unique by product.

use std::sync::Arc;

use crate::intent::Intent;
use crate::types::{CartPatch, CartState, LineItem, ProductId};

/// Result of applying one intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The intent did not change anything; keep the current value.
    Unchanged,
    /// The complete next state.
    Next(CartState),
}

impl Outcome {
    /// Returns true if the intent produced a new state.
    pub fn is_changed(&self) -> bool {
        matches!(self, Outcome::Next(_))
    }
}

/// Computes the effect of `intent` on `state`.
pub fn reduce(state: &CartState, intent: &Intent) -> Outcome {
    match intent {
        Intent::Initialize(patch) => Outcome::Next(initialize(state, patch)),
        Intent::AddItem(item) => add_item(state, item),
        Intent::RemoveItem { product_id } => remove_item(state, product_id),
        Intent::UpdateQuantity {
            product_id,
            quantity,
        } => {
            if *quantity <= 0 {
                remove_item(state, product_id)
            } else {
                update_quantity(state, product_id, *quantity)
            }
        }
        Intent::UpdateItem(item) => update_item(state, item),
        Intent::ClearCart => {
            if state.items.is_empty() {
                Outcome::Unchanged
            } else {
                Outcome::Next(CartState {
                    items: Vec::new(),
                    is_loading: state.is_loading,
                    is_initialized: state.is_initialized,
                })
            }
        }
        Intent::SetLoading(flag) => {
            if state.is_loading == *flag {
                Outcome::Unchanged
            } else {
                Outcome::Next(CartState {
                    is_loading: *flag,
                    ..state.clone()
                })
            }
        }
        Intent::Unknown { .. } => Outcome::Unchanged,
    }
}

/// Applies `intent` to a shared state value.
///
/// No-ops hand back the same allocation, so callers can detect them with
/// [`Arc::ptr_eq`] and skip broadcasting.
pub fn transition(state: Arc<CartState>, intent: &Intent) -> Arc<CartState> {
    match reduce(&state, intent) {
        Outcome::Unchanged => state,
        Outcome::Next(next) => Arc::new(next),
    }
}

// =============================================================================
// Intent Handlers
// =============================================================================

fn initialize(state: &CartState, patch: &CartPatch) -> CartState {
    let items = match &patch.items {
        // Hydrated data is normalised through the same merge as AddItem
        Some(items) => items.iter().fold(Vec::with_capacity(items.len()), |mut acc, item| {
            merge_line(&mut acc, item);
            acc
        }),
        None => state.items.clone(),
    };

    CartState {
        items,
        is_loading: false,
        is_initialized: true,
    }
}

fn add_item(state: &CartState, item: &LineItem) -> Outcome {
    let mut items = state.items.clone();
    if merge_line(&mut items, item) {
        Outcome::Next(CartState {
            items,
            ..without_items(state)
        })
    } else {
        Outcome::Unchanged
    }
}

fn remove_item(state: &CartState, product_id: &ProductId) -> Outcome {
    if !state.contains(product_id) {
        return Outcome::Unchanged;
    }

    let items = state
        .items
        .iter()
        .filter(|item| &item.product_id != product_id)
        .cloned()
        .collect();

    Outcome::Next(CartState {
        items,
        ..without_items(state)
    })
}

fn update_quantity(state: &CartState, product_id: &ProductId, quantity: i64) -> Outcome {
    match state.find(product_id) {
        Some(line) if line.quantity != quantity => {}
        _ => return Outcome::Unchanged,
    }

    let items = state
        .items
        .iter()
        .map(|item| {
            if &item.product_id == product_id {
                LineItem {
                    quantity,
                    ..item.clone()
                }
            } else {
                item.clone()
            }
        })
        .collect();

    Outcome::Next(CartState {
        items,
        ..without_items(state)
    })
}

fn update_item(state: &CartState, replacement: &LineItem) -> Outcome {
    if !state.contains(&replacement.product_id) {
        return Outcome::Unchanged;
    }

    if replacement.quantity <= 0 {
        return remove_item(state, &replacement.product_id);
    }

    let items = state
        .items
        .iter()
        .map(|item| {
            if item.product_id == replacement.product_id {
                replacement.clone()
            } else {
                item.clone()
            }
        })
        .collect();

    Outcome::Next(CartState {
        items,
        ..without_items(state)
    })
}

// =============================================================================
// Helpers
// =============================================================================

/// Merges `incoming` into `items` with AddItem semantics.
///
/// Returns true if `items` changed.
fn merge_line(items: &mut Vec<LineItem>, incoming: &LineItem) -> bool {
    let Some(index) = items
        .iter()
        .position(|item| item.product_id == incoming.product_id)
    else {
        if incoming.quantity <= 0 {
            return false;
        }
        items.push(incoming.clone());
        return true;
    };

    let existing = &mut items[index];
    let quantity = existing.quantity.saturating_add(incoming.quantity);

    if quantity <= 0 {
        items.remove(index);
        return true;
    }

    let mut changed = quantity != existing.quantity;
    existing.quantity = quantity;

    // A blank incoming note never erases a recorded one
    if incoming.has_note() && existing.note != incoming.note {
        existing.note = incoming.note.clone();
        changed = true;
    }

    changed
}

/// Copies the lifecycle flags with an empty item list.
fn without_items(state: &CartState) -> CartState {
    CartState {
        items: Vec::new(),
        is_loading: state.is_loading,
        is_initialized: state.is_initialized,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
