//! # Repository Module
//!
//! Database repository implementations for Basket.
//!
//! The store never writes SQL itself; it goes through a repository so the
//! table layout stays in one place.
//!
//! ## Available Repositories
//!
//! - [`SnapshotRepository`](snapshot::SnapshotRepository) - Opaque key-value cart snapshots

pub mod snapshot;
