//! Transformation system: turns ordered rollup logs into entity records.
//!
//! This module provides:
//! - Deterministic entity ids
//! - A per-batch context owning one read-through cache per entity kind
//! - Handler traits and a registry keyed by classified event kind
//! - A dispatcher that applies logs strictly in order
//! - An engine that drives batches from a log source into the store
//!
//! # Architecture
//!
//! ```text
//! LogSource ──► IndexingEngine ──► Dispatcher ──► Handlers ──► BatchContext ──► EntityStore
//!                                      │                          │
//!                                      └─ EventKind::classify     ├─ EntityCache per kind
//!                                                                 └─ TokenMetadataSource
//! ```

pub mod cache;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod event;
pub mod id;
pub mod registry;
pub mod traits;
pub mod util;

pub use context::EntityChanges;
pub use engine::IndexingEngine;
pub use registry::{build_registry, TransformationRegistry};
