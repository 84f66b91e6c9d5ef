//! Triview Store
//!
//! The single source of truth every view derives from.
//!
//! # Overview
//!
//! - **NormalizedStore**: deduplicated entities keyed by id, a monotonic
//!   version, a bounded change log and change notification
//! - **SelectionCoordinator**: the one selection set shared by every view,
//!   pruned in the same step that removes its referents from the store
//! - **Subscribers**: listener registry with RAII [`Subscription`] handles
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use triview_model::Entity;
//! use triview_store::{NormalizedStore, SelectionCoordinator, SelectionMode};
//!
//! let store = Arc::new(NormalizedStore::new());
//! let selection = SelectionCoordinator::new(Arc::clone(&store));
//!
//! store.merge(vec![Entity::definition("R-1"), Entity::usage("U-1", "R-1")]);
//! selection.select("U-1", SelectionMode::Replace);
//!
//! store.remove(["U-1"]);
//! assert_eq!(selection.count(), 0);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod selection;
pub mod store;
pub mod subscribers;

// Re-exports
pub use config::StoreConfig;
pub use selection::{SelectionCoordinator, SelectionMode, SelectionSet};
pub use store::{Delta, MergeResult, NormalizedStore, RemoveResult, StoreEvent, StoreReadGuard};
pub use subscribers::{Subscribers, Subscription};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for store operations
    pub use crate::{
        Delta, MergeResult, NormalizedStore, RemoveResult, SelectionCoordinator, SelectionMode,
        SelectionSet, StoreConfig, StoreEvent, Subscription,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
