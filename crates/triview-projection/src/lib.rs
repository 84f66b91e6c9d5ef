//! Triview Projection
//!
//! Derives three read-only view models from the normalized store and the
//! current selection.
//!
//! # Overview
//!
//! - **TreeView**: usages grouped under the definition they reference, with
//!   dangling usages under a synthetic unassigned root and dependencies under
//!   a synthetic dependencies root
//! - **TableView**: one row per entity with a stable column set
//! - **GraphView**: one node per entity and one edge per relation reference,
//!   unresolved edges kept and flagged
//! - **ProjectionEngine**: memoizes all three on `(store version, selection
//!   revision)` and recomputes in proportion to what changed
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use triview_model::Entity;
//! use triview_projection::ProjectionEngine;
//! use triview_store::{NormalizedStore, SelectionCoordinator, SelectionMode};
//!
//! let store = Arc::new(NormalizedStore::new());
//! let selection = Arc::new(SelectionCoordinator::new(Arc::clone(&store)));
//! let engine = ProjectionEngine::new(Arc::clone(&store), Arc::clone(&selection));
//!
//! store.merge(vec![Entity::definition("R-1")]);
//! store.merge(vec![Entity::usage("U-1", "R-1")]);
//! selection.select("U-1", SelectionMode::Replace);
//!
//! let views = engine.views();
//! assert_eq!(views.tree.roots().len(), 1);
//! assert!(views.table.row("U-1").unwrap().selected);
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod graph;
pub mod table;
pub mod tree;

// Re-exports
pub use engine::{EntityComparator, Invalidation, ProjectionEngine, ProjectionSet, ProjectionStats};
pub use graph::{EdgeState, GraphEdge, GraphNode, GraphView};
pub use table::{TableColumn, TableRow, TableView};
pub use tree::{TreeKey, TreeNode, TreeView, DEPENDENCIES_LABEL, UNASSIGNED_LABEL};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for projection consumers
    pub use crate::{
        EdgeState, GraphEdge, GraphNode, GraphView, ProjectionEngine, ProjectionSet, TableColumn,
        TableRow, TableView, TreeKey, TreeNode, TreeView,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
