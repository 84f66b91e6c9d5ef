//! Triview Core
//!
//! Wires a normalized store, its selection, the tree/table/graph projections
//! and the query coordinator into one [`Workspace`], configured from one
//! [`TriviewConfig`].
//!
//! # Data flow
//!
//! ```text
//! QueryCoordinator ──merge──▶ NormalizedStore ──read──▶ ProjectionEngine ──▶ views
//!                                  │   ▲                      ▲
//!                          prune   ▼   │ validate             │ mark selected
//!                             SelectionCoordinator ───────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use triview_core::{TriviewConfig, Workspace};
//! use triview_model::Entity;
//! use triview_store::SelectionMode;
//! use triview_test_utils::InMemoryQueryService;
//!
//! let service = Arc::new(InMemoryQueryService::new(Vec::new()));
//! let workspace = Workspace::new(service, TriviewConfig::default()).unwrap();
//!
//! workspace.queries().apply_upserts(vec![Entity::definition("R-1"), Entity::usage("U-1", "R-1")]);
//! workspace.select("U-1", SelectionMode::Replace);
//!
//! let views = workspace.views();
//! assert!(views.graph.node("U-1").unwrap().selected);
//! assert!(!views.table.row("R-1").unwrap().selected);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod workspace;

// Re-exports
pub use config::{ConfigError, TriviewConfig};
pub use workspace::{Workspace, WorkspaceBuilder};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for workspace consumers
    pub use crate::{ConfigError, TriviewConfig, Workspace, WorkspaceBuilder};
    pub use triview_model::prelude::*;
    pub use triview_projection::prelude::*;
    pub use triview_query::prelude::*;
    pub use triview_store::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
