//! Triview Model
//!
//! Typed entity model shared by every Triview component.
//!
//! # Overview
//!
//! - **Entity**: immutable snapshot of a requirement definition, requirement
//!   usage or dependency link, keyed by [`EntityId`]
//! - **EntityBody**: tagged variant over [`EntityKind`] carrying the kind's
//!   relations
//! - **Attributes**: typed attribute mapping with an extension map that keeps
//!   unknown attributes
//! - **PageRequest / Page**: the paging, sort, filter and search shape
//!   exchanged with a query service
//!
//! # Example
//!
//! ```rust
//! use triview_model::{Entity, EntityKind, RelationRole, Status};
//!
//! let def = Entity::definition("R-1").with_name("Braking distance").with_status(Status::Approved);
//! let usage = Entity::usage("U-1", "R-1");
//!
//! assert_eq!(def.kind(), EntityKind::Definition);
//! assert_eq!(usage.relation(RelationRole::Of).map(|id| id.as_str()), Some("R-1"));
//! ```

#![warn(missing_docs)]

pub mod entity;
pub mod error;
pub mod request;

// Re-exports
pub use entity::{Attributes, Entity, EntityBody, EntityId, EntityKind, RelationRole, Status};
pub use error::ModelError;
pub use request::{Direction, Filter, Page, PageRequest, SortSpec};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for model operations
    pub use crate::{
        Attributes, Direction, Entity, EntityBody, EntityId, EntityKind, Filter, ModelError, Page,
        PageRequest, RelationRole, SortSpec, Status,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
