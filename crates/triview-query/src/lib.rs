//! Triview Query
//!
//! Loads paged entity batches from a query service into the normalized
//! store.
//!
//! # Overview
//!
//! - **QueryService**: the abstract paged source; transports live elsewhere
//! - **ErrorRecoveryPolicy**: classifies failures into network, validation,
//!   server and auth, and decides retry-after or surface
//! - **RetryingService**: decorator applying the policy around any service
//! - **QueryCoordinator**: resolves load parameters, tracks query epochs and
//!   merges successful pages; failed or abandoned loads never touch the store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use triview_query::{LoadParams, QueryCoordinator, RetryingService, ErrorRecoveryPolicy};
//! use triview_store::NormalizedStore;
//!
//! let store = Arc::new(NormalizedStore::new());
//! let service = RetryingService::new(http_service, ErrorRecoveryPolicy::default());
//! let queries = QueryCoordinator::new(Arc::new(service), Arc::clone(&store));
//!
//! let page = queries.load_page(LoadParams::new().with_size(25)).await?;
//! println!("{} of {}", page.received, page.total_elements);
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod policy;
pub mod retry;
pub mod service;

// Re-exports
pub use config::{QueryConfig, RetryConfig};
pub use coordinator::{LoadParams, PageResult, QueryCoordinator, QueryState};
pub use error::{ErrorKind, QueryError, Result};
pub use policy::{ErrorRecoveryPolicy, RecoveryDecision};
pub use retry::RetryingService;
pub use service::{QueryService, ServiceError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for query operations
    pub use crate::{
        ErrorKind, ErrorRecoveryPolicy, LoadParams, PageResult, QueryConfig, QueryCoordinator,
        QueryError, QueryService, RecoveryDecision, RetryConfig, RetryingService, ServiceError,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
