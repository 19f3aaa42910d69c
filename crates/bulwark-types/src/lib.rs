//! # Bulwark Types
//!
//! Core types, models, and error definitions for the Bulwark retry layer.
//!
//! - **`error`** - Error taxonomy shared by the executor and its collaborators
//! - **`models`** - Configuration and introspection models
//!
//! ## Architecture Role
//!
//! `bulwark-types` sits at the bottom of the dependency graph:
//!
//! ```text
//!            bulwark-types (this crate)
//!                    │
//!                    ▼
//!              bulwark-core
//!                    │
//!                    ▼
//!             bulwark-client
//! ```
//!
//! All types are serializable via serde so health tooling can expose them
//! as JSON without extra mapping.

pub mod error;
pub mod models;

pub use error::{ConfigError, ErrorKind};

pub use models::{
    BudgetStats, CircuitBreakerConfig, CircuitBreakerStats, CircuitBreakerSummary, CircuitState,
    EndpointOverride, PolicyDefaults, PolicyName, ResilienceConfig, RetryBudgetConfig,
};
