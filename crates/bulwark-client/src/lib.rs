//! # Bulwark Client
//!
//! A plain GraphQL-over-HTTP client that holds a
//! [`RetryExecutor`](bulwark_core::RetryExecutor) and runs every request
//! through it. Retry behavior comes from composition, not from a wrapper
//! type around the client.
//!
//! ```no_run
//! # async fn demo() -> Result<(), bulwark_client::ClientError> {
//! use bulwark_client::{ClientConfig, GraphqlClient};
//!
//! let client = GraphqlClient::with_defaults(ClientConfig::default())?;
//! let outcome = client.request("query Viewer { viewer { login } }", None).await;
//! println!("{} attempt(s), {}ms waiting", outcome.attempts, outcome.total_delay_ms);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod types;

pub use client::GraphqlClient;
pub use error::ClientError;
pub use types::*;
