//! Typed error definitions for Bulwark.
//!
//! [`ErrorKind`] is the closed taxonomy every failure is mapped onto before
//! the retry executor decides what to do with it. [`ConfigError`] covers
//! configuration loading and validation.

mod config;
mod kind;

pub use config::ConfigError;
pub use kind::ErrorKind;
