//! Shared utilities for the service layer.
//!
//! - `error` - Unified error type for marker operations

mod error;

pub use error::MarkerError;
