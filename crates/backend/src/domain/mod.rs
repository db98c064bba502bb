//! Domain types - core business entities
//!
//! Entries, tags and configuration. These types are independent of how tags
//! are persisted or how notifications are delivered.

pub mod config;
pub mod entry;
pub mod tag;
