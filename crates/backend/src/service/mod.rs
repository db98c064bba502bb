//! Business logic services.
//!
//! ## Available Services
//!
//! - [`marker`] - Unseen marks and counters: fan-out, removal, listing repair, badges

pub mod marker;
pub mod util;

#[cfg(test)]
mod __tests__;
