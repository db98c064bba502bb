//! Actor-based background lanes
//!
//! Mutating marker operations return as soon as their job is queued. The
//! work runs on long-lived tasks that own their receivers and communicate
//! only through channels.
//!
//! # Actors
//!
//! - [`MarkerActor`]: The single lane that runs fan-out and removal jobs in order
//! - [`NotifierActor`]: Chunks tag deltas and hands them to the push transport
//!
//! ```text
//! request ──MarkerHandle──▶ MarkerActor ──NotificationEmitter──▶ NotifierActor ──▶ sink
//!                               │
//!                               └──▶ tag store, counter cache invalidation
//! ```

pub mod handle;
pub mod message;

mod marker;
mod notifier;

pub use handle::{MarkerHandle, SendError};
pub use marker::MarkerActor;
pub use message::MarkerJob;
pub use notifier::NotifierActor;
