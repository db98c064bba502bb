pub mod actor;
pub mod cache;
pub mod notify;
pub mod store;

mod domain;
pub use domain::{config, entry, tag};

mod service;
pub use service::{
  marker::{FileMarker, ListedEntry, Listing, MarkTask, MarkerDeps, RootCount},
  util::MarkerError,
};

pub mod logging;

mod engine;
pub use engine::MarkerEngine;
