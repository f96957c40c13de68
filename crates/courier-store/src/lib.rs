//! # courier-store
//!
//! Durable storage for the logic tier, backed by SQLite.
//!
//! Holds sent messages, one receipt per intended recipient, group
//! membership, and the presence directory mapping each online user to the
//! gate node serving it. The crate exposes a synchronous [`Database`]
//! handle with typed helpers, and a thread-safe [`Store`] that implements
//! the [`MessageStore`] and [`PresenceDirectory`] seams the routing
//! service is written against.

pub mod database;
pub mod groups;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod presence;
pub mod receipts;
pub mod store;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use store::{MessageStore, PresenceDirectory, Store};
