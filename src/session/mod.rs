//! Server-side sessions keyed by a private cookie.
//!
//! [`with_sessions`] installs a layer that loads the [`Session`] for each
//! request from a [`SessionStore`] and writes it back after the handler runs.
//! Handlers and guards reach it through the [`Session`] extractor.

mod cookies;
mod data;
mod handle;
mod layer;
mod memory;
mod store;

pub use data::{PendingLogin, SessionData};
pub use handle::Session;
pub use layer::{SessionSettings, with_sessions};
pub use memory::MemoryStore;
pub use store::{SessionStore, StoreError};
