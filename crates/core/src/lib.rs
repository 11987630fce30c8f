//! Campus session model and credential storage
//!
//! Holds the per-role credential records the API client attaches to requests,
//! the storage backends they live in, and the navigator used after a forced
//! logout.

pub mod error;
pub mod navigator;
pub mod role;
pub mod session;
pub mod sessions;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use navigator::{Navigator, RecordingNavigator};
pub use role::{RequestContext, Role, UnknownRole};
pub use session::{BlockNotice, SessionCredential, keys};
pub use sessions::{Sessions, StoredCredential};
pub use store::{FileStore, MemoryStore, SessionStore};
