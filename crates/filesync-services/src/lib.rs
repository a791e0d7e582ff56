//! filesync-services — user accounts, per-user file storage, and caching.
//! Everything the protocol runtime treats as an external collaborator.

pub mod cache;
pub mod file;
pub mod fileparser;
pub mod user;

pub use cache::LruCache;
pub use file::{FileStore, FileStoreError, FileStoreFactory};
pub use user::{UserError, UserStore};
