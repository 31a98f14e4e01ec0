//! # idmirror cache
//!
//! The local, transactional mirror of users, groups and their membership
//! edges. Edges are never stored as entities of their own: each user or group
//! owns the set of names of its direct parent groups.
//!
//! - [`records`] - `UserRecord`, `GroupRecord`, `MemberType`
//! - [`store`] - `CacheStore` and `CacheTransaction` traits
//! - [`memory`] - `InMemoryCache`
//! - [`error`] - `CacheError`

pub mod error;
pub mod memory;
pub mod records;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCache;
pub use records::{GroupRecord, MemberType, UserRecord};
pub use store::{CacheRead, CacheStore, CacheTransaction};
