//! Shared routing record cache.
//!
//! Every routing decision starts here. Records live in a TTL key-value store
//! shared by all gateway instances, under two keys per domain:
//!
//! - `known:<host>`: `"true"` or `"false"`, whether the backend knows the
//!   domain. The `"false"` marker is what keeps repeated probes for
//!   nonexistent domains away from the backend.
//! - `mail:<host>`: the full routing record as JSON, only present for known
//!   domains.
//!
//! Both keys always carry the same TTL, so a record and its marker expire
//! together and the next lookup takes the backend path again.

mod cache;
pub mod keys;
mod memory;
mod redis_store;
mod store;

pub use cache::RoutingCache;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, StoreError};
