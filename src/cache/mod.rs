// Cache module.
// Kind-namespaced keys, the TTL store contract, and in-memory and filesystem stores.

pub mod file;
pub mod key;
pub mod store;

pub use file::{FileStore, default_cache_dir};
pub use key::CacheKey;
pub use store::{CacheEntry, CacheStore, DEFAULT_TTL, MemoryStore};
