//! Response memoization: key derivation plus a TTL/LRU bounded store.

pub mod key;
pub mod response_cache;

pub use key::CacheKey;
pub use response_cache::{
    CacheStats, CachedValue, EntryInfo, ResponseCache, NS_CHAT_RESPONSE, NS_VECTOR_SEARCH,
};
