//! Persistent result cache.
//!
//! A flat JSON document recording the last result of each tool call, plus a
//! few facts (such as the last known external IP) that later runs compare
//! against. It is loaded at startup and rewritten after every update.

mod store;

pub use store::{CacheEntry, CacheInfo, ResultCache, TRUNCATION_MARKER};
