//! L2 durable cache tier.
//!
//! Stores flattened [`L2Record`]s keyed by cache key with secondary indexes on expiry and tier.
//! The tier knows nothing about the payload type; decoding happens in [`crate::cache::CacheEntry`].

pub mod backend;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod sqlite;
pub mod types;


pub use backend::L2Backend;
pub use error::{L2CacheError, L2CacheResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::InMemoryL2Store;
pub use sqlite::{L2_TABLE_NAME, SqliteL2Store};
pub use types::L2Record;
