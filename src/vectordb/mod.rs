//! Vector similarity index.

pub mod client;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;


pub use client::{InMemoryVectorIndex, VectorIndex};
pub use error::VectorDbError;
#[cfg(any(test, feature = "mock"))]
pub use mock::FailingVectorIndex;
pub use model::{SearchResult, VectorPoint, embedding_bytes_to_f32, f32_to_embedding_bytes};
