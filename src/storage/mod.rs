//! Skill document storage and the keyword index.

pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod model;
pub mod sqlite;
mod store;

#[cfg(test)]
mod tests;

pub use error::{StorageError, StorageResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::InMemorySkillStore;
pub use model::{KeywordHit, SearchFilters, SkillDocument, query_terms};
pub use sqlite::{SqliteSkillStore, fts_query};
pub use store::{DocumentStore, KeywordIndex};
