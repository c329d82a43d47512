//! Background maintenance for the tiered cache.

mod pruner;


pub use pruner::CachePruner;
