//! Local persistence
//!
//! File-backed JSON maps standing in for browser local storage: the per-chart
//! version cache and the persisted access token.

pub mod json_map_store;
pub mod version_cache;
pub mod token_store;

pub use json_map_store::JsonMapStore;
pub use token_store::TokenStore;
pub use version_cache::VersionCache;
