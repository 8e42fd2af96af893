//! Version manager
//!
//! Named snapshots of chart settings, one JSON store file per chart type in
//! the repository, plus a local cache for when the published copy cannot be
//! read.

pub mod model;
pub mod store;


pub use model::{StoreFile, VersionRecord};
pub use store::{ChartContext, LoadSource, SyncPhase, TracingObserver, VersionObserver, VersionOp, VersionStore};
