//! Synchronization layer between the chart panels and the site repository.
//! - `content`: the repository as a file store with conditional writes.
//! - `versions`: per-chart saved versions kept in step with that store.
//! - `csv`: publishing chart data files.
//! - `embed`: the iframe resize protocol and embed snippets.

pub mod errors;
pub mod credentials;
pub mod content;
pub mod storage;
pub mod versions;
pub mod retry;
pub mod csv;
pub mod embed;
pub mod observability;
pub mod runtime;

pub use errors::{ConflictKind, ServiceError};
