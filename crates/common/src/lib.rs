//! Shared building blocks for the grafer workspace.
//!
//! Everything here is free of network and storage concerns: text transport
//! encoding, slug derivation, logging setup and a few response types.

pub mod types;
pub mod utils;
pub mod env;
pub mod encoding;
pub mod slug;
