//! HTTP handlers. Each one is a thin translation onto [`rapid_core::SyncPort`].

pub mod entries;
pub mod events;
