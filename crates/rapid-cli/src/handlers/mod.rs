//! Command handlers.

pub mod download;
pub mod list;
pub mod serve;
