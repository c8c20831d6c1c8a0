//! Terminal presentation: progress bars and tables.

pub mod progress;
pub mod tables;

pub use progress::{ChannelEmitter, ChunkBars};
pub use tables::format_entries;
