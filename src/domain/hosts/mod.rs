//! Host domain - A small host directory used to exercise the memoizers

mod directory;
mod entity;

pub use directory::HostDirectory;
pub use entity::{HostInfo, HostRecord, HostReport};
