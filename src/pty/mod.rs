//! PTY (Pseudo-Terminal) plumbing for the bridge process.
//!
//! This module opens a pseudoterminal, spawns the bridge process against it,
//! and exposes the bridge output through a deadline-aware [`ChunkReader`].

mod native;
mod reader;

pub use native::{
    spawn_bridge, BridgeCommand, BridgeProcess, ShellExit, SpawnedBridge, DEFAULT_BRIDGE,
};
pub use reader::{ChunkReader, Deadline, READ_CHUNK_SIZE};

#[cfg(test)]
pub(crate) use reader::tests::{ScriptedReader, StalledReader};
#[cfg(all(test, target_os = "linux"))]
pub(crate) use native::tests::reaped_within;

/// Size of a PTY in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    /// Number of rows (height).
    pub rows: u16,
    /// Number of columns (width).
    pub cols: u16,
}

impl PtySize {
    /// Create a new PtySize with the given dimensions.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self { rows, cols }
    }
}

impl Default for PtySize {
    /// Wide enough that echoed commands are not wrapped by the terminal.
    fn default() -> Self {
        Self { rows: 24, cols: 511 }
    }
}
