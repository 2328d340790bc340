// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host error type.

use stagecraft_sequencer::RepositoryError;

/// Error that stops the host
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Reading or writing a file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A RON document could not be parsed or written
    #[error("RON error: {0}")]
    Ron(String),

    /// Config written by a newer host
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this host reads
        supported: u32,
    },

    /// Repository failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A config value is out of range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Nothing to play
    #[error("No timeline to play: {0}")]
    NoTimeline(String),
}
