use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal conditions. Everything else in the pipeline is a per-item
/// failure carried in a report value, not an error return.
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("failed to open device {path:?}: {source}")]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no analyzable filesystem metadata: {0}")]
    NoMetadata(String),
}

/// Errors raised by a filesystem metadata provider.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("invalid superblock: {0}")]
    InvalidSuperblock(String),

    #[error("corrupted metadata: {0}")]
    CorruptedMetadata(String),

    #[error("read error: {0}")]
    ReadError(String),

    #[error("no file system detected")]
    NoFileSystem,
}
