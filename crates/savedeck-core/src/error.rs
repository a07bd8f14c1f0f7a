//! Errors that can occur while reading, writing, or managing save slots.

use std::io;
use std::path::{Path, PathBuf};

use savedeck_logic::fields::FieldError;
use savedeck_logic::flag::FlagError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} is not valid save metadata: {source}", .path.display())]
    Meta {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}: {source}", .path.display())]
    Flags {
        path: PathBuf,
        #[source]
        source: FlagError,
    },
    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
    #[error("Snapshot version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("save root {} does not exist or is not a directory", .0.display())]
    MissingAnchor(PathBuf),
    #[error("no save slot named `{0}`")]
    SlotNotFound(String),
    #[error("save slot `{0}` already exists")]
    SlotExists(String),
    #[error("invalid slot name `{0}`")]
    InvalidSlotName(String),
    #[error("invalid flag path `{0}`: expected `flag` or `flag.field`")]
    InvalidFlagPath(String),
    #[error("config {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error(transparent)]
    Flag(#[from] FlagError),
}

pub type Result<T, E = SaveError> = std::result::Result<T, E>;

/// Attach a path to an IO error: `fs::read(p).map_err(io_at(p))?`.
pub(crate) fn io_at(path: &Path) -> impl FnOnce(io::Error) -> SaveError + '_ {
    move |source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    }
}
