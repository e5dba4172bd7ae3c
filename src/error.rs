//! Operation-level errors.
//!
//! Per-entry parse diagnostics never reach this enum; they stay tagged on
//! the [`crate::DirectoryEntry`] itself (see [`crate::EntryValidity`]).
//! Only failures that abort the whole operation come through here.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
  #[error("I/O error on {path:?}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("unrecognized magic bytes {magic:02x?}, expected BIGF, BIGH or BIG4")]
  InvalidMagic { magic: [u8; 4] },

  #[error("archive too short: expected at least 16 header bytes, got {got}")]
  ShortRead { got: usize },

  #[error("declared entry count {count} exceeds the soft ceiling of {ceiling}")]
  SuspiciousCount { count: u32, ceiling: u32 },

  #[error("index {index} out of range: archive has {count} entries")]
  IndexOutOfRange { index: u32, count: u32 },

  #[error("no entry named {name:?} in this archive")]
  NotFound { name: String },

  #[error("filename {name:?} ({len} bytes incl. NUL) exceeds the 255-byte limit")]
  FilenameTooLong { name: String, len: usize },

  #[error("fixed entry stride {stride} is too small to hold the longest name ({required} bytes required)")]
  StrideTooSmall { stride: u32, required: u32 },

  #[error("could not open output {path:?}: {source}")]
  OutputOpenFailed {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("entry {index} is not valid and cannot be updated ({validity:?})")]
  InvalidEntryForUpdate { index: u32, validity: crate::EntryValidity },
}

impl ArchiveError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    ArchiveError::Io { path: path.into(), source }
  }
}
