//! Filename-to-filesystem mapping policy.
//!
//! The extractor enforces path safety independently of the parser's
//! [`crate::FilenameEncoding`] classification: a `Utf8`-classified name
//! can still spell a traversal attempt, so the check below runs on every
//! entry regardless of how its bytes were classified.

use relative_path::{Component, RelativePath};
use thiserror::Error;

use crate::entry::{DirectoryEntry, FilenameEncoding};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsafe filename {name:?}: contains a path separator or a parent-directory component")]
pub struct UnsafeNameError {
  pub name: String,
}

/// Validates that a stored filename maps to a single, same-directory
/// path component — no separators, no `.` or `..` components.
///
/// This is deliberately stricter than "no traversal": this format is
/// not expected to reconstruct subdirectories on extraction, so any
/// `/` or `\` in the stored name is rejected outright, the same as a
/// literal `..`.
pub fn check_safe(name: &str) -> Result<(), UnsafeNameError> {
  if name.contains('\\') {
    return Err(UnsafeNameError { name: name.to_string() });
  }
  let rel = RelativePath::new(name);
  let mut components = rel.components();
  match components.next() {
    Some(Component::Normal(_)) => {},
    _ => return Err(UnsafeNameError { name: name.to_string() }),
  }
  if components.next().is_some() {
    return Err(UnsafeNameError { name: name.to_string() });
  }
  Ok(())
}

/// Computes the on-disk output filename for an extracted entry.
///
/// Uses the stored name verbatim when it classifies as `Utf8` or
/// `PrintableAscii` (decoded lossily for `Binary`-adjacent-but-valid
/// UTF-8 is not reachable here since that case is `Utf8`); otherwise
/// falls back to the entry's hex-escaped rendering, either because the
/// bytes aren't valid UTF-8 or because the caller asked for hex names
/// unconditionally via `force_hex`.
#[must_use]
pub fn output_name(entry: &DirectoryEntry, force_hex: bool) -> String {
  if force_hex || entry.filename_encoding == FilenameEncoding::Binary {
    entry.hex_name.clone()
  } else {
    entry.name_lossy().into_owned()
  }
}
