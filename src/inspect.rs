//! Dry-run inspection: reports on an archive's directory without
//! writing anything back out.

use std::{fs::File, path::Path};

use crate::{
  directory::{Directory, DirectoryValidity},
  error::ArchiveError,
  format::ArchiveFormat,
  parser::{parse_directory, ParseOptions},
};

/// A human-oriented summary of a parsed directory, as reported by the
/// CLI's info command.
#[derive(Debug, Clone)]
pub struct DirectorySummary {
  pub format: ArchiveFormat,
  pub entry_count: usize,
  pub valid_count: usize,
  pub invalid_count: usize,
  pub missing_count: usize,
  pub declared_archive_size: u64,
  pub computed_archive_size: u64,
  pub header_length: u32,
  pub validity: DirectoryValidity,
}

impl DirectorySummary {
  #[must_use]
  pub fn from_directory(directory: &Directory) -> Self {
    let missing_count = directory
      .entries
      .iter()
      .filter(|e| e.validity == crate::EntryValidity::Missing)
      .count();
    let valid_count = directory.valid_count();
    Self {
      format: directory.format,
      entry_count: directory.len(),
      valid_count,
      invalid_count: directory.len() - valid_count - missing_count,
      missing_count,
      declared_archive_size: u64::from(directory.header.archive_size),
      computed_archive_size: directory.computed_archive_size,
      header_length: directory.header.header_length,
      validity: directory.validity(),
    }
  }
}

/// Parses `archive_path`'s directory and summarizes it, without
/// extracting anything.
pub fn get_info(archive_path: &Path, options: &ParseOptions) -> Result<(Directory, DirectorySummary), ArchiveError> {
  let mut file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
  let directory = parse_directory(&mut file, options)?;
  let summary = DirectorySummary::from_directory(&directory);
  Ok((directory, summary))
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;
  use crate::encode::{encode, EncodeInput, EncodeOptions};

  #[test]
  fn summarizes_well_formed_archive() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("a.dat");
    std::fs::write(&input_path, vec![7u8; 64]).unwrap();
    let archive_path = dir.path().join("archive.viv");
    encode(
      &[EncodeInput { name: "a.dat".to_string(), source_path: input_path }],
      &archive_path,
      &EncodeOptions::default(),
    )
    .unwrap();

    let (directory, summary) = get_info(&archive_path, &ParseOptions::default()).unwrap();
    assert_eq!(summary.entry_count, 1);
    assert_eq!(summary.valid_count, 1);
    assert_eq!(summary.invalid_count, 0);
    assert_eq!(summary.missing_count, 0);
    assert_eq!(summary.validity, DirectoryValidity::Ok);
    assert_eq!(summary.computed_archive_size, directory.computed_archive_size);
  }

  #[test]
  fn reports_missing_entries_for_truncated_archive() {
    let dir = tempdir().unwrap();
    let archive_path = dir.path().join("truncated.viv");
    std::fs::write(&archive_path, [0u8; 20]).unwrap();
    // Patch in a BIGF header declaring two entries over a too-short file.
    let mut bytes = std::fs::read(&archive_path).unwrap();
    bytes[0..4].copy_from_slice(b"BIGF");
    bytes[8..12].copy_from_slice(&2u32.to_be_bytes());
    bytes[12..16].copy_from_slice(&96u32.to_be_bytes());
    std::fs::write(&archive_path, &bytes).unwrap();

    let (_directory, summary) = get_info(&archive_path, &ParseOptions::default()).unwrap();
    assert_eq!(summary.missing_count, 2);
    assert_eq!(summary.validity, DirectoryValidity::Truncated);
  }
}
