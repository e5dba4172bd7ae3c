//! In-memory directory model, produced by the parser or the encoder and
//! consumed read-only by the extractor, inspector and updater.

use hashbrown::HashMap;

use crate::{entry::DirectoryEntry, format::ArchiveFormat, header::Header};

/// Directory-wide validity, computed from the entries it contains.
///
/// Ordered most-to-least severe when more than one condition holds:
/// `Truncated` wins over `HeaderMismatch`, which wins over
/// `ContainsInvalidEntries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryValidity {
  Ok,
  /// Parsed `header_length` disagrees with the recomputed value, or the
  /// declared entry count disagrees with how many were actually parsed.
  HeaderMismatch,
  /// At least one entry failed a structural check (but none are
  /// `Missing` — the directory region and file were both intact).
  ContainsInvalidEntries,
  /// The directory or file ended before every declared entry could be
  /// read; the directory contains `Missing` placeholders.
  Truncated,
}

/// The parsed (or encoder-built) directory: header fields, entries, and
/// the summary data needed to report on the archive without rescanning
/// the entry vector.
#[derive(Debug, Clone)]
pub struct Directory {
  pub format: ArchiveFormat,
  pub header: Header,
  pub entries: Vec<DirectoryEntry>,
  /// Archive size computed from the extent of the valid payloads
  /// (`max(offset + size)`), falling back to `header_length` when there
  /// are no valid entries.
  pub computed_archive_size: u64,
  /// The fixed entry stride the directory was parsed (or encoded) with,
  /// if any.
  pub fixed_entry_stride: Option<u32>,
  /// `true` when the recomputed `header_length` disagrees with the
  /// value declared in the header.
  pub header_length_mismatch: bool,
  /// `true` when fewer entries were actually parsed than the header
  /// declared.
  pub declared_vs_parsed_count_mismatch: bool,
  name_index: HashMap<Vec<u8>, usize>,
}

impl Directory {
  pub(crate) fn new(
    format: ArchiveFormat,
    header: Header,
    entries: Vec<DirectoryEntry>,
    computed_archive_size: u64,
    fixed_entry_stride: Option<u32>,
    header_length_mismatch: bool,
    declared_vs_parsed_count_mismatch: bool,
  ) -> Self {
    let mut name_index = HashMap::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
      name_index.entry(entry.name.clone()).or_insert(idx);
    }
    Self {
      format,
      header,
      entries,
      computed_archive_size,
      fixed_entry_stride,
      header_length_mismatch,
      declared_vs_parsed_count_mismatch,
      name_index,
    }
  }

  /// Number of entries, `Missing` placeholders included.
  #[must_use]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[must_use]
  pub fn valid_count(&self) -> usize {
    self.entries.iter().filter(|e| e.validity.is_valid()).count()
  }

  /// Index (0-based) of the first entry whose stored name matches
  /// `name` byte-for-byte, regardless of validity.
  #[must_use]
  pub fn index_of_name(&self, name: &[u8]) -> Option<usize> {
    self.name_index.get(name).copied()
  }

  #[must_use]
  pub fn validity(&self) -> DirectoryValidity {
    if self.entries.iter().any(|e| e.validity == crate::EntryValidity::Missing) {
      DirectoryValidity::Truncated
    } else if self.header_length_mismatch || self.declared_vs_parsed_count_mismatch {
      DirectoryValidity::HeaderMismatch
    } else if self.entries.iter().any(|e| !e.validity.is_valid()) {
      DirectoryValidity::ContainsInvalidEntries
    } else {
      DirectoryValidity::Ok
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::{EntryValidity, FilenameEncoding};

  fn entry(name: &str, validity: EntryValidity) -> DirectoryEntry {
    DirectoryEntry {
      offset: 16,
      size: 4,
      name: name.as_bytes().to_vec(),
      name_offset: 8,
      validity,
      filename_encoding: FilenameEncoding::PrintableAscii,
      hex_name: DirectoryEntry::hex_escape(name.as_bytes()),
    }
  }

  #[test]
  fn name_index_keeps_first_match() {
    let entries = vec![
      entry("a.txt", EntryValidity::Valid),
      entry("a.txt", EntryValidity::Valid),
    ];
    let dir = Directory::new(
      ArchiveFormat::BigF,
      Header { archive_size: 20, entry_count: 2, header_length: 16 },
      entries,
      20,
      None,
      false,
      false,
    );
    assert_eq!(dir.index_of_name(b"a.txt"), Some(0));
  }

  #[test]
  fn validity_precedence() {
    let entries = vec![entry("a.txt", EntryValidity::Missing)];
    let dir = Directory::new(
      ArchiveFormat::BigF,
      Header { archive_size: 20, entry_count: 1, header_length: 16 },
      entries,
      20,
      None,
      true,
      true,
    );
    assert_eq!(dir.validity(), DirectoryValidity::Truncated);
  }
}
