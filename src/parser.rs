//! The directory parser: walks the variable- or fixed-stride directory
//! region and validates every field, without ever aborting on a
//! per-entry violation (see [`crate::EntryValidity`]).

use std::io::{Read, Seek, SeekFrom};

use crate::{
  directory::Directory,
  entry::{DirectoryEntry, EntryValidity},
  error::ArchiveError,
  format::ArchiveFormat,
  header::{read_header, HEADER_LEN},
};

/// Upper bound on how many bytes of a single name we scan for a NUL
/// terminator before giving up and treating the directory as desynced.
/// One more than the maximum legal name length (255) so a name of
/// exactly 255 bytes is still found.
const MAX_NAME_SCAN: usize = 256;

#[derive(Debug, Clone)]
pub struct ParseOptions {
  /// Soft ceiling on the declared entry count, checked before any
  /// per-entry allocation.
  pub max_entry_count: u32,
  /// `Some(stride)` parses every record as exactly `stride` bytes,
  /// ignoring filename length; `None` uses variable-stride records.
  pub fixed_entry_stride: Option<u32>,
  /// When set, every `Valid` entry's offset is additionally checked
  /// against this power-of-two alignment (invariant 5). The on-disk
  /// format does not declare an alignment itself, so this is opt-in.
  pub expected_payload_alignment: Option<u32>,
}

impl Default for ParseOptions {
  fn default() -> Self {
    Self {
      max_entry_count: crate::header::DEFAULT_MAX_ENTRY_COUNT,
      fixed_entry_stride: None,
      expected_payload_alignment: None,
    }
  }
}

struct Cursor64 {
  consumed: u64,
}

/// Parses an archive's header and directory into a [`Directory`].
///
/// This never fails on a structurally broken *entry* — those are
/// reported via [`crate::EntryValidity`] on the returned directory.
/// It fails only on header-level or I/O problems, per
/// [`ArchiveError`].
pub fn parse_directory<R: Read + Seek>(
  src: &mut R,
  options: &ParseOptions,
) -> Result<Directory, ArchiveError> {
  let (header, format) = read_header(src, options.max_entry_count)?;

  let file_size = src.seek(SeekFrom::End(0)).map_err(|e| ArchiveError::io("<archive>", e))?;
  src
    .seek(SeekFrom::Start(HEADER_LEN as u64))
    .map_err(|e| ArchiveError::io("<archive>", e))?;

  let first_payload_offset =
    if header.header_length >= HEADER_LEN as u32 { u64::from(header.header_length) } else { HEADER_LEN as u64 };

  let directory_budget = header.header_length.saturating_sub(HEADER_LEN as u32);

  let mut entries: Vec<DirectoryEntry> = Vec::with_capacity(header.entry_count as usize);
  let mut valid_ranges: Vec<(u64, u64, usize)> = Vec::new();
  let mut cursor = Cursor64 { consumed: 0 };
  let mut stopped_early = false;

  for _ in 0..header.entry_count {
    if u64::from(directory_budget) <= cursor.consumed {
      stopped_early = true;
      break;
    }

    let name_offset = cursor.consumed + 8;

    let mut prefix = [0u8; 8];
    if !read_fully(src, &mut prefix).map_err(|e| ArchiveError::io("<archive>", e))? {
      stopped_early = true;
      break;
    }
    let raw_offset: [u8; 4] = prefix[0..4].try_into().expect("4-byte slice");
    let raw_size: [u8; 4] = prefix[4..8].try_into().expect("4-byte slice");
    let offset = format.read_u32(raw_offset);
    let size = format.read_u32(raw_size);

    let (name, name_validity, record_len, desynced) = if let Some(stride) = options.fixed_entry_stride {
      read_fixed_stride_name(src, stride)
        .map_err(|e| ArchiveError::io("<archive>", e))?
    } else {
      read_variable_stride_name(src, file_size).map_err(|e| ArchiveError::io("<archive>", e))?
    };

    cursor.consumed += 8 + record_len as u64;

    let mut validity = name_validity;
    if validity.is_none() {
      validity = Some(classify_offset_size(
        offset,
        size,
        first_payload_offset,
        file_size,
        options.expected_payload_alignment,
      ));
    }
    let mut validity = validity.unwrap();

    if validity == EntryValidity::Valid {
      let start = u64::from(offset);
      let end = start + u64::from(size);
      if let Some(&(_, _, prev_idx)) = valid_ranges.iter().find(|&&(s, e, _)| start < e && s < end) {
        validity = EntryValidity::Overlaps(prev_idx);
      } else {
        valid_ranges.push((start, end, entries.len()));
      }
    }

    if !validity.is_valid() {
      log::warn!("entry {} ({:?}) failed validation: {:?}", entries.len(), String::from_utf8_lossy(&name), validity);
    }

    let filename_encoding = DirectoryEntry::classify_name(&name);
    let hex_name = DirectoryEntry::hex_escape(&name);
    entries.push(DirectoryEntry {
      offset,
      size,
      name,
      name_offset: name_offset as u32,
      validity,
      filename_encoding,
      hex_name,
    });

    if desynced {
      stopped_early = true;
      break;
    }
  }

  let parsed_non_missing = entries.len();
  for _ in parsed_non_missing..header.entry_count as usize {
    entries.push(DirectoryEntry {
      offset: 0,
      size: 0,
      name: Vec::new(),
      name_offset: cursor.consumed as u32,
      validity: EntryValidity::Missing,
      filename_encoding: crate::entry::FilenameEncoding::PrintableAscii,
      hex_name: String::new(),
    });
  }

  let declared_vs_parsed_count_mismatch = stopped_early || parsed_non_missing != header.entry_count as usize;

  let actual_header_length = HEADER_LEN as u64 + cursor.consumed;
  let header_length_mismatch = actual_header_length != u64::from(header.header_length);

  let computed_archive_size = valid_ranges
    .iter()
    .map(|&(_, end, _)| end)
    .max()
    .unwrap_or(u64::from(header.header_length));

  if header_length_mismatch {
    log::warn!(
      "header_length mismatch: header declares {}, directory walk consumed {}",
      header.header_length, actual_header_length
    );
  }

  Ok(Directory::new(
    format,
    header,
    entries,
    computed_archive_size,
    options.fixed_entry_stride,
    header_length_mismatch,
    declared_vs_parsed_count_mismatch,
  ))
}

/// Reads `buf.len()` bytes, returning `false` (rather than erroring) if
/// EOF is hit before the buffer is filled.
fn read_fully<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> std::io::Result<bool> {
  let mut filled = 0;
  while filled < buf.len() {
    let n = src.read(&mut buf[filled..])?;
    if n == 0 {
      return Ok(false);
    }
    filled += n;
  }
  Ok(true)
}

/// Reads a variable-stride name: bytes up to and including the NUL
/// terminator. Returns `(name_without_nul, validity_override, record_len_after_prefix, desynced)`.
///
/// `record_len_after_prefix` is `name.len() + 1` on success. `desynced`
/// is `true` when no terminator could be found before the file ended or
/// the scan bound was hit — the caller must stop parsing further
/// entries since the directory can no longer be resynchronized.
fn read_variable_stride_name<R: Read + ?Sized>(
  src: &mut R,
  _file_size: u64,
) -> std::io::Result<(Vec<u8>, Option<EntryValidity>, usize, bool)> {
  let mut name = Vec::new();
  let mut byte = [0u8; 1];
  loop {
    if name.len() >= MAX_NAME_SCAN {
      return Ok((Vec::new(), Some(EntryValidity::InvalidName), name.len(), true));
    }
    let n = src.read(&mut byte)?;
    if n == 0 {
      // Ran past the end of the archive before finding a terminator.
      return Ok((name, Some(EntryValidity::InvalidName), name.len(), true));
    }
    if byte[0] == 0 {
      break;
    }
    name.push(byte[0]);
  }
  let record_len = name.len() + 1;
  if name.is_empty() || name.len() > 255 {
    return Ok((name, Some(EntryValidity::InvalidName), record_len, false));
  }
  Ok((name, None, record_len, false))
}

/// Reads a fixed-stride record's name area (`stride - 8` bytes) and
/// finds the NUL terminator within it.
fn read_fixed_stride_name<R: Read + ?Sized>(
  src: &mut R,
  stride: u32,
) -> std::io::Result<(Vec<u8>, Option<EntryValidity>, usize, bool)> {
  let area_len = stride.saturating_sub(8) as usize;
  let mut area = vec![0u8; area_len];
  if !read_fully(src, &mut area)? {
    return Ok((Vec::new(), Some(EntryValidity::InvalidName), area_len, true));
  }
  let record_len = area_len;
  match area.iter().position(|&b| b == 0) {
    Some(0) => Ok((Vec::new(), Some(EntryValidity::InvalidName), record_len, false)),
    Some(nul_at) if nul_at <= 255 => Ok((area[..nul_at].to_vec(), None, record_len, false)),
    _ => Ok((Vec::new(), Some(EntryValidity::InvalidName), record_len, false)),
  }
}

fn classify_offset_size(
  offset: u32,
  size: u32,
  first_payload_offset: u64,
  file_size: u64,
  expected_alignment: Option<u32>,
) -> EntryValidity {
  let offset64 = u64::from(offset);
  if offset64 < first_payload_offset || offset64 >= file_size {
    return EntryValidity::InvalidOffset;
  }
  if offset64 + u64::from(size) > file_size {
    return EntryValidity::InvalidSize;
  }
  if let Some(alignment) = expected_alignment {
    if alignment > 1 && offset % alignment != 0 {
      return EntryValidity::InvalidOffset;
    }
  }
  EntryValidity::Valid
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;
  use crate::header::write_header;

  fn build_archive(format: ArchiveFormat, names: &[&str], payloads: &[&[u8]]) -> Vec<u8> {
    let directory_bytes: usize = names.iter().map(|n| 8 + n.len() + 1).sum();
    let header_length = 16 + directory_bytes;
    let mut offsets = Vec::new();
    let mut offset = header_length;
    for payload in payloads {
      offsets.push(offset);
      offset += payload.len();
    }
    let archive_size = offset;

    let mut buf = Vec::new();
    write_header(&mut buf, format, archive_size as u32, names.len() as u32, header_length as u32).unwrap();
    for (i, name) in names.iter().enumerate() {
      buf.extend_from_slice(&format.write_u32(offsets[i] as u32));
      buf.extend_from_slice(&format.write_u32(payloads[i].len() as u32));
      buf.extend_from_slice(name.as_bytes());
      buf.push(0);
    }
    for payload in payloads {
      buf.extend_from_slice(payload);
    }
    buf
  }

  #[test]
  fn parses_well_formed_archive() {
    let archive = build_archive(ArchiveFormat::BigF, &["LICENSE", "pyproject.toml"], &[&[1; 35149], &[2; 103]]);
    let dir = parse_directory(&mut Cursor::new(archive), &ParseOptions::default()).unwrap();
    assert_eq!(dir.header.entry_count, 2);
    assert_eq!(dir.header.header_length, 55);
    assert_eq!(dir.entries[0].offset, 55);
    assert_eq!(dir.entries[1].offset, 35204);
    assert_eq!(dir.header.archive_size, 35307);
    assert!(dir.entries.iter().all(|e| e.validity.is_valid()));
    assert_eq!(dir.validity(), crate::DirectoryValidity::Ok);
  }

  #[test]
  fn flags_oversized_entry_as_invalid_size() {
    let mut archive = build_archive(ArchiveFormat::BigF, &["a", "b"], &[&[1; 4], &[2; 4]]);
    // Corrupt entry 2's size to overrun the archive.
    let format = ArchiveFormat::BigF;
    let bad_size = format.write_u32(9999);
    // entry 2 record starts at 16 + (8+1+1) = 26; size field is at +4.
    let entry2_start = 16 + (8 + 1 + 1);
    archive[entry2_start + 4..entry2_start + 8].copy_from_slice(&bad_size);

    let dir = parse_directory(&mut Cursor::new(archive), &ParseOptions::default()).unwrap();
    assert!(dir.entries[0].validity.is_valid());
    assert_eq!(dir.entries[1].validity, EntryValidity::InvalidSize);
    assert_eq!(dir.validity(), crate::DirectoryValidity::ContainsInvalidEntries);
  }

  #[test]
  fn detects_overlap() {
    let mut archive = build_archive(ArchiveFormat::BigF, &["a", "b"], &[&[1; 8], &[2; 8]]);
    let format = ArchiveFormat::BigF;
    // Make entry 2's offset collide with entry 1's payload.
    let entry1_offset_field = 16;
    let entry1_offset_bytes = &archive[entry1_offset_field..entry1_offset_field + 4];
    let entry1_offset = format.read_u32(entry1_offset_bytes.try_into().unwrap());
    let entry2_start = 16 + (8 + 1 + 1);
    archive[entry2_start..entry2_start + 4].copy_from_slice(&format.write_u32(entry1_offset));

    let dir = parse_directory(&mut Cursor::new(archive), &ParseOptions::default()).unwrap();
    assert!(dir.entries[0].validity.is_valid());
    assert_eq!(dir.entries[1].validity, EntryValidity::Overlaps(0));
  }

  #[test]
  fn suspicious_count_rejected_before_allocation() {
    let mut buf = Vec::new();
    write_header(&mut buf, ArchiveFormat::BigF, 16, 1 << 31, 16).unwrap();
    let err = parse_directory(&mut Cursor::new(buf), &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, ArchiveError::SuspiciousCount { .. }));
  }

  #[test]
  fn truncated_archive_marks_missing_entries() {
    let mut archive = build_archive(ArchiveFormat::BigF, &["a", "b"], &[&[1; 4], &[2; 4]]);
    archive.truncate(20); // cut off mid-directory
    let dir = parse_directory(&mut Cursor::new(archive), &ParseOptions::default()).unwrap();
    assert_eq!(dir.entries.len(), 2);
    assert!(dir.entries.iter().any(|e| e.validity == EntryValidity::Missing));
    assert_eq!(dir.validity(), crate::DirectoryValidity::Truncated);
  }

  #[test]
  fn fixed_stride_round_trips() {
    let stride = 40u32;
    let mut buf = Vec::new();
    let format = ArchiveFormat::BigF;
    let header_length = 16 + 2 * stride;
    write_header(&mut buf, format, header_length + 8, 2, header_length).unwrap();
    for (name, payload_off) in [("a.txt", header_length), ("b.txt", header_length + 4)] {
      let mut record = vec![0u8; stride as usize];
      record[0..4].copy_from_slice(&format.write_u32(payload_off));
      record[4..8].copy_from_slice(&format.write_u32(4));
      record[8..8 + name.len()].copy_from_slice(name.as_bytes());
      buf.extend_from_slice(&record);
    }
    buf.extend_from_slice(&[1; 4]);
    buf.extend_from_slice(&[2; 4]);

    let options = ParseOptions { fixed_entry_stride: Some(stride), ..ParseOptions::default() };
    let dir = parse_directory(&mut Cursor::new(buf), &options).unwrap();
    assert_eq!(dir.entries.len(), 2);
    assert_eq!(dir.entries[0].name, b"a.txt");
    assert!(dir.entries[0].validity.is_valid());
    assert!(dir.entries[1].validity.is_valid());
  }
}
