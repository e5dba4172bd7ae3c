//! In-place entry replacement.
//!
//! A replacement payload rarely has the same size as the entry it
//! replaces, so the updater doesn't just overwrite one payload range:
//! it recomputes the directory the same way the encoder would —
//! sequential offsets in entry order, one new size (and, if requested,
//! one new name) substituted at the target index — then streams every
//! entry's payload (the target's from `new_payload_path`, everyone
//! else's from the original archive) into a fresh temporary file. That
//! temporary is only renamed over the original once it is fully
//! written, so a crash mid-update never leaves a half-written archive
//! in place.

use std::{
  fs::File,
  io::{Seek, SeekFrom},
  path::Path,
};

use tempfile::NamedTempFile;

use crate::{
  encode::write_directory_record_raw,
  error::ArchiveError,
  extract::{resolve_selector, Selector},
  header::{write_header, HEADER_LEN},
  io_util::copy_exact,
  parser::{parse_directory, ParseOptions},
};

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
  pub parse: ParseOptions,
  /// When `true`, the target entry's stored name is replaced with
  /// `new_payload_path`'s file name; when `false` (the default), the
  /// existing name is kept and only the payload changes.
  pub replace_filename: bool,
}

/// Replaces the payload of the entry matched by `selector` with the
/// contents of `new_payload_path`, rewriting `archive_path` in place.
///
/// Fails with [`ArchiveError::InvalidEntryForUpdate`] if the matched
/// entry is not [`crate::EntryValidity::Valid`] — its offset and size
/// cannot be trusted enough to build a rewrite around. A
/// [`Selector::ByName`] that matches nothing fails with
/// [`ArchiveError::NotFound`] (unlike extraction, there is no
/// "zero-updated" soft outcome: an update always names exactly one
/// entry). The archive's format variant and fixed entry stride (if
/// any) are preserved as-is; `update` never converts between variants
/// or changes a variable-stride archive to a fixed-stride one.
pub fn update(
  archive_path: &Path,
  selector: &Selector,
  new_payload_path: &Path,
  options: &UpdateOptions,
) -> Result<(), ArchiveError> {
  let mut archive = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
  let directory = parse_directory(&mut archive, &options.parse)?;

  let indices = resolve_selector(&directory, selector)?;
  let Some(&index) = indices.first() else {
    let name = match selector {
      Selector::ByName(name) => String::from_utf8_lossy(name).into_owned(),
      _ => String::new(),
    };
    return Err(ArchiveError::NotFound { name });
  };
  let target = &directory.entries[index];
  if !target.validity.is_valid() {
    return Err(ArchiveError::InvalidEntryForUpdate { index: index as u32, validity: target.validity });
  }

  let new_size = new_payload_path.metadata().map_err(|e| ArchiveError::io(new_payload_path, e))?.len();

  let new_name: Vec<u8> = if options.replace_filename {
    new_payload_path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned().into_bytes())
      .unwrap_or_default()
  } else {
    target.name.clone()
  };
  let new_name_len_with_nul = new_name.len() + 1;
  if new_name_len_with_nul > 255 {
    return Err(ArchiveError::FilenameTooLong {
      name: String::from_utf8_lossy(&new_name).into_owned(),
      len: new_name_len_with_nul,
    });
  }
  if let Some(stride) = directory.fixed_entry_stride {
    let required = 8 + new_name_len_with_nul as u32;
    if required > stride {
      return Err(ArchiveError::StrideTooSmall { stride, required });
    }
  }

  // New per-entry (name, size), the old entry's name/size everywhere
  // except the target index. Payloads for non-target entries are
  // streamed from their *old* offset in the original archive; the
  // directory's own byte layout shifts to follow whatever the target's
  // new size (and name, if replaced) requires.
  let mut names = Vec::with_capacity(directory.len());
  let mut sizes = Vec::with_capacity(directory.len());
  let mut old_offsets = Vec::with_capacity(directory.len());
  for (j, entry) in directory.entries.iter().enumerate() {
    if j == index {
      names.push(new_name.clone());
      sizes.push(new_size);
    } else {
      names.push(entry.name.clone());
      sizes.push(u64::from(entry.size));
    }
    old_offsets.push(u64::from(entry.offset));
  }

  let directory_bytes: u64 = match directory.fixed_entry_stride {
    Some(stride) => u64::from(stride) * directory.len() as u64,
    None => names.iter().map(|n| 8 + n.len() as u64 + 1).sum(),
  };
  let new_header_length = HEADER_LEN as u64 + directory_bytes;

  let mut new_offsets = Vec::with_capacity(directory.len());
  let mut cursor = new_header_length;
  for &size in &sizes {
    new_offsets.push(cursor);
    cursor += size;
  }
  let new_archive_size = cursor;

  let parent = archive_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
  let mut tmp = NamedTempFile::new_in(parent).map_err(|e| ArchiveError::io(archive_path, e))?;
  let out = tmp.as_file_mut();

  write_header(out, directory.format, new_archive_size as u32, directory.len() as u32, new_header_length as u32)
    .map_err(|e| ArchiveError::io(archive_path, e))?;

  for (j, name) in names.iter().enumerate() {
    write_directory_record_raw(out, directory.format, name, new_offsets[j], sizes[j], directory.fixed_entry_stride)
      .map_err(|e| ArchiveError::io(archive_path, e))?;
  }

  let mut new_payload = File::open(new_payload_path).map_err(|e| ArchiveError::io(new_payload_path, e))?;
  for (j, &offset) in new_offsets.iter().enumerate() {
    out.seek(SeekFrom::Start(offset)).map_err(|e| ArchiveError::io(archive_path, e))?;
    if j == index {
      copy_exact(&mut new_payload, out, new_size).map_err(|e| ArchiveError::io(archive_path, e))?;
    } else {
      archive.seek(SeekFrom::Start(old_offsets[j])).map_err(|e| ArchiveError::io(archive_path, e))?;
      copy_exact(&mut archive, out, sizes[j]).map_err(|e| ArchiveError::io(archive_path, e))?;
    }
  }

  log::info!(
    "{}: entry {index} {} -> {} bytes; archive {} -> {new_archive_size} bytes",
    archive_path.display(), target.size, new_size, directory.header.archive_size
  );

  tmp.as_file().sync_all().map_err(|e| ArchiveError::io(archive_path, e))?;
  tmp.persist(archive_path).map_err(|e| ArchiveError::io(archive_path, e.error))?;
  Ok(())
}
