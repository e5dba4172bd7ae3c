//! Payload extraction: reads entries back out of an archive and writes
//! them to an output directory.

use std::{
  fs::File,
  io::{Seek, SeekFrom},
  path::{Path, PathBuf},
};

use crate::{
  directory::Directory,
  entry::EntryValidity,
  error::ArchiveError,
  filename::{check_safe, output_name},
  io_util::copy_exact,
};

/// Which entries an extraction pass should cover.
#[derive(Debug, Clone)]
pub enum Selector {
  All,
  ByIndex(u32),
  /// Matches the first entry (by parse order) whose stored name is
  /// exactly these bytes. Takes precedence over [`Selector::ByIndex`]
  /// when both would otherwise apply, since a name is a more specific
  /// request than a position.
  ByName(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
  /// Overwrite an existing file at the destination path instead of
  /// skipping it.
  pub overwrite: bool,
  /// Always write output filenames in their hex-escaped form, even for
  /// entries classified as printable or UTF-8.
  pub force_hex_names: bool,
  /// Extract entries whose validity is not [`EntryValidity::Valid`]
  /// too, using whatever (possibly truncated or zero-length) payload
  /// range they carry. Off by default: a non-`Valid` entry's offset and
  /// size are not to be trusted.
  pub extract_invalid: bool,
}

impl Default for ExtractOptions {
  fn default() -> Self {
    Self { overwrite: false, force_hex_names: false, extract_invalid: false }
  }
}

/// Per-entry outcome, recorded regardless of whether the caller asked
/// for one entry or all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
  Written(PathBuf),
  SkippedUnsafeName,
  SkippedInvalid(EntryValidity),
  SkippedExisting(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct ExtractReport {
  pub outcomes: Vec<(usize, ExtractOutcome)>,
}

impl ExtractReport {
  #[must_use]
  pub fn written_count(&self) -> usize {
    self.outcomes.iter().filter(|(_, o)| matches!(o, ExtractOutcome::Written(_))).count()
  }
}

/// Extracts entries matching `selector` from `src` into `output_dir`.
///
/// `output_dir` is created (one level) if it does not already exist.
/// Every candidate entry is independently checked by
/// [`crate::filename::check_safe`] before anything is written; an
/// unsafe name is skipped rather than aborting the whole extraction,
/// so one hostile entry cannot block the rest of a batch.
pub fn extract<R: std::io::Read + Seek>(
  src: &mut R,
  directory: &Directory,
  selector: &Selector,
  output_dir: &Path,
  options: &ExtractOptions,
) -> Result<ExtractReport, ArchiveError> {
  std::fs::create_dir_all(output_dir).map_err(|e| ArchiveError::io(output_dir, e))?;

  let indices = resolve_selector(directory, selector)?;
  let mut report = ExtractReport::default();

  for index in indices {
    let entry = &directory.entries[index];

    if !entry.validity.is_valid() && !options.extract_invalid {
      report.outcomes.push((index, ExtractOutcome::SkippedInvalid(entry.validity)));
      continue;
    }

    let name_str = entry.name_lossy();
    if check_safe(&name_str).is_err() {
      log::warn!("entry {index} ({name_str:?}) has an unsafe stored name; skipping");
      report.outcomes.push((index, ExtractOutcome::SkippedUnsafeName));
      continue;
    }

    let filename = output_name(entry, options.force_hex_names);
    let dest_path = output_dir.join(&filename);

    if dest_path.exists() && !options.overwrite {
      report.outcomes.push((index, ExtractOutcome::SkippedExisting(dest_path)));
      continue;
    }

    let mut dest =
      File::create(&dest_path).map_err(|e| ArchiveError::OutputOpenFailed { path: dest_path.clone(), source: e })?;
    let (offset, _) = entry.payload_range();
    src.seek(SeekFrom::Start(offset)).map_err(|e| ArchiveError::io("<archive>", e))?;
    copy_exact(src, &mut dest, u64::from(entry.size)).map_err(|e| ArchiveError::io(&dest_path, e))?;

    log::debug!("extracted entry {index} ({name_str:?}) -> {}", dest_path.display());
    report.outcomes.push((index, ExtractOutcome::Written(dest_path)));
  }

  Ok(report)
}

pub(crate) fn resolve_selector(directory: &Directory, selector: &Selector) -> Result<Vec<usize>, ArchiveError> {
  match selector {
    Selector::All => Ok((0..directory.len()).collect()),
    Selector::ByName(name) => match directory.index_of_name(name) {
      Some(idx) => Ok(vec![idx]),
      None => Ok(Vec::new()),
    },
    Selector::ByIndex(index) => {
      if *index as usize >= directory.len() {
        return Err(ArchiveError::IndexOutOfRange { index: *index, count: directory.len() as u32 });
      }
      Ok(vec![*index as usize])
    }
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use tempfile::tempdir;

  use super::*;
  use crate::{
    encode::{encode, EncodeInput, EncodeOptions},
    parser::{parse_directory, ParseOptions},
  };

  fn build_archive(dir: &Path) -> (Vec<u8>, Directory) {
    let input_path = dir.join("input.bin");
    std::fs::write(&input_path, b"payload-bytes").unwrap();
    let inputs = vec![EncodeInput { name: "input.bin".to_string(), source_path: input_path }];
    let output = dir.join("archive.viv");
    encode(&inputs, &output, &EncodeOptions::default()).unwrap();
    let bytes = std::fs::read(&output).unwrap();
    let directory = parse_directory(&mut Cursor::new(bytes.clone()), &ParseOptions::default()).unwrap();
    (bytes, directory)
  }

  #[test]
  fn extracts_all_entries() {
    let dir = tempdir().unwrap();
    let (bytes, directory) = build_archive(dir.path());
    let out_dir = dir.path().join("out");

    let report = extract(&mut Cursor::new(bytes), &directory, &Selector::All, &out_dir, &ExtractOptions::default()).unwrap();
    assert_eq!(report.written_count(), 1);
    let written = std::fs::read(out_dir.join("input.bin")).unwrap();
    assert_eq!(written, b"payload-bytes");
  }

  #[test]
  fn skips_existing_without_overwrite() {
    let dir = tempdir().unwrap();
    let (bytes, directory) = build_archive(dir.path());
    let out_dir = dir.path().join("out");
    std::fs::create_dir_all(&out_dir).unwrap();
    std::fs::write(out_dir.join("input.bin"), b"stale").unwrap();

    let report =
      extract(&mut Cursor::new(bytes), &directory, &Selector::All, &out_dir, &ExtractOptions::default()).unwrap();
    assert!(matches!(report.outcomes[0].1, ExtractOutcome::SkippedExisting(_)));
    assert_eq!(std::fs::read(out_dir.join("input.bin")).unwrap(), b"stale");
  }

  #[test]
  fn by_name_takes_one_entry() {
    let dir = tempdir().unwrap();
    let (bytes, directory) = build_archive(dir.path());
    let out_dir = dir.path().join("out");

    let selector = Selector::ByName(b"input.bin".to_vec());
    let report = extract(&mut Cursor::new(bytes), &directory, &selector, &out_dir, &ExtractOptions::default()).unwrap();
    assert_eq!(report.written_count(), 1);
  }

  #[test]
  fn by_index_out_of_range_errors() {
    let dir = tempdir().unwrap();
    let (bytes, directory) = build_archive(dir.path());
    let out_dir = dir.path().join("out");

    let err = extract(&mut Cursor::new(bytes), &directory, &Selector::ByIndex(99), &out_dir, &ExtractOptions::default())
      .unwrap_err();
    assert!(matches!(err, ArchiveError::IndexOutOfRange { .. }));
  }
}
