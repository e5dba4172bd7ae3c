//! Top-level decode pipeline: open an archive, parse its directory, and
//! extract the selected entries. A thin wrapper over
//! [`crate::parse_directory`] and [`crate::extract`] — the two stay
//! independently usable (the CLI's info command only needs the parse
//! half), this just saves re-wiring them at every call site that wants
//! both.

use std::{fs::File, path::Path};

use crate::{
  directory::Directory,
  error::ArchiveError,
  extract::{extract, ExtractOptions, ExtractReport, Selector},
  parser::{parse_directory, ParseOptions},
};

#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
  pub parse: ParseOptions,
  pub extract: ExtractOptions,
}

#[derive(Debug)]
pub struct DecodeReport {
  pub directory: Directory,
  pub extract: ExtractReport,
}

/// Opens `archive_path`, parses its directory, and extracts the entries
/// matched by `selector` into `output_dir`.
pub fn decode(
  archive_path: &Path,
  selector: &Selector,
  output_dir: &Path,
  options: &DecodeOptions,
) -> Result<DecodeReport, ArchiveError> {
  let mut file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
  let directory = parse_directory(&mut file, &options.parse)?;
  log::info!(
    "{}: format {:?}, {} entries, validity {:?}",
    archive_path.display(), directory.format, directory.len(), directory.validity()
  );
  let report = extract(&mut file, &directory, selector, output_dir, &options.extract)?;
  Ok(DecodeReport { directory, extract: report })
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;
  use crate::encode::{encode, EncodeInput, EncodeOptions};

  #[test]
  fn decodes_freshly_encoded_archive() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("readme.txt");
    std::fs::write(&input_path, b"contents").unwrap();
    let archive_path = dir.path().join("archive.viv");
    encode(
      &[EncodeInput { name: "readme.txt".to_string(), source_path: input_path }],
      &archive_path,
      &EncodeOptions::default(),
    )
    .unwrap();

    let out_dir = dir.path().join("out");
    let report = decode(&archive_path, &Selector::All, &out_dir, &DecodeOptions::default()).unwrap();
    assert_eq!(report.directory.len(), 1);
    assert_eq!(report.extract.written_count(), 1);
    assert_eq!(std::fs::read(out_dir.join("readme.txt")).unwrap(), b"contents");
  }
}
