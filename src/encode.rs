//! Archive construction: lays out a directory for a list of named inputs,
//! then streams their payloads in a single pass.

use std::{
  fs::File,
  io::Write,
  path::{Path, PathBuf},
};

use crate::{
  error::ArchiveError,
  format::ArchiveFormat,
  header::{write_header, HEADER_LEN},
  io_util::{copy_exact, write_zero_padding},
};

/// One input to be packed into a new archive: the name it is stored
/// under and the file its payload is read from.
#[derive(Debug, Clone)]
pub struct EncodeInput {
  pub name: String,
  pub source_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
  pub format: ArchiveFormat,
  /// `Some(stride)` writes every directory record as exactly `stride`
  /// bytes, padding short names with NULs; `None` writes variable-stride
  /// records sized to each name.
  pub fixed_entry_stride: Option<u32>,
  /// When set, every payload's start offset is rounded up to the next
  /// multiple of this many bytes; the gap is filled with NULs.
  pub payload_alignment: Option<u32>,
  /// Compute the full layout (offsets, directory bytes, archive size)
  /// without creating or writing the output file.
  pub dry_run: bool,
  /// Replace an existing file at `output_path`. When `false`, `encode`
  /// fails with [`ArchiveError::OutputOpenFailed`] if the target
  /// already exists, before any input is read.
  pub overwrite: bool,
}

impl Default for EncodeOptions {
  fn default() -> Self {
    Self {
      format: ArchiveFormat::default(),
      fixed_entry_stride: None,
      payload_alignment: None,
      dry_run: false,
      overwrite: true,
    }
  }
}

/// Outcome of a completed [`encode`] call.
#[derive(Debug, Clone, Default)]
pub struct EncodeReport {
  /// Total size of the written archive.
  pub archive_size: u64,
  /// Inputs that were stat'd or opened and could not be packed: missing
  /// paths, non-regular files (directories, sockets, ...), or files the
  /// process could not open for reading. Not fatal — the rest of the
  /// input set is still packed.
  pub skipped: Vec<PathBuf>,
}

/// Packs `inputs` into a new archive at `output_path`, in the order
/// given.
///
/// Each input is stat'd and opened before the layout is computed; one
/// that does not exist, is not a regular file, or cannot be opened for
/// reading is dropped from the set and reported in
/// [`EncodeReport::skipped`] rather than failing the whole call. Fails
/// fast, before any byte is written, if any *accepted* name is too long
/// for the requested `fixed_entry_stride` or exceeds the format's
/// 255-byte name limit. A source file that shrinks between the size
/// being read here and the payload being streamed is not fatal either:
/// the shortfall is logged and the gap is zero-padded (see
/// [`copy_exact`]), matching how the parser treats a truncated archive
/// it is only reading.
pub fn encode(inputs: &[EncodeInput], output_path: &Path, options: &EncodeOptions) -> Result<EncodeReport, ArchiveError> {
  if !options.dry_run && !options.overwrite && output_path.exists() {
    return Err(ArchiveError::OutputOpenFailed {
      path: output_path.to_path_buf(),
      source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "output already exists and overwrite is disabled"),
    });
  }

  let mut accepted = Vec::with_capacity(inputs.len());
  let mut sizes = Vec::with_capacity(inputs.len());
  let mut skipped = Vec::new();
  for input in inputs {
    match input.source_path.metadata() {
      Ok(meta) if !meta.is_file() => {
        log::warn!("{}: not a regular file; skipping", input.source_path.display());
        skipped.push(input.source_path.clone());
      }
      Ok(meta) => match File::open(&input.source_path) {
        Ok(_) => {
          sizes.push(meta.len());
          accepted.push(input.clone());
        }
        Err(e) => {
          log::warn!("{}: not readable ({e}); skipping", input.source_path.display());
          skipped.push(input.source_path.clone());
        }
      },
      Err(e) => {
        log::warn!("{}: {e}; skipping", input.source_path.display());
        skipped.push(input.source_path.clone());
      }
    }
  }
  let inputs = accepted;
  let inputs = inputs.as_slice();

  for input in inputs {
    let len_with_nul = input.name.len() + 1;
    if len_with_nul > 255 {
      return Err(ArchiveError::FilenameTooLong { name: input.name.clone(), len: len_with_nul });
    }
    if let Some(stride) = options.fixed_entry_stride {
      let required = 8 + len_with_nul as u32;
      if required > stride {
        return Err(ArchiveError::StrideTooSmall { stride, required });
      }
    }
  }

  let directory_bytes: u64 = match options.fixed_entry_stride {
    Some(stride) => u64::from(stride) * inputs.len() as u64,
    None => inputs.iter().map(|i| 8 + i.name.len() as u64 + 1).sum(),
  };
  let header_length = HEADER_LEN as u64 + directory_bytes;

  // Each entry's start offset (including the first) is rounded up to
  // the next multiple of `payload_alignment`; the gap is leading pad
  // in front of that entry's payload, not trailing pad after the
  // previous one. `archive_size` is the last entry's unpadded end — no
  // pad follows the final payload.
  let alignment = options.payload_alignment.map(u64::from).filter(|&a| a > 1);
  let mut offsets = Vec::with_capacity(inputs.len());
  let mut cursor = header_length;
  for &len in &sizes {
    let offset = match alignment {
      Some(a) => cursor.div_ceil(a) * a,
      None => cursor,
    };
    offsets.push(offset);
    cursor = offset + len;
  }
  let archive_size = cursor;

  if options.dry_run {
    return Ok(EncodeReport { archive_size, skipped });
  }

  let mut file = File::create(output_path).map_err(|e| ArchiveError::OutputOpenFailed { path: output_path.to_path_buf(), source: e })?;

  write_header(&mut file, options.format, archive_size as u32, inputs.len() as u32, header_length as u32)
    .map_err(|e| ArchiveError::io(output_path, e))?;

  for ((input, &offset), &size) in inputs.iter().zip(&offsets).zip(&sizes) {
    write_directory_record(&mut file, options.format, input, offset, size, options.fixed_entry_stride)
      .map_err(|e| ArchiveError::io(output_path, e))?;
  }

  let mut pos = header_length;
  for ((input, &offset), &len) in inputs.iter().zip(&offsets).zip(&sizes) {
    let pad = offset - pos;
    if pad > 0 {
      write_zero_padding(&mut file, pad).map_err(|e| ArchiveError::io(output_path, e))?;
    }
    let mut source = File::open(&input.source_path).map_err(|e| ArchiveError::io(input.source_path.clone(), e))?;
    let copied = copy_exact(&mut source, &mut file, len).map_err(|e| ArchiveError::io(output_path, e))?;
    if copied < len {
      log::warn!(
        "{}: source shrank from {} to {} bytes while packing; gap was zero-padded",
        input.source_path.display(), len, copied
      );
    }
    pos = offset + len;
  }

  file.flush().map_err(|e| ArchiveError::io(output_path, e))?;
  Ok(EncodeReport { archive_size, skipped })
}

fn write_directory_record<W: Write>(
  sink: &mut W,
  format: ArchiveFormat,
  input: &EncodeInput,
  offset: u64,
  size: u64,
  fixed_entry_stride: Option<u32>,
) -> std::io::Result<()> {
  write_directory_record_raw(sink, format, input.name.as_bytes(), offset, size, fixed_entry_stride)
}

/// Writes one `{offset, size, name}` directory record, NUL-terminating
/// (and, in fixed-stride mode, NUL-padding to `stride`) the raw name
/// bytes. Shared by the encoder and [`crate::update`], which both need
/// to emit a directory record from a name that may not be a full
/// [`EncodeInput`].
pub(crate) fn write_directory_record_raw<W: Write>(
  sink: &mut W,
  format: ArchiveFormat,
  name: &[u8],
  offset: u64,
  size: u64,
  fixed_entry_stride: Option<u32>,
) -> std::io::Result<()> {
  sink.write_all(&format.write_u32(offset as u32))?;
  sink.write_all(&format.write_u32(size as u32))?;
  match fixed_entry_stride {
    Some(stride) => {
      let area_len = stride as usize - 8;
      let mut area = vec![0u8; area_len];
      area[..name.len()].copy_from_slice(name);
      sink.write_all(&area)
    }
    None => {
      sink.write_all(name)?;
      sink.write_all(&[0])
    }
  }
}
