//! The fixed 16-byte archive header.

use std::io::{Read, Write};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{error::ArchiveError, format::ArchiveFormat};

/// The soft ceiling on declared entry counts, enforced before any
/// per-entry allocation happens. A hostile archive cannot force the
/// parser to reserve memory proportional to an arbitrary 32-bit count.
pub const DEFAULT_MAX_ENTRY_COUNT: u32 = 10_000;

/// Raw on-disk layout of the 16-byte header. Multi-byte fields are kept
/// as opaque `[u8; 4]` rather than zerocopy's own endian-aware integer
/// wrappers because the byte order is chosen at runtime by the format
/// tag, not fixed at compile time.
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
#[repr(C)]
struct RawHeader {
  magic: [u8; 4],
  archive_size: [u8; 4],
  entry_count: [u8; 4],
  header_length: [u8; 4],
}

pub const HEADER_LEN: usize = core::mem::size_of::<RawHeader>();

/// The parsed 16-byte header. Fields are exactly as declared on disk;
/// the parser recomputes them independently and flags disagreement
/// rather than trusting these values blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
  pub archive_size: u32,
  pub entry_count: u32,
  pub header_length: u32,
}

/// Reads and validates the 16-byte header, returning the parsed fields
/// and the detected variant.
///
/// Fails with [`ArchiveError::ShortRead`] when fewer than 16 bytes are
/// available, [`ArchiveError::InvalidMagic`] when the magic matches none
/// of the three known variants, or [`ArchiveError::SuspiciousCount`]
/// when the declared entry count exceeds `max_entry_count`.
pub fn read_header<R: Read>(
  src: &mut R,
  max_entry_count: u32,
) -> Result<(Header, ArchiveFormat), ArchiveError> {
  let mut buf = [0u8; HEADER_LEN];
  let mut filled = 0;
  loop {
    let n = src
      .read(&mut buf[filled..])
      .map_err(|e| ArchiveError::io("<header>", e))?;
    if n == 0 {
      break;
    }
    filled += n;
    if filled == HEADER_LEN {
      break;
    }
  }
  if filled < HEADER_LEN {
    return Err(ArchiveError::ShortRead { got: filled });
  }

  let raw = RawHeader::read_from_bytes(&buf).expect("buffer is exactly sizeof(RawHeader)");
  let format = ArchiveFormat::detect(raw.magic).ok_or(ArchiveError::InvalidMagic { magic: raw.magic })?;

  let entry_count = format.read_u32(raw.entry_count);
  if entry_count > max_entry_count {
    return Err(ArchiveError::SuspiciousCount { count: entry_count, ceiling: max_entry_count });
  }

  let header = Header {
    archive_size: format.read_u32(raw.archive_size),
    entry_count,
    header_length: format.read_u32(raw.header_length),
  };
  Ok((header, format))
}

/// Writes the 16-byte header in the byte order mandated by `format`.
pub fn write_header<W: Write>(
  sink: &mut W,
  format: ArchiveFormat,
  archive_size: u32,
  entry_count: u32,
  header_length: u32,
) -> std::io::Result<()> {
  let raw = RawHeader {
    magic: format.magic(),
    archive_size: format.write_u32(archive_size),
    entry_count: format.write_u32(entry_count),
    header_length: format.write_u32(header_length),
  };
  sink.write_all(raw.as_bytes())
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use super::*;

  #[test]
  fn round_trips_bigf() {
    let mut buf = Vec::new();
    write_header(&mut buf, ArchiveFormat::BigF, 308, 2, 55).unwrap();
    assert_eq!(&buf[0..4], b"BIGF");

    let (header, format) = read_header(&mut Cursor::new(buf), DEFAULT_MAX_ENTRY_COUNT).unwrap();
    assert_eq!(format, ArchiveFormat::BigF);
    assert_eq!(header.archive_size, 308);
    assert_eq!(header.entry_count, 2);
    assert_eq!(header.header_length, 55);
  }

  #[test]
  fn round_trips_big4_little_endian() {
    let mut buf = Vec::new();
    write_header(&mut buf, ArchiveFormat::Big4, 0x0102_0304, 1, 20).unwrap();
    // Little-endian: least-significant byte first.
    assert_eq!(&buf[4..8], &[0x04, 0x03, 0x02, 0x01]);

    let (header, format) = read_header(&mut Cursor::new(buf), DEFAULT_MAX_ENTRY_COUNT).unwrap();
    assert_eq!(format, ArchiveFormat::Big4);
    assert_eq!(header.archive_size, 0x0102_0304);
  }

  #[test]
  fn rejects_unknown_magic() {
    let buf = *b"ZZZZ\0\0\0\0\0\0\0\0\0\0\0\0";
    let err = read_header(&mut Cursor::new(buf), DEFAULT_MAX_ENTRY_COUNT).unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidMagic { .. }));
  }

  #[test]
  fn rejects_short_read() {
    let buf = b"BIGF\0\0\0".to_vec();
    let err = read_header(&mut Cursor::new(buf), DEFAULT_MAX_ENTRY_COUNT).unwrap_err();
    assert!(matches!(err, ArchiveError::ShortRead { got: 7 }));
  }

  #[test]
  fn rejects_suspicious_count() {
    let mut buf = Vec::new();
    write_header(&mut buf, ArchiveFormat::BigF, 16, 1 << 20, 16).unwrap();
    let err = read_header(&mut Cursor::new(buf), DEFAULT_MAX_ENTRY_COUNT).unwrap_err();
    assert!(matches!(err, ArchiveError::SuspiciousCount { .. }));
  }
}
