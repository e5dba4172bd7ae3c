//! Archive variant tag and the byte-order codec keyed on it.
//!
//! Every multi-byte integer in a VIV/BIG archive goes through
//! [`ArchiveFormat::read_u32`]/[`ArchiveFormat::write_u32`]. Nothing else in
//! the crate branches on endianness directly, which is the point: the
//! format tag carries byte order as a value, not as a branch repeated at
//! every call site.

/// The three known container variants.
///
/// `BigF` and `BigH` are big-endian; `Big4` is little-endian. The variant
/// also selects the four-byte magic at offset zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
  BigF,
  BigH,
  Big4,
}

impl ArchiveFormat {
  pub const MAGIC_BIGF: [u8; 4] = *b"BIGF";
  pub const MAGIC_BIGH: [u8; 4] = *b"BIGH";
  pub const MAGIC_BIG4: [u8; 4] = *b"BIG4";

  /// The four-byte magic this variant writes at offset zero.
  #[must_use]
  pub const fn magic(self) -> [u8; 4] {
    match self {
      ArchiveFormat::BigF => Self::MAGIC_BIGF,
      ArchiveFormat::BigH => Self::MAGIC_BIGH,
      ArchiveFormat::Big4 => Self::MAGIC_BIG4,
    }
  }

  /// Detects the variant from the first four bytes of an archive.
  ///
  /// Returns `None` when the bytes match none of the three known magics.
  #[must_use]
  pub fn detect(magic: [u8; 4]) -> Option<Self> {
    match magic {
      Self::MAGIC_BIGF => Some(ArchiveFormat::BigF),
      Self::MAGIC_BIGH => Some(ArchiveFormat::BigH),
      Self::MAGIC_BIG4 => Some(ArchiveFormat::Big4),
      _ => None,
    }
  }

  /// `true` for the variants that store integers big-endian.
  #[must_use]
  pub const fn is_big_endian(self) -> bool {
    matches!(self, ArchiveFormat::BigF | ArchiveFormat::BigH)
  }

  /// Decodes a 4-byte field in this variant's byte order.
  #[must_use]
  pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
    if self.is_big_endian() {
      u32::from_be_bytes(bytes)
    } else {
      u32::from_le_bytes(bytes)
    }
  }

  /// Encodes a 4-byte field in this variant's byte order.
  #[must_use]
  pub fn write_u32(self, value: u32) -> [u8; 4] {
    if self.is_big_endian() {
      value.to_be_bytes()
    } else {
      value.to_le_bytes()
    }
  }

  /// Short display name, as used on the CLI's `-fmt` flag and in
  /// `DirectorySummary`.
  #[must_use]
  pub const fn name(self) -> &'static str {
    match self {
      ArchiveFormat::BigF => "BIGF",
      ArchiveFormat::BigH => "BIGH",
      ArchiveFormat::Big4 => "BIG4",
    }
  }
}

impl core::str::FromStr for ArchiveFormat {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "BIGF" => Ok(ArchiveFormat::BigF),
      "BIGH" => Ok(ArchiveFormat::BigH),
      "BIG4" => Ok(ArchiveFormat::Big4),
      _ => Err(()),
    }
  }
}

impl Default for ArchiveFormat {
  fn default() -> Self {
    ArchiveFormat::BigF
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_known_magics() {
    assert_eq!(ArchiveFormat::detect(*b"BIGF"), Some(ArchiveFormat::BigF));
    assert_eq!(ArchiveFormat::detect(*b"BIGH"), Some(ArchiveFormat::BigH));
    assert_eq!(ArchiveFormat::detect(*b"BIG4"), Some(ArchiveFormat::Big4));
    assert_eq!(ArchiveFormat::detect(*b"ABCD"), None);
  }

  #[test]
  fn byte_order_matches_variant() {
    assert_eq!(ArchiveFormat::BigF.read_u32([0, 0, 0, 1]), 1);
    assert_eq!(ArchiveFormat::BigH.read_u32([0, 0, 0, 1]), 1);
    assert_eq!(ArchiveFormat::Big4.read_u32([1, 0, 0, 0]), 1);
  }

  #[test]
  fn round_trips_through_write_and_read() {
    for format in [ArchiveFormat::BigF, ArchiveFormat::BigH, ArchiveFormat::Big4] {
      let bytes = format.write_u32(0xdead_beef);
      assert_eq!(format.read_u32(bytes), 0xdead_beef);
    }
  }

  #[test]
  fn from_str_is_case_insensitive() {
    assert_eq!("bigf".parse(), Ok(ArchiveFormat::BigF));
    assert_eq!("BIG4".parse(), Ok(ArchiveFormat::Big4));
    assert_eq!("zzzz".parse::<ArchiveFormat>(), Err(()));
  }
}
