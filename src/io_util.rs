//! Bounded-memory byte streaming.
//!
//! Every payload copy in this crate goes through [`copy_exact`], which
//! owns the one transfer buffer the core allocates. No payload is ever
//! read into memory in full — this is a contract the encoder, extractor
//! and updater all rely on, not an optimization.

use std::io::{Read, Write};

/// Size of the one buffer the core uses to stream payload bytes.
pub const TRANSFER_BUFFER_LEN: usize = 64 * 1024;

/// Copies exactly `len` bytes from `src` to `dst` using a fixed
/// transfer buffer, regardless of how large `len` is.
///
/// If `src` reaches EOF before `len` bytes have been read, the
/// remainder is written as NUL bytes so the destination still receives
/// exactly `len` bytes (used by the encoder's `InputChangedUnderfoot`
/// recovery path).
pub fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(
  src: &mut R,
  dst: &mut W,
  len: u64,
) -> std::io::Result<u64> {
  let mut buf = [0u8; TRANSFER_BUFFER_LEN];
  let mut remaining = len;
  let mut copied = 0u64;

  while remaining > 0 {
    let chunk = remaining.min(buf.len() as u64) as usize;
    let read = src.read(&mut buf[..chunk])?;
    if read == 0 {
      break;
    }
    dst.write_all(&buf[..read])?;
    copied += read as u64;
    remaining -= read as u64;
  }

  if remaining > 0 {
    let zero = [0u8; TRANSFER_BUFFER_LEN];
    let mut left = remaining;
    while left > 0 {
      let chunk = left.min(zero.len() as u64) as usize;
      dst.write_all(&zero[..chunk])?;
      left -= chunk as u64;
    }
  }

  Ok(copied)
}

/// Writes `len` NUL bytes to `dst` using the fixed transfer buffer.
pub fn write_zero_padding<W: Write + ?Sized>(dst: &mut W, len: u64) -> std::io::Result<()> {
  let zero = [0u8; TRANSFER_BUFFER_LEN];
  let mut remaining = len;
  while remaining > 0 {
    let chunk = remaining.min(zero.len() as u64) as usize;
    dst.write_all(&zero[..chunk])?;
    remaining -= chunk as u64;
  }
  Ok(())
}
