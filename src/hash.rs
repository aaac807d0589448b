// File: hash.rs
//
// The purpose of this file is to hash keys into the m-bit identifier space
// and determine where a given identifier falls between two others on the ring.

use sha1::{Digest, Sha1};
use std::cmp::Ordering;

/// An identifier on the ring, in `[0, 2^m)`.
pub type Id = u64;

/// Returns the bit mask covering the identifier space for `m` bits
///
/// # Arguments
///
/// * `m` - The number of bits in the identifier space
pub fn id_mask(m: u32) -> Id {
  if m >= 64 {
    Id::max_value()
  } else {
    (1 << m) - 1
  }
}

/// Returns the ring identifier for a given key
/// The SHA-1 digest of the key is read as a big-endian integer and
/// reduced modulo 2^m
///
/// # Arguments
///
/// * `key` - The key to be hashed
/// * `m` - The number of bits in the identifier space
pub fn hash_id(key: &str, m: u32) -> Id {
  let mut hasher = Sha1::new();
  hasher.input(key.as_bytes());
  let digest = hasher.result();
  // The low m bits of the 160-bit digest live in its last eight bytes
  let mut tail = [0u8; 8];
  tail.copy_from_slice(&digest[12..20]);
  Id::from_be_bytes(tail) & id_mask(m)
}

/// Returns if a given id lies strictly inside the clockwise arc (start, end)
/// When start == end the arc spans the whole ring minus the point itself
///
/// # Arguments
///
/// * `start` - The identifier the arc leaves from
/// * `end` - The identifier the arc stops before
/// * `id` - The identifier being tested
pub fn in_open_range(start: Id, end: Id, id: Id) -> bool {
  match start.cmp(&end) {
    Ordering::Less => id > start && id < end,
    _ => id > start || id < end,
  }
}

/// Returns if a given id lies inside the clockwise arc (start, end]
///
/// # Arguments
///
/// * `start` - The identifier the arc leaves from
/// * `end` - The identifier the arc ends on, inclusive
/// * `id` - The identifier being tested
pub fn in_right_closed_range(start: Id, end: Id, id: Id) -> bool {
  match start.cmp(&end) {
    Ordering::Less => id > start && id <= end,
    _ => id > start || id <= end,
  }
}
