//! Target year derivation.
//!
//! The year a job reports on is fixed by its identifying seed string.
//! SHA-256 keeps the mapping identical across runs, builds and platforms.

use sha2::{Digest, Sha256};

/// First year in the reporting window
pub const FIRST_YEAR: i32 = 1994;

/// Number of consecutive years in the reporting window
pub const YEAR_SPAN: u64 = 23;

/// Map `seed` onto a year in `FIRST_YEAR..FIRST_YEAR + YEAR_SPAN`.
///
/// The first eight bytes of the seed's SHA-256 digest, read big-endian,
/// select the offset into the window.
pub fn target_year(seed: &str) -> i32 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let offset = u64::from_be_bytes(prefix) % YEAR_SPAN;
    FIRST_YEAR + offset as i32
}
