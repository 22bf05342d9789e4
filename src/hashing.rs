//! Deterministic `hash()` reproducing CPython 3.2 on a 64-bit build.
//!
//! The whole point of these functions is reproducibility: the same value
//! hashes to the same code on every run, so a recorded trace can be
//! replayed slot by slot. Nothing here is randomized or seeded.

use crate::{error::HashError, object::PyValue};

/// A CPython hash code: a 64-bit signed integer.
pub type HashCode = i64;

/// `hash(None)` on a 64-bit CPython 3.2 build. CPython derives it from the
/// address of the `None` singleton, which changes between interpreter runs;
/// we pin it so traces stay reproducible.
pub const NONE_HASH: HashCode = -9_223_372_036_581_563_745;

/// Multiplier of the CPython 3.2 string hash.
const STRING_HASH_MULTIPLIER: u64 = 1_000_003;

/// Hash a value the way CPython 3.2 would, or fail with
/// [`HashError::Unhashable`] for mutable containers.
pub fn py_hash(value: &PyValue) -> Result<HashCode, HashError> {
    match value {
        PyValue::None => Ok(NONE_HASH),
        PyValue::Int(x) => Ok(py_hash_int(*x)),
        PyValue::Str(s) => Ok(py_hash_str(s)),
        PyValue::List(_) => Err(HashError::Unhashable {
            type_name: value.type_name(),
        }),
    }
}

/// Integer hashing: `hash(x) == x` for anything that fits the hash width.
/// The single exception is `-1`, which CPython reserves as an error marker
/// at the C level, so `hash(-1) == -2`.
pub fn py_hash_int(x: i64) -> HashCode {
    if x == -1 {
        -2
    } else {
        x
    }
}

/// The fixed (pre-randomization) CPython string hash over code points:
///
/// ```text
/// x = ord(s[0]) << 7
/// for c in s:
///     x = (1000003 * x) ^ ord(c)      # wrapping, mod 2**64
/// x ^= len(s)
/// ```
///
/// The empty string hashes to 0, and a result of -1 is mapped to -2.
pub fn py_hash_str(s: &str) -> HashCode {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return 0,
    };

    let mut x: u64 = (first as u64) << 7;
    let mut len: u64 = 0;
    for c in s.chars() {
        x = x.wrapping_mul(STRING_HASH_MULTIPLIER) ^ (c as u64);
        len += 1;
    }
    x ^= len;

    let hash = x as i64;
    if hash == -1 {
        -2
    } else {
        hash
    }
}
