//! The instrumented table algorithms: the simple parallel-array hash
//! table, the CPython 3.2 dict, and the probing-sequence generator.

pub mod dict32;
pub mod probing;
pub mod simple;

pub use dict32::{Dict32, DictSnapshot, INITIAL_SIZE};
pub use probing::{generate_links, LinksOutcome, ProbingAlgorithm, ProbingSnapshot};
pub use simple::SimpleTable;

use crate::hashing::HashCode;

/// How far `perturb` shifts right after every probe step.
pub const PERTURB_SHIFT: u32 = 5;

/// Starting slot index: Python's `hash_code % size` (the result of `%` is
/// never negative in Python).
pub(crate) fn compute_idx(hash_code: HashCode, size: usize) -> usize {
    hash_code.rem_euclid(size as i64) as usize
}

/// Initial perturb: the hash reinterpreted as unsigned 64-bit, i.e.
/// `2**64 + hash_code` for negative hashes.
pub(crate) fn compute_perturb(hash_code: HashCode) -> u64 {
    hash_code as u64
}

/// One step of the CPython probing recurrence:
/// `idx = (5*idx + perturb + 1) % size`. The 128-bit intermediate keeps
/// the modulo exact for any table size, not just powers of two.
pub(crate) fn next_idx(idx: usize, perturb: u64, size: usize) -> usize {
    ((5 * idx as u128 + perturb as u128 + 1) % size as u128) as usize
}
