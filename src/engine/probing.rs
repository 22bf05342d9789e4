//! Probing-sequence generator: purely illustrative, it never touches a
//! table. For a given slot count and key it runs one probing recurrence
//! until every slot has been visited, recording each `from -> to`
//! transition so a renderer can draw the full cycle.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::{
    error::{EngineError, EngineResult},
    hashing::{py_hash, HashCode},
    object::PyValue,
    trace::Trace,
};

use super::{compute_idx, compute_perturb, next_idx, PERTURB_SHIFT};

/// The three recurrences the visualization compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProbingAlgorithm {
    /// `idx = (idx + 1) % size`; covers any size.
    Linear,
    /// `idx = (5*idx + 1) % size`; full period for power-of-two sizes.
    Mul5,
    /// The CPython recurrence with perturb mixing.
    Python,
}

impl ProbingAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbingAlgorithm::Linear => "i+1",
            ProbingAlgorithm::Mul5 => "5i+1",
            ProbingAlgorithm::Python => "python",
        }
    }
}

impl fmt::Display for ProbingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbingAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i+1" => Ok(ProbingAlgorithm::Linear),
            "5i+1" => Ok(ProbingAlgorithm::Mul5),
            "python" => Ok(ProbingAlgorithm::Python),
            other => Err(format!("unknown probing algorithm: {other}")),
        }
    }
}

/// `links[i]` is the ordered list of slots that probing moved to from
/// slot `i`, over the whole covering run.
pub type Links = Vec<Vec<usize>>;

#[derive(Debug, Clone, Serialize)]
pub struct ProbingSnapshot {
    pub slot_count: usize,
    pub key: PyValue,
    pub hash_code: Option<HashCode>,
    pub perturb: Option<u64>,
    pub idx: Option<usize>,
    pub visited: BTreeSet<usize>,
    pub links: Links,
}

#[derive(Debug)]
pub struct LinksOutcome {
    pub links: Links,
    pub trace: Trace<ProbingSnapshot>,
}

/// Run `algorithm` from `hash(key) % slot_count` until the visited set
/// covers every slot. `Mul5` and `Python` are only guaranteed to cover a
/// power-of-two slot count; any other count is rejected up front rather
/// than looping forever.
pub fn generate_links(
    slot_count: usize,
    key: &PyValue,
    algorithm: ProbingAlgorithm,
) -> EngineResult<LinksOutcome> {
    if slot_count == 0
        || (!slot_count.is_power_of_two() && algorithm != ProbingAlgorithm::Linear)
    {
        return Err(EngineError::NonCoveringProbe {
            algorithm: algorithm.as_str(),
            slot_count,
        });
    }

    let mut trace = Trace::new();
    let mut links: Links = vec![Vec::new(); slot_count];

    let mut snap = ProbingSnapshot {
        slot_count,
        key: key.clone(),
        hash_code: None,
        perturb: None,
        idx: None,
        visited: BTreeSet::new(),
        links: links.clone(),
    };

    let hash_code = py_hash(key)?;
    snap.hash_code = Some(hash_code);
    trace.checkpoint("compute-hash", &snap);

    let mut perturb = compute_perturb(hash_code);
    if algorithm == ProbingAlgorithm::Python {
        snap.perturb = Some(perturb);
        trace.checkpoint("compute-perturb", &snap);
    }

    let mut idx = compute_idx(hash_code, slot_count);
    snap.idx = Some(idx);
    trace.checkpoint("compute-idx", &snap);

    let mut visited: BTreeSet<usize> = BTreeSet::new();
    trace.checkpoint("create-empty-set", &snap);

    loop {
        trace.checkpoint("while-loop", &snap);
        if visited.len() == slot_count {
            break;
        }

        visited.insert(idx);
        snap.visited = visited.clone();
        trace.checkpoint("visited-add", &snap);

        let next = match algorithm {
            ProbingAlgorithm::Linear => (idx + 1) % slot_count,
            ProbingAlgorithm::Mul5 => (5 * idx + 1) % slot_count,
            ProbingAlgorithm::Python => next_idx(idx, perturb, slot_count),
        };
        links[idx].push(next);
        idx = next;
        snap.links = links.clone();
        snap.idx = Some(idx);
        trace.checkpoint("next-idx", &snap);

        if algorithm == ProbingAlgorithm::Python {
            perturb >>= PERTURB_SHIFT;
            snap.perturb = Some(perturb);
            trace.checkpoint("perturb-shift", &snap);
        }
    }

    Ok(LinksOutcome { links, trace })
}
