//! The real thing: CPython 3.2's dict, slot for slot.
//!
//! Open addressing over a struct-of-slots array with the perturbation
//! probing recurrence, tombstone deletion, tombstone recycling on insert,
//! and load-factor-triggered resizing (`fill * 3 >= size * 2`). Every
//! operation records a breakpoint trace; resizes triggered inside a bulk
//! construction are traced separately so a caller can zoom into each one.

use serde::Serialize;

use crate::{
    error::{EngineError, EngineResult},
    hashing::{py_hash, HashCode},
    object::{PyValue, Slot},
    trace::Trace,
};

use super::{compute_idx, compute_perturb, next_idx, PERTURB_SHIFT};

/// Smallest table CPython ever allocates.
pub const INITIAL_SIZE: usize = 8;

/// Resize headroom: the new table is the smallest power of two larger
/// than `used * GROWTH_FACTOR`. CPython 3.2 uses 4 below 50k entries;
/// any monotonic factor that keeps the rehashed table under the 2/3
/// threshold would do.
pub const GROWTH_FACTOR: usize = 4;

/// A CPython 3.2 dict: one slot array plus the two occupancy counters.
///
/// `used` counts live keys; `fill` counts non-EMPTY slots (live plus
/// tombstones). Invariant: `used <= fill <= size`. Deletion decrements
/// `used` only: tombstones keep counting toward the load factor, which
/// is what eventually forces a cleanup resize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dict32 {
    slots: Vec<Slot>,
    used: usize,
    fill: usize,
}

/// Snapshot of a probing operation (`set_item`, `lookdict`, `get_item`,
/// `del_item`) at one breakpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DictSnapshot {
    pub slots: Vec<Slot>,
    pub used: usize,
    pub fill: usize,
    pub key: Option<PyValue>,
    pub value: Option<PyValue>,
    pub hash_code: Option<HashCode>,
    pub idx: Option<usize>,
    pub perturb: Option<u64>,
    pub target_idx: Option<usize>,
}

/// Snapshot of a resize: the retired slot array next to the one being
/// filled.
#[derive(Debug, Clone, Serialize)]
pub struct ResizeSnapshot {
    pub old_slots: Vec<Slot>,
    pub slots: Vec<Slot>,
    pub used: usize,
    pub fill: usize,
    pub old_idx: Option<usize>,
    pub hash_code: Option<HashCode>,
    pub idx: Option<usize>,
    pub perturb: Option<u64>,
}

/// One resize captured on its own, in occurrence order.
pub struct ResizeRun {
    pub trace: Trace<ResizeSnapshot>,
}

pub struct SetOutcome {
    pub trace: Trace<DictSnapshot>,
    /// Trace of the resize this insert triggered, if it did.
    pub resize: Option<ResizeRun>,
    pub result: EngineResult<()>,
}

pub struct GetOutcome {
    pub trace: Trace<DictSnapshot>,
    pub result: EngineResult<PyValue>,
}

pub struct DelOutcome {
    pub trace: Trace<DictSnapshot>,
    pub result: EngineResult<()>,
}

pub struct InitOutcome {
    pub dict: Dict32,
    pub trace: Trace<DictSnapshot>,
    /// Sub-traces of every resize triggered during construction.
    pub resizes: Vec<ResizeRun>,
    pub result: EngineResult<()>,
}

impl Default for Dict32 {
    fn default() -> Self {
        Self::new()
    }
}

impl Dict32 {
    /// A fresh dict: 8 EMPTY slots, nothing used, nothing filled.
    pub fn new() -> Self {
        Dict32 {
            slots: vec![Slot::Empty; INITIAL_SIZE],
            used: 0,
            fill: 0,
        }
    }

    /// Reassemble a dict from its raw parts (the bridge restores wire
    /// state through this).
    pub fn from_parts(slots: Vec<Slot>, used: usize, fill: usize) -> Self {
        Dict32 { slots, used, fill }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn fill(&self) -> usize {
        self.fill
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Live `(key, value)` pairs in slot order.
    pub fn items(&self) -> Vec<(PyValue, PyValue)> {
        self.slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Occupied { key, value, .. } => Some((key.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    /// Bulk constructor: `set_item` per pair in input order, starting
    /// from a fresh 8-slot table. Resizes happen as they would during any
    /// other insert and each one's trace is kept ("resize as you go",
    /// the resizes are the interesting part).
    pub fn from_pairs(pairs: &[(PyValue, PyValue)]) -> InitOutcome {
        let mut dict = Dict32::new();
        let mut trace = Trace::new();
        let mut resizes = Vec::new();

        for (key, value) in pairs {
            let out = dict.set_item(key.clone(), value.clone());
            for bp in out.trace.into_steps() {
                trace.checkpoint(bp.point, &bp.state);
            }
            if let Some(run) = out.resize {
                resizes.push(run);
            }
            if let Err(e) = out.result {
                return InitOutcome {
                    dict,
                    trace,
                    resizes,
                    result: Err(e),
                };
            }
        }

        InitOutcome {
            dict,
            trace,
            resizes,
            result: Ok(()),
        }
    }

    fn snapshot(&self) -> DictSnapshot {
        DictSnapshot {
            slots: self.slots.clone(),
            used: self.used,
            fill: self.fill,
            key: None,
            value: None,
            hash_code: None,
            idx: None,
            perturb: None,
            target_idx: None,
        }
    }

    /// Insert or update. The probe scans occupied slots tracking a
    /// `target_idx`: an exact live duplicate claims it and stops the
    /// probe; otherwise the first tombstone seen is remembered for
    /// recycling but probing continues, since a duplicate further along still
    /// wins. Only when the loop ends at EMPTY with no prior claim does
    /// the EMPTY slot itself become the target.
    pub fn set_item(&mut self, key: PyValue, value: PyValue) -> SetOutcome {
        let mut trace = Trace::new();
        let mut snap = self.snapshot();
        snap.key = Some(key.clone());
        snap.value = Some(value.clone());
        trace.checkpoint("start-execution", &snap);

        let hash_code = match py_hash(&key) {
            Ok(h) => h,
            Err(e) => {
                return SetOutcome {
                    trace,
                    resize: None,
                    result: Err(e.into()),
                }
            }
        };
        snap.hash_code = Some(hash_code);
        trace.checkpoint("compute-hash", &snap);

        let size = self.size();
        let mut idx = compute_idx(hash_code, size);
        snap.idx = Some(idx);
        trace.checkpoint("compute-idx", &snap);

        let mut perturb = compute_perturb(hash_code);
        snap.perturb = Some(perturb);
        trace.checkpoint("compute-perturb", &snap);

        let mut target_idx: Option<usize> = None;
        trace.checkpoint("target-idx-none", &snap);

        loop {
            trace.checkpoint("check-collision", &snap);
            if self.slots[idx].is_empty() {
                break;
            }

            trace.checkpoint("check-dup-hash", &snap);
            if self.slots[idx].hash_code() == Some(hash_code) {
                trace.checkpoint("check-dup-key", &snap);
                if self.slots[idx].live_key() == Some(&key) {
                    target_idx = Some(idx);
                    snap.target_idx = target_idx;
                    trace.checkpoint("set-target-idx-found", &snap);
                    trace.checkpoint("check-dup-break", &snap);
                    break;
                }
            }

            trace.checkpoint("check-should-recycle", &snap);
            if target_idx.is_none() && self.slots[idx].is_tombstone() {
                target_idx = Some(idx);
                snap.target_idx = target_idx;
                trace.checkpoint("set-target-idx-recycle", &snap);
            }

            idx = next_idx(idx, perturb, size);
            snap.idx = Some(idx);
            trace.checkpoint("next-idx", &snap);
            perturb >>= PERTURB_SHIFT;
            snap.perturb = Some(perturb);
            trace.checkpoint("perturb-shift", &snap);
        }

        trace.checkpoint("check-target-idx-is-none", &snap);
        let target_idx = match target_idx {
            Some(t) => t,
            None => {
                snap.target_idx = Some(idx);
                trace.checkpoint("after-probing-assign-target-idx", &snap);
                idx
            }
        };

        trace.checkpoint("check-used-fill-increased", &snap);
        match &self.slots[target_idx] {
            Slot::Empty => {
                self.used += 1;
                snap.used = self.used;
                trace.checkpoint("inc-used", &snap);
                self.fill += 1;
                snap.fill = self.fill;
                trace.checkpoint("inc-fill", &snap);
            }
            Slot::Tombstone { .. } => {
                trace.checkpoint("check-recycle-used-increased", &snap);
                // Recycled: the tombstone already counted toward fill.
                self.used += 1;
                snap.used = self.used;
                trace.checkpoint("inc-used-2", &snap);
            }
            Slot::Occupied { .. } => {
                trace.checkpoint("check-recycle-used-increased", &snap);
            }
        }

        self.slots[target_idx] = Slot::Occupied {
            hash_code,
            key,
            value,
        };
        snap.slots = self.slots.clone();
        trace.checkpoint("assign-slot", &snap);

        trace.checkpoint("check-resize", &snap);
        let resize = if self.fill * 3 >= self.size() * 2 {
            trace.checkpoint("resize", &snap);
            Some(self.resize())
        } else {
            None
        };
        trace.checkpoint("done-no-return", &snap);

        SetOutcome {
            trace,
            resize,
            result: Ok(()),
        }
    }

    /// The shared probing routine of `get_item` and `del_item`: returns
    /// the index of the slot holding `key`. Tombstones never stop the
    /// probe; only EMPTY does, and that means the key is absent.
    fn lookdict(&self, key: &PyValue, trace: &mut Trace<DictSnapshot>) -> EngineResult<usize> {
        let mut snap = self.snapshot();
        snap.key = Some(key.clone());
        trace.checkpoint("start-execution-lookdict", &snap);

        let hash_code = py_hash(key)?;
        snap.hash_code = Some(hash_code);
        trace.checkpoint("compute-hash", &snap);

        let size = self.size();
        let mut idx = compute_idx(hash_code, size);
        snap.idx = Some(idx);
        trace.checkpoint("compute-idx", &snap);

        let mut perturb = compute_perturb(hash_code);
        snap.perturb = Some(perturb);
        trace.checkpoint("compute-perturb", &snap);

        loop {
            trace.checkpoint("check-not-found", &snap);
            if self.slots[idx].is_empty() {
                break;
            }

            trace.checkpoint("check-hash", &snap);
            if self.slots[idx].hash_code() == Some(hash_code) {
                trace.checkpoint("check-key", &snap);
                if self.slots[idx].live_key() == Some(key) {
                    trace.checkpoint("return-idx", &snap);
                    return Ok(idx);
                }
            }

            idx = next_idx(idx, perturb, size);
            snap.idx = Some(idx);
            trace.checkpoint("next-idx", &snap);
            perturb >>= PERTURB_SHIFT;
            snap.perturb = Some(perturb);
            trace.checkpoint("perturb-shift", &snap);
        }

        trace.checkpoint("raise", &snap);
        Err(EngineError::KeyNotFound)
    }

    /// Lookup; `KeyNotFound` propagates to the caller untouched.
    pub fn get_item(&self, key: &PyValue) -> GetOutcome {
        let mut trace = Trace::new();
        let mut entry = self.snapshot();
        entry.key = Some(key.clone());
        trace.checkpoint("start-execution-getitem", &entry);
        let result = self.lookdict(key, &mut trace).map(|idx| {
            let value = self.slots[idx]
                .live_value()
                .cloned()
                .unwrap_or(PyValue::None);
            let mut snap = self.snapshot();
            snap.key = Some(key.clone());
            snap.idx = Some(idx);
            snap.value = Some(value.clone());
            trace.checkpoint("return-value", &snap);
            value
        });
        GetOutcome { trace, result }
    }

    /// Delete: the slot becomes a tombstone keeping its stale hash,
    /// `used` drops, `fill` stays (tombstones still count toward the
    /// load factor).
    pub fn del_item(&mut self, key: &PyValue) -> DelOutcome {
        let mut trace = Trace::new();
        let mut entry = self.snapshot();
        entry.key = Some(key.clone());
        trace.checkpoint("start-execution-delitem", &entry);
        let idx = match self.lookdict(key, &mut trace) {
            Ok(idx) => idx,
            Err(e) => {
                return DelOutcome {
                    trace,
                    result: Err(e),
                }
            }
        };

        let hash_code = self.slots[idx]
            .hash_code()
            .unwrap_or_else(|| unreachable!("lookdict returned a live slot"));

        self.used -= 1;
        let mut snap = self.snapshot();
        snap.key = Some(key.clone());
        snap.idx = Some(idx);
        snap.hash_code = Some(hash_code);
        trace.checkpoint("dec-used", &snap);

        self.slots[idx] = Slot::Tombstone { hash_code };
        snap.slots = self.slots.clone();
        trace.checkpoint("replace-key-dummy", &snap);
        trace.checkpoint("replace-value-empty", &snap);

        DelOutcome {
            trace,
            result: Ok(()),
        }
    }

    /// Rehash into a table sized for the current `used` count. Tombstones
    /// are dropped (`fill` becomes `used`), live slots are re-inserted in
    /// original slot order, probing against the new table only.
    pub fn resize(&mut self) -> ResizeRun {
        let mut trace = Trace::new();
        let old_slots = std::mem::take(&mut self.slots);

        let mut snap = ResizeSnapshot {
            old_slots: old_slots.clone(),
            slots: Vec::new(),
            used: self.used,
            fill: self.fill,
            old_idx: None,
            hash_code: None,
            idx: None,
            perturb: None,
        };
        trace.checkpoint("start-execution", &snap);
        trace.checkpoint("assign-old-slots", &snap);

        let new_size = find_optimal_size(self.used);
        trace.checkpoint("compute-new-size", &snap);

        self.slots = vec![Slot::Empty; new_size];
        snap.slots = self.slots.clone();
        trace.checkpoint("new-empty-slots", &snap);

        self.fill = self.used;
        snap.fill = self.fill;
        trace.checkpoint("assign-fill", &snap);

        for (old_idx, slot) in old_slots.iter().enumerate() {
            snap.old_idx = Some(old_idx);
            trace.checkpoint("for-loop", &snap);

            trace.checkpoint("check-skip-empty-dummy", &snap);
            let (hash_code, key, value) = match slot {
                Slot::Occupied {
                    hash_code,
                    key,
                    value,
                } => (*hash_code, key.clone(), value.clone()),
                _ => continue,
            };

            let mut idx = compute_idx(hash_code, new_size);
            snap.hash_code = Some(hash_code);
            snap.idx = Some(idx);
            trace.checkpoint("compute-idx", &snap);

            let mut perturb = compute_perturb(hash_code);
            snap.perturb = Some(perturb);
            trace.checkpoint("compute-perturb", &snap);

            loop {
                trace.checkpoint("check-collision", &snap);
                if self.slots[idx].is_empty() {
                    break;
                }
                idx = next_idx(idx, perturb, new_size);
                snap.idx = Some(idx);
                trace.checkpoint("next-idx", &snap);
                perturb >>= PERTURB_SHIFT;
                snap.perturb = Some(perturb);
                trace.checkpoint("perturb-shift", &snap);
            }

            self.slots[idx] = Slot::Occupied {
                hash_code,
                key,
                value,
            };
            snap.slots = self.slots.clone();
            trace.checkpoint("assign-slot", &snap);
        }

        trace.checkpoint("done-no-return", &snap);
        ResizeRun { trace }
    }
}

/// The smallest power-of-two size that keeps `used` live entries
/// comfortably under the 2/3 threshold after a rehash: start at the
/// minimum size and double while `size <= used * GROWTH_FACTOR`.
fn find_optimal_size(used: usize) -> usize {
    let mut size = INITIAL_SIZE;
    while size <= used * GROWTH_FACTOR {
        size *= 2;
    }
    size
}
