//! The simple open-addressed hash table: two index-aligned arrays
//! (`hash_codes`, `keys`), linear probing (`idx = (idx + 1) % size`),
//! tombstone deletion, resize by full rehash.
//!
//! Every operation records a breakpoint trace; the table itself is a
//! plain value that operations take by reference and return anew.

use serde::Serialize;

use crate::{
    error::{EngineError, EngineResult},
    hashing::{py_hash, HashCode},
    object::{PyValue, SlotKey},
    trace::Trace,
};

use super::compute_idx;

/// The parallel-array table. `hash_codes[i]` caches the hash of
/// `keys[i]`; both vectors always have the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimpleTable {
    pub hash_codes: Vec<Option<HashCode>>,
    pub keys: Vec<SlotKey>,
}

impl SimpleTable {
    pub fn with_size(size: usize) -> Self {
        SimpleTable {
            hash_codes: vec![None; size],
            keys: vec![SlotKey::Empty; size],
        }
    }

    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// Live keys in slot order, tombstones and empties skipped.
    pub fn live_keys(&self) -> Vec<&PyValue> {
        self.keys.iter().filter_map(|k| k.live()).collect()
    }
}

/// Snapshot taken by [`create_new`]: the input list plus the table being
/// built and the probe cursor.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSnapshot {
    pub from_keys: Vec<PyValue>,
    pub from_keys_idx: Option<usize>,
    pub hash_codes: Vec<Option<HashCode>>,
    pub keys: Vec<SlotKey>,
    pub key: Option<PyValue>,
    pub hash_code: Option<HashCode>,
    pub idx: Option<usize>,
}

/// Snapshot taken by the single-key operations (search, remove, insert).
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSnapshot {
    pub hash_codes: Vec<Option<HashCode>>,
    pub keys: Vec<SlotKey>,
    pub key: PyValue,
    pub hash_code: Option<HashCode>,
    pub idx: Option<usize>,
}

/// Snapshot taken by [`resize`]: old and new arrays side by side.
#[derive(Debug, Clone, Serialize)]
pub struct RehashSnapshot {
    pub hash_codes: Vec<Option<HashCode>>,
    pub keys: Vec<SlotKey>,
    pub new_hash_codes: Vec<Option<HashCode>>,
    pub new_keys: Vec<SlotKey>,
    pub old_idx: Option<usize>,
    pub key: Option<PyValue>,
    pub hash_code: Option<HashCode>,
    pub idx: Option<usize>,
}

pub struct CreateOutcome {
    pub table: SimpleTable,
    pub trace: Trace<CreateSnapshot>,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub found: bool,
    pub trace: Trace<ProbeSnapshot>,
}

pub struct RemoveOutcome {
    pub table: SimpleTable,
    pub trace: Trace<ProbeSnapshot>,
    /// `Err(KeyNotFound)` when the probe hit EMPTY before the key.
    pub result: EngineResult<()>,
}

pub struct InsertOutcome {
    pub table: SimpleTable,
    pub trace: Trace<ProbeSnapshot>,
    /// `Err(TableFull)` when no EMPTY slot was left to claim.
    pub result: EngineResult<()>,
}

pub struct ResizeOutcome {
    pub table: SimpleTable,
    pub trace: Trace<RehashSnapshot>,
}

/// Build a table of size `2 * from_keys.len()` and insert every key in
/// input order. A key already present (same cached hash, then same key)
/// stops probing without reinsertion, so duplicates collapse.
pub fn create_new(from_keys: &[PyValue]) -> EngineResult<CreateOutcome> {
    let size = 2 * from_keys.len();
    let mut table = SimpleTable::with_size(size);
    let mut trace = Trace::new();

    let mut snap = CreateSnapshot {
        from_keys: from_keys.to_vec(),
        from_keys_idx: None,
        hash_codes: table.hash_codes.clone(),
        keys: table.keys.clone(),
        key: None,
        hash_code: None,
        idx: None,
    };
    trace.checkpoint("create-new-empty-hashes", &snap);
    trace.checkpoint("create-new-empty-keys", &snap);

    for (from_keys_idx, key) in from_keys.iter().enumerate() {
        snap.from_keys_idx = Some(from_keys_idx);
        snap.key = Some(key.clone());
        trace.checkpoint("for-loop", &snap);

        let hash_code = py_hash(key)?;
        snap.hash_code = Some(hash_code);
        trace.checkpoint("compute-hash", &snap);

        let mut idx = compute_idx(hash_code, size);
        snap.idx = Some(idx);
        trace.checkpoint("compute-idx", &snap);

        loop {
            trace.checkpoint("check-collision", &snap);
            if table.keys[idx].is_empty() {
                break;
            }

            trace.checkpoint("check-dup-hash", &snap);
            if table.hash_codes[idx] == Some(hash_code) {
                trace.checkpoint("check-dup-key", &snap);
                if table.keys[idx].live() == Some(key) {
                    trace.checkpoint("check-dup-break", &snap);
                    break;
                }
            }

            idx = (idx + 1) % size;
            snap.idx = Some(idx);
            trace.checkpoint("next-idx", &snap);
        }

        table.hash_codes[idx] = Some(hash_code);
        table.keys[idx] = SlotKey::Key(key.clone());
        snap.hash_codes = table.hash_codes.clone();
        snap.keys = table.keys.clone();
        trace.checkpoint("assign-elem", &snap);
    }

    snap.from_keys_idx = None;
    snap.key = None;
    trace.checkpoint("return-lists", &snap);

    Ok(CreateOutcome { table, trace })
}

/// Membership test. A probe that reaches EMPTY converts the miss into a
/// plain `false` instead of an error.
pub fn search(table: &SimpleTable, key: &PyValue) -> EngineResult<SearchOutcome> {
    let (found, trace, _) = probe_existing(table, key, Mode::Search)?;
    Ok(SearchOutcome { found, trace })
}

/// Delete by replacing the key marker with DUMMY. The cached hash stays
/// in place: only the key marker gates probing.
pub fn remove(table: &SimpleTable, key: &PyValue) -> EngineResult<RemoveOutcome> {
    let (found, trace, table) = probe_existing(table, key, Mode::Remove)?;
    let result = if found {
        Ok(())
    } else {
        Err(EngineError::KeyNotFound)
    };
    Ok(RemoveOutcome {
        table,
        trace,
        result,
    })
}

enum Mode {
    Search,
    Remove,
}

/// Shared probe loop of `search` and `remove`: identical stepping,
/// different terminal action.
fn probe_existing(
    table: &SimpleTable,
    key: &PyValue,
    mode: Mode,
) -> EngineResult<(bool, Trace<ProbeSnapshot>, SimpleTable)> {
    let mut table = table.clone();
    let size = table.size();
    let mut trace = Trace::new();

    let mut snap = ProbeSnapshot {
        hash_codes: table.hash_codes.clone(),
        keys: table.keys.clone(),
        key: key.clone(),
        hash_code: None,
        idx: None,
    };

    let hash_code = py_hash(key)?;
    snap.hash_code = Some(hash_code);
    trace.checkpoint("compute-hash", &snap);

    if size == 0 {
        // Nothing to probe; a zero-size table holds no keys.
        match mode {
            Mode::Search => trace.checkpoint("return-false", &snap),
            Mode::Remove => trace.checkpoint("throw-key-error", &snap),
        }
        return Ok((false, trace, table));
    }

    let mut idx = compute_idx(hash_code, size);
    snap.idx = Some(idx);
    trace.checkpoint("compute-idx", &snap);

    loop {
        trace.checkpoint("check-not-found", &snap);
        if table.keys[idx].is_empty() {
            break;
        }

        trace.checkpoint("check-hash", &snap);
        if table.hash_codes[idx] == Some(hash_code) {
            trace.checkpoint("check-key", &snap);
            if table.keys[idx].live() == Some(key) {
                match mode {
                    Mode::Remove => {
                        table.keys[idx] = SlotKey::Dummy;
                        snap.keys = table.keys.clone();
                        trace.checkpoint("assign-dummy", &snap);
                        trace.checkpoint("return", &snap);
                    }
                    Mode::Search => trace.checkpoint("return-true", &snap),
                }
                return Ok((true, trace, table));
            }
        }

        idx = (idx + 1) % size;
        snap.idx = Some(idx);
        trace.checkpoint("next-idx", &snap);
    }

    match mode {
        Mode::Search => trace.checkpoint("return-false", &snap),
        Mode::Remove => trace.checkpoint("throw-key-error", &snap),
    }
    Ok((false, trace, table))
}

/// Rehash into a table of double size. Old slots are walked in their
/// original order; EMPTY and DUMMY slots are skipped, so tombstones are
/// dropped. Collisions are resolved against the new table only.
pub fn resize(table: &SimpleTable) -> EngineResult<ResizeOutcome> {
    let new_size = 2 * table.size();
    let mut new_table = SimpleTable::with_size(new_size);
    let mut trace = Trace::new();

    let mut snap = RehashSnapshot {
        hash_codes: table.hash_codes.clone(),
        keys: table.keys.clone(),
        new_hash_codes: new_table.hash_codes.clone(),
        new_keys: new_table.keys.clone(),
        old_idx: None,
        key: None,
        hash_code: None,
        idx: None,
    };
    trace.checkpoint("create-new-empty-hashes", &snap);
    trace.checkpoint("create-new-empty-keys", &snap);

    for (old_idx, (hash_code, key)) in table
        .hash_codes
        .iter()
        .zip(table.keys.iter())
        .enumerate()
    {
        snap.old_idx = Some(old_idx);
        snap.key = key.live().cloned();
        snap.hash_code = *hash_code;
        trace.checkpoint("for-loop", &snap);

        trace.checkpoint("check-skip-empty-dummy", &snap);
        let (hash_code, key) = match (hash_code, key.live()) {
            (Some(h), Some(k)) => (*h, k),
            _ => {
                trace.checkpoint("continue", &snap);
                continue;
            }
        };

        let mut idx = compute_idx(hash_code, new_size);
        snap.idx = Some(idx);
        trace.checkpoint("compute-idx", &snap);

        loop {
            trace.checkpoint("check-collision", &snap);
            if new_table.keys[idx].is_empty() {
                break;
            }
            idx = (idx + 1) % new_size;
            snap.idx = Some(idx);
            trace.checkpoint("next-idx", &snap);
        }

        new_table.hash_codes[idx] = Some(hash_code);
        new_table.keys[idx] = SlotKey::Key(key.clone());
        snap.new_hash_codes = new_table.hash_codes.clone();
        snap.new_keys = new_table.keys.clone();
        trace.checkpoint("assign-elem", &snap);
    }

    trace.checkpoint("return-lists", &snap);
    Ok(ResizeOutcome {
        table: new_table,
        trace,
    })
}

/// Insert one key with the same probe loop as [`create_new`]. Resizing is
/// the caller's responsibility here; a table with no EMPTY slot (and no
/// duplicate to collapse into) fails with `TableFull`.
pub fn insert(table: &SimpleTable, key: &PyValue) -> EngineResult<InsertOutcome> {
    let mut table = table.clone();
    let size = table.size();
    let mut trace = Trace::new();

    let mut snap = ProbeSnapshot {
        hash_codes: table.hash_codes.clone(),
        keys: table.keys.clone(),
        key: key.clone(),
        hash_code: None,
        idx: None,
    };

    let hash_code = py_hash(key)?;
    snap.hash_code = Some(hash_code);
    trace.checkpoint("compute-hash", &snap);

    if size == 0 {
        return Ok(InsertOutcome {
            table,
            trace,
            result: Err(EngineError::TableFull { size }),
        });
    }

    let mut idx = compute_idx(hash_code, size);
    snap.idx = Some(idx);
    trace.checkpoint("compute-idx", &snap);

    let mut probed = 0;
    loop {
        trace.checkpoint("check-collision", &snap);
        if table.keys[idx].is_empty() {
            break;
        }

        trace.checkpoint("check-dup-hash", &snap);
        if table.hash_codes[idx] == Some(hash_code) {
            trace.checkpoint("check-dup-key", &snap);
            if table.keys[idx].live() == Some(key) {
                trace.checkpoint("check-dup-break", &snap);
                break;
            }
        }

        probed += 1;
        if probed >= size {
            // Linear probing has visited every slot: nothing EMPTY, no
            // duplicate to overwrite.
            return Ok(InsertOutcome {
                table,
                trace,
                result: Err(EngineError::TableFull { size }),
            });
        }

        idx = (idx + 1) % size;
        snap.idx = Some(idx);
        trace.checkpoint("next-idx", &snap);
    }

    table.hash_codes[idx] = Some(hash_code);
    table.keys[idx] = SlotKey::Key(key.clone());
    snap.hash_codes = table.hash_codes.clone();
    snap.keys = table.keys.clone();
    trace.checkpoint("assign-elem", &snap);

    Ok(InsertOutcome {
        table,
        trace,
        result: Ok(()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(vals: &[&str]) -> Vec<PyValue> {
        vals.iter().map(|s| PyValue::from(*s)).collect()
    }

    #[test]
    fn create_new_sizes_table_to_twice_input() {
        let out = create_new(&keys(&["a", "b", "c"])).unwrap();
        assert_eq!(out.table.size(), 6);
        assert_eq!(out.table.live_keys().len(), 3);
    }

    #[test]
    fn create_new_collapses_duplicates() {
        let out = create_new(&keys(&["a", "b", "a", "a"])).unwrap();
        assert_eq!(out.table.live_keys().len(), 2);
        // Size still reflects the raw input length.
        assert_eq!(out.table.size(), 8);
    }

    #[test]
    fn create_new_of_nothing_is_empty() {
        let out = create_new(&[]).unwrap();
        assert_eq!(out.table.size(), 0);
        let s = search(&out.table, &PyValue::from("x")).unwrap();
        assert!(!s.found);
    }

    #[test]
    fn remove_leaves_hash_in_place() {
        let out = create_new(&keys(&["a", "b"])).unwrap();
        let removed = remove(&out.table, &PyValue::from("a")).unwrap();
        removed.result.unwrap();

        let dummy_idx = removed
            .table
            .keys
            .iter()
            .position(|k| k.is_dummy())
            .unwrap();
        assert!(removed.table.hash_codes[dummy_idx].is_some());
    }

    #[test]
    fn remove_missing_key_is_key_error() {
        let out = create_new(&keys(&["a"])).unwrap();
        let removed = remove(&out.table, &PyValue::from("zzz")).unwrap();
        assert_eq!(removed.result, Err(EngineError::KeyNotFound));
        assert_eq!(removed.trace.last().unwrap().point, "throw-key-error");
    }

    #[test]
    fn insert_into_full_table_reports_table_full() {
        // Size-2 table, both slots occupied via direct construction.
        let mut table = SimpleTable::with_size(2);
        for (i, k) in ["a", "b"].iter().enumerate() {
            let h = py_hash(&PyValue::from(*k)).unwrap();
            table.hash_codes[i] = Some(h);
            table.keys[i] = SlotKey::Key(PyValue::from(*k));
        }
        let out = insert(&table, &PyValue::from("c")).unwrap();
        assert!(matches!(out.result, Err(EngineError::TableFull { size: 2 })));
    }

    #[test]
    fn unhashable_key_fails_before_probing() {
        let out = create_new(&keys(&["a"])).unwrap();
        let err = search(&out.table, &PyValue::List(vec![])).unwrap_err();
        assert!(matches!(err, EngineError::Hash(_)));
    }

    #[test]
    fn trace_records_probe_steps() {
        let out = create_new(&keys(&["a"])).unwrap();
        let points = out.trace.points();
        assert_eq!(points[0], "create-new-empty-hashes");
        assert!(points.contains(&"compute-hash"));
        assert!(points.contains(&"assign-elem"));
        assert_eq!(*points.last().unwrap(), "return-lists");
    }
}
