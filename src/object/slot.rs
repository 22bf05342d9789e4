//! Slot-level representation of open-addressed tables.
//!
//! Probing needs a three-way slot state: never used, deleted, occupied.
//! Both table encodings model it as an explicit tagged enum instead of
//! sentinel objects compared by identity.

use serde::Serialize;

use crate::{hashing::HashCode, object::PyValue};

/// One slot of the struct-of-slots table used by the real dict.
///
/// A tombstone keeps the stale hash code of the deleted key: probing is
/// gated on the key marker, so the leftover hash is harmless, and CPython
/// leaves it in place too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Slot {
    Empty,
    Tombstone {
        hash_code: HashCode,
    },
    Occupied {
        hash_code: HashCode,
        key: PyValue,
        value: PyValue,
    },
}

impl Slot {
    /// The cached hash, present iff the slot was ever written to.
    pub fn hash_code(&self) -> Option<HashCode> {
        match self {
            Slot::Empty => None,
            Slot::Tombstone { hash_code } => Some(*hash_code),
            Slot::Occupied { hash_code, .. } => Some(*hash_code),
        }
    }

    /// The live key, if any. Tombstones have none: their key marker must
    /// never compare equal to a real value.
    pub fn live_key(&self) -> Option<&PyValue> {
        match self {
            Slot::Occupied { key, .. } => Some(key),
            _ => None,
        }
    }

    /// The live value, if any. A tombstone presents no value.
    pub fn live_value(&self) -> Option<&PyValue> {
        match self {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Slot::Tombstone { .. })
    }

    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied { .. })
    }
}

/// Key marker of the simple parallel-array table, where hash codes and
/// keys live in two index-aligned vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SlotKey {
    Empty,
    Dummy,
    Key(PyValue),
}

impl SlotKey {
    pub fn is_empty(&self) -> bool {
        matches!(self, SlotKey::Empty)
    }

    pub fn is_dummy(&self) -> bool {
        matches!(self, SlotKey::Dummy)
    }

    /// The live key, if any; a `Dummy` marker never matches a real key.
    pub fn live(&self) -> Option<&PyValue> {
        match self {
            SlotKey::Key(k) => Some(k),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tombstone_keeps_hash_but_no_value() {
        let slot = Slot::Tombstone { hash_code: 42 };
        assert_eq!(slot.hash_code(), Some(42));
        assert_eq!(slot.live_key(), None);
        assert_eq!(slot.live_value(), None);
    }

    #[test]
    fn empty_slot_has_no_hash() {
        assert_eq!(Slot::Empty.hash_code(), None);
    }

    #[test]
    fn dummy_marker_matches_no_key() {
        assert_eq!(SlotKey::Dummy.live(), None);
        assert!(SlotKey::Dummy.live() != Some(&PyValue::None));
    }
}
