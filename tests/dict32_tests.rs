use dictrace::{
    engine::{Dict32, INITIAL_SIZE},
    error::EngineError,
    object::PyValue,
};

fn s(v: &str) -> PyValue {
    PyValue::from(v)
}

fn check_invariants(d: &Dict32) {
    assert!(d.used() <= d.fill(), "used={} fill={}", d.used(), d.fill());
    assert!(d.fill() <= d.size(), "fill={} size={}", d.fill(), d.size());
    assert!(d.size().is_power_of_two());
    assert!(d.size() >= INITIAL_SIZE);
    // The load factor holds between operations.
    assert!(d.fill() * 3 < d.size() * 2);

    let live = d
        .slots()
        .iter()
        .filter(|slot| slot.is_occupied())
        .count();
    let non_empty = d.slots().iter().filter(|slot| !slot.is_empty()).count();
    assert_eq!(live, d.used());
    assert_eq!(non_empty, d.fill());
}

#[test]
fn string_scenario_round_trip() {
    let mut d = Dict32::new();
    for (k, v) in [("abde", 1), ("cdef", 4), ("world", 9), ("hmmm", 16), ("hello", 25)] {
        d.set_item(s(k), v.into()).result.unwrap();
        check_invariants(&d);
    }

    assert_eq!(d.len(), 5);
    assert_eq!(d.get_item(&s("world")).result.unwrap(), PyValue::Int(9));
    assert_eq!(d.get_item(&s("hmmm")).result.unwrap(), PyValue::Int(16));
    assert_eq!(d.get_item(&s("missing")).result, Err(EngineError::KeyNotFound));
}

#[test]
fn overwrite_then_delete_then_reinsert() {
    let mut d = Dict32::new();
    d.set_item(s("k"), 1.into()).result.unwrap();
    d.set_item(s("k"), 2.into()).result.unwrap();
    assert_eq!(d.len(), 1);

    d.del_item(&s("k")).result.unwrap();
    assert!(d.is_empty());
    assert_eq!(d.get_item(&s("k")).result, Err(EngineError::KeyNotFound));
    check_invariants(&d);

    d.set_item(s("k"), 3.into()).result.unwrap();
    assert_eq!(d.get_item(&s("k")).result.unwrap(), PyValue::Int(3));
    check_invariants(&d);
}

#[test]
fn delete_missing_key_is_key_error_and_leaves_dict_alone() {
    let mut d = Dict32::new();
    d.set_item(s("a"), 1.into()).result.unwrap();
    let before = d.clone();

    let out = d.del_item(&s("b"));
    assert_eq!(out.result, Err(EngineError::KeyNotFound));
    assert_eq!(out.trace.last().unwrap().point, "raise");
    assert_eq!(d, before);
}

#[test]
fn none_key_is_a_regular_key() {
    let mut d = Dict32::new();
    d.set_item(PyValue::None, s("nil")).result.unwrap();
    assert_eq!(
        d.get_item(&PyValue::None).result.unwrap(),
        PyValue::Str("nil".into())
    );
    d.del_item(&PyValue::None).result.unwrap();
    assert_eq!(d.get_item(&PyValue::None).result, Err(EngineError::KeyNotFound));
}

#[test]
fn unhashable_key_is_rejected_by_every_operation() {
    let mut d = Dict32::new();
    let key = PyValue::List(vec![PyValue::Int(1)]);

    let out = d.set_item(key.clone(), 1.into());
    assert!(matches!(out.result, Err(EngineError::Hash(_))));
    assert!(d.is_empty());

    assert!(matches!(d.get_item(&key).result, Err(EngineError::Hash(_))));
    assert!(matches!(d.del_item(&key).result, Err(EngineError::Hash(_))));
}

#[test]
fn growth_across_many_inserts() {
    let mut d = Dict32::new();
    for i in 0..100 {
        d.set_item(i.into(), (i * 2).into()).result.unwrap();
        check_invariants(&d);
    }
    assert_eq!(d.len(), 100);
    for i in 0..100 {
        assert_eq!(
            d.get_item(&i.into()).result.unwrap(),
            PyValue::Int(i * 2),
            "key {i}"
        );
    }
}

#[test]
fn interleaved_deletes_force_tombstone_cleanup() {
    let mut d = Dict32::new();
    for i in 0..20 {
        d.set_item(i.into(), i.into()).result.unwrap();
    }
    for i in 0..20 {
        if i % 2 == 0 {
            d.del_item(&i.into()).result.unwrap();
        }
    }
    // Keep inserting until a resize sweeps the tombstones away.
    for i in 100..120 {
        d.set_item(i.into(), i.into()).result.unwrap();
        check_invariants(&d);
    }

    for i in 0..20 {
        let got = d.get_item(&i.into()).result;
        if i % 2 == 0 {
            assert_eq!(got, Err(EngineError::KeyNotFound), "key {i}");
        } else {
            assert_eq!(got.unwrap(), PyValue::Int(i), "key {i}");
        }
    }
}

#[test]
fn from_pairs_matches_sequential_inserts() {
    let pairs: Vec<(PyValue, PyValue)> = [("abde", 1), ("cdef", 4), ("world", 9)]
        .iter()
        .map(|(k, v)| (s(k), PyValue::Int(*v)))
        .collect();

    let out = Dict32::from_pairs(&pairs);
    out.result.unwrap();

    let mut sequential = Dict32::new();
    for (k, v) in &pairs {
        sequential.set_item(k.clone(), v.clone()).result.unwrap();
    }
    assert_eq!(out.dict, sequential);
}

#[test]
fn get_trace_shows_probe_walk_under_collisions() {
    let mut d = Dict32::new();
    // Keys 0 and 8 both land on slot 0 in an 8-slot table.
    d.set_item(0.into(), s("a")).result.unwrap();
    d.set_item(8.into(), s("b")).result.unwrap();

    let out = d.get_item(&8.into());
    let points = out.trace.points();
    assert!(points.contains(&"next-idx"));
    assert_eq!(*points.last().unwrap(), "return-value");

    // The collision is visible in the recorded states: the probe cursor
    // changed between the first and last check.
    let idxs: Vec<_> = out
        .trace
        .steps()
        .iter()
        .filter(|bp| bp.point == "check-not-found")
        .map(|bp| bp.state.idx)
        .collect();
    assert!(idxs.len() >= 2);
    assert_ne!(idxs.first(), idxs.last());
}
