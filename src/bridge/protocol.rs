//! Wire format of the bridge.
//!
//! Values travel as JSON primitives with two tagged escape hatches:
//! `{"type": "None"}` for the None sentinel (an optional precomputed
//! `hash` is accepted and ignored; the engine's constant is
//! authoritative) and `{"type": "DUMMY"}` for tombstone key markers.
//! Slot hash codes are emitted as decimal strings and accepted as either
//! strings or integers. Anything else (floats, nulls where a value is
//! required, missing fields) is rejected as malformed, never coerced.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    engine::Dict32,
    error::{BridgeError, BridgeResult},
    hashing::HashCode,
    object::{PyValue, Slot},
};

#[derive(Debug, Deserialize)]
pub struct Request {
    #[serde(rename = "self")]
    pub state: WireState,
    pub op: String,
    #[serde(default)]
    pub args: Args,
}

#[derive(Debug, Default, Deserialize)]
pub struct Args {
    pub key: Option<Value>,
    pub value: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireState {
    pub slots: Option<Vec<WireSlot>>,
    pub used: usize,
    pub fill: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WireSlot {
    #[serde(rename = "hashCode")]
    pub hash_code: Value,
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub exception: bool,
    pub result: Value,
    #[serde(rename = "self")]
    pub state: WireState,
}

/// Decode a user value from its wire form. JSON `null` is the EMPTY
/// marker and never a value; `DUMMY` is only meaningful as a slot key.
fn parse_value(v: &Value) -> BridgeResult<PyValue> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .map(PyValue::Int)
            .ok_or_else(|| BridgeError::MalformedValue(format!("non-integer number: {n}"))),
        Value::String(s) => Ok(PyValue::Str(s.clone())),
        Value::Array(items) => Ok(PyValue::List(
            items.iter().map(parse_value).collect::<BridgeResult<_>>()?,
        )),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("None") => Ok(PyValue::None),
            Some("DUMMY") => Err(BridgeError::MalformedValue(
                "DUMMY is a slot marker, not a value".into(),
            )),
            _ => Err(BridgeError::MalformedValue(v.to_string())),
        },
        _ => Err(BridgeError::MalformedValue(v.to_string())),
    }
}

fn dump_value(v: &PyValue) -> Value {
    match v {
        PyValue::None => json!({"type": "None"}),
        PyValue::Int(x) => json!(x),
        PyValue::Str(s) => json!(s),
        PyValue::List(items) => Value::Array(items.iter().map(dump_value).collect()),
    }
}

/// Hash codes arrive as decimal strings (the historical dump format) or
/// plain integers; `null` means the slot never held one.
fn parse_hash_code(v: &Value) -> BridgeResult<Option<HashCode>> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => s
            .parse::<i64>()
            .map(Some)
            .map_err(|_| BridgeError::MalformedValue(format!("bad hashCode: {s:?}"))),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| BridgeError::MalformedValue(format!("bad hashCode: {n}"))),
        other => Err(BridgeError::MalformedValue(format!(
            "bad hashCode: {other}"
        ))),
    }
}

fn parse_slot(wire: &WireSlot) -> BridgeResult<Slot> {
    let hash_code = parse_hash_code(&wire.hash_code)?;

    if wire.key.is_null() {
        return match hash_code {
            // A never-used slot carries no hash.
            None => Ok(Slot::Empty),
            Some(_) => Err(BridgeError::MalformedValue(
                "empty slot with a hash code".into(),
            )),
        };
    }

    if wire.key.get("type").and_then(Value::as_str) == Some("DUMMY") {
        let hash_code =
            hash_code.ok_or(BridgeError::MissingField("hashCode on tombstone slot"))?;
        return Ok(Slot::Tombstone { hash_code });
    }

    let key = parse_value(&wire.key)?;
    if wire.value.is_null() {
        return Err(BridgeError::MissingField("value on occupied slot"));
    }
    let value = parse_value(&wire.value)?;
    let hash_code = hash_code.ok_or(BridgeError::MissingField("hashCode on occupied slot"))?;

    Ok(Slot::Occupied {
        hash_code,
        key,
        value,
    })
}

fn dump_slot(slot: &Slot) -> WireSlot {
    match slot {
        Slot::Empty => WireSlot {
            hash_code: Value::Null,
            key: Value::Null,
            value: Value::Null,
        },
        Slot::Tombstone { hash_code } => WireSlot {
            hash_code: json!(hash_code.to_string()),
            key: json!({"type": "DUMMY"}),
            value: Value::Null,
        },
        Slot::Occupied {
            hash_code,
            key,
            value,
        } => WireSlot {
            hash_code: json!(hash_code.to_string()),
            key: dump_value(key),
            value: dump_value(value),
        },
    }
}

/// Restore a dict from wire state. `slots: null` is the uninitialized
/// table and restores to a fresh 8-slot dict. A non-null slot array must
/// be one the engine itself could have produced; anything else is
/// rejected before it reaches a probe loop.
pub fn restore_state(state: &WireState) -> BridgeResult<Dict32> {
    match &state.slots {
        None => Ok(Dict32::new()),
        Some(slots) => {
            let slots: Vec<Slot> = slots.iter().map(parse_slot).collect::<BridgeResult<_>>()?;
            validate_restored(&slots, state.used, state.fill)?;
            Ok(Dict32::from_parts(slots, state.used, state.fill))
        }
    }
}

/// Probing divides by the slot count and terminates only on an EMPTY
/// slot, so a zero-length array, counters that contradict the slots, or
/// a table at or over the 2/3 load factor would panic or spin forever.
fn validate_restored(slots: &[Slot], used: usize, fill: usize) -> BridgeResult<()> {
    if slots.is_empty() {
        return Err(BridgeError::MalformedValue("zero-length slot array".into()));
    }

    let live = slots.iter().filter(|s| s.is_occupied()).count();
    let non_empty = slots.iter().filter(|s| !s.is_empty()).count();
    if used != live || fill != non_empty {
        return Err(BridgeError::MalformedValue(format!(
            "counters disagree with slots: used={used} (live {live}), fill={fill} (non-empty {non_empty})"
        )));
    }

    if fill * 3 >= slots.len() * 2 {
        return Err(BridgeError::MalformedValue(format!(
            "overfull table: fill={fill} of {} slots",
            slots.len()
        )));
    }

    Ok(())
}

pub fn dump_state(dict: &Dict32) -> WireState {
    WireState {
        slots: Some(dict.slots().iter().map(dump_slot).collect()),
        used: dict.used(),
        fill: dict.fill(),
    }
}

fn require<'a>(arg: &'a Option<Value>, name: &'static str) -> BridgeResult<&'a Value> {
    arg.as_ref().ok_or(BridgeError::MissingField(name))
}

/// Execute one request against its own table state. Algorithmic failures
/// (`KeyError`, unhashable keys) come back as an exception-flagged
/// response; protocol failures bubble up as `Err` for the caller to wrap.
pub fn dispatch(req: &Request) -> BridgeResult<Response> {
    let mut dict = restore_state(&req.state)?;
    debug!(op = %req.op, used = dict.used(), fill = dict.fill(), "dispatching");

    let (exception, result) = match req.op.as_str() {
        "__init__" => {
            dict = Dict32::new();
            (false, Value::Null)
        }
        "__getitem__" => {
            let key = parse_value(require(&req.args.key, "key")?)?;
            let out = dict.get_item(&key);
            match out.result {
                Ok(value) => (false, dump_value(&value)),
                Err(_) => (true, Value::Null),
            }
        }
        "__setitem__" => {
            let key = parse_value(require(&req.args.key, "key")?)?;
            let value = parse_value(require(&req.args.value, "value")?)?;
            let out = dict.set_item(key, value);
            (out.result.is_err(), Value::Null)
        }
        "__delitem__" => {
            let key = parse_value(require(&req.args.key, "key")?)?;
            let out = dict.del_item(&key);
            (out.result.is_err(), Value::Null)
        }
        other => return Err(BridgeError::UnknownOperation(other.to_string())),
    };

    Ok(Response {
        exception,
        result,
        state: dump_state(&dict),
    })
}

/// Process one request line into one response line. Every failure mode
/// still produces a response: the bridge acknowledges requests, it never
/// goes silent on them.
pub fn handle_line(line: &str) -> String {
    let response = match serde_json::from_str::<Request>(line) {
        Ok(req) => match dispatch(&req) {
            Ok(resp) => resp,
            Err(e) => error_response(Some(&req.state), &e),
        },
        Err(e) => error_response(None, &BridgeError::Serde(e)),
    };
    // Response is a plain data struct; serialization cannot fail.
    serde_json::to_string(&response).unwrap_or_else(|_| {
        r#"{"exception":true,"result":null,"self":{"slots":null,"used":0,"fill":0}}"#.to_string()
    })
}

fn error_response(state: Option<&WireState>, err: &BridgeError) -> Response {
    tracing::warn!(error = %err, "request failed");
    let state = state
        .and_then(|s| restore_state(s).ok())
        .map(|d| dump_state(&d))
        .unwrap_or(WireState {
            slots: None,
            used: 0,
            fill: 0,
        });
    Response {
        exception: true,
        result: Value::Null,
        state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uninitialized() -> Value {
        json!({"slots": null, "used": 0, "fill": 0})
    }

    fn handle(req: Value) -> Value {
        serde_json::from_str(&handle_line(&req.to_string())).unwrap()
    }

    #[test]
    fn init_returns_eight_empty_slots() {
        let resp = handle(json!({"self": uninitialized(), "op": "__init__", "args": {}}));
        assert_eq!(resp["exception"], json!(false));
        assert_eq!(resp["self"]["slots"].as_array().unwrap().len(), 8);
        assert_eq!(resp["self"]["used"], json!(0));
    }

    #[test]
    fn set_then_get_round_trip() {
        let resp = handle(json!({
            "self": uninitialized(),
            "op": "__setitem__",
            "args": {"key": "world", "value": 9},
        }));
        assert_eq!(resp["exception"], json!(false));

        let resp = handle(json!({
            "self": resp["self"],
            "op": "__getitem__",
            "args": {"key": "world"},
        }));
        assert_eq!(resp["exception"], json!(false));
        assert_eq!(resp["result"], json!(9));
    }

    #[test]
    fn get_missing_key_flags_exception() {
        let resp = handle(json!({
            "self": uninitialized(),
            "op": "__getitem__",
            "args": {"key": "nope"},
        }));
        assert_eq!(resp["exception"], json!(true));
        assert_eq!(resp["result"], json!(null));
    }

    #[test]
    fn delete_emits_dummy_marker_with_stale_hash() {
        let resp = handle(json!({
            "self": uninitialized(),
            "op": "__setitem__",
            "args": {"key": 0, "value": "v"},
        }));
        let resp = handle(json!({
            "self": resp["self"],
            "op": "__delitem__",
            "args": {"key": 0},
        }));
        assert_eq!(resp["exception"], json!(false));
        let slot = &resp["self"]["slots"][0];
        assert_eq!(slot["key"], json!({"type": "DUMMY"}));
        assert_eq!(slot["hashCode"], json!("0"));
        assert_eq!(slot["value"], json!(null));
        assert_eq!(resp["self"]["fill"], json!(1));
        assert_eq!(resp["self"]["used"], json!(0));
    }

    #[test]
    fn none_key_is_tagged_and_hashes_to_pinned_constant() {
        let resp = handle(json!({
            "self": uninitialized(),
            "op": "__setitem__",
            "args": {"key": {"type": "None", "hash": "-9223372036581563745"}, "value": 1},
        }));
        assert_eq!(resp["exception"], json!(false));
        let slots = resp["self"]["slots"].as_array().unwrap();
        let occupied: Vec<_> = slots.iter().filter(|s| !s["key"].is_null()).collect();
        assert_eq!(occupied.len(), 1);
        assert_eq!(occupied[0]["key"], json!({"type": "None"}));
        assert_eq!(occupied[0]["hashCode"], json!("-9223372036581563745"));
    }

    #[test]
    fn unknown_op_is_exception_flagged() {
        let resp = handle(json!({"self": uninitialized(), "op": "__len__", "args": {}}));
        assert_eq!(resp["exception"], json!(true));
    }

    #[test]
    fn malformed_json_still_gets_a_response() {
        let raw = handle_line("{not json");
        let resp: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(resp["exception"], json!(true));
        assert_eq!(resp["self"]["slots"], json!(null));
    }

    #[test]
    fn float_values_are_rejected_not_coerced() {
        let resp = handle(json!({
            "self": uninitialized(),
            "op": "__setitem__",
            "args": {"key": 1.5, "value": 1},
        }));
        assert_eq!(resp["exception"], json!(true));
    }

    #[test]
    fn list_key_surfaces_unhashable_as_exception() {
        let resp = handle(json!({
            "self": uninitialized(),
            "op": "__setitem__",
            "args": {"key": [1, 2], "value": 1},
        }));
        assert_eq!(resp["exception"], json!(true));
    }

    #[test]
    fn zero_length_slot_array_is_rejected_not_probed() {
        let resp = handle(json!({
            "self": {"slots": [], "used": 0, "fill": 0},
            "op": "__getitem__",
            "args": {"key": 1},
        }));
        assert_eq!(resp["exception"], json!(true));
        assert_eq!(resp["self"]["slots"], json!(null));
    }

    #[test]
    fn overfull_table_is_rejected_not_probed() {
        // Eight occupied slots leave no EMPTY terminator for a probe to
        // hit, so a miss would spin forever if this state were accepted.
        let slots: Vec<Value> = (0..8)
            .map(|i| json!({"hashCode": i.to_string(), "key": i, "value": i}))
            .collect();
        let resp = handle(json!({
            "self": {"slots": slots, "used": 8, "fill": 8},
            "op": "__getitem__",
            "args": {"key": 100},
        }));
        assert_eq!(resp["exception"], json!(true));
        assert_eq!(resp["result"], json!(null));
    }

    #[test]
    fn counters_must_match_the_slot_array() {
        let mut slots = vec![json!({"hashCode": null, "key": null, "value": null}); 8];
        slots[0] = json!({"hashCode": "0", "key": 0, "value": 0});
        let resp = handle(json!({
            "self": {"slots": slots, "used": 3, "fill": 3},
            "op": "__getitem__",
            "args": {"key": 0},
        }));
        assert_eq!(resp["exception"], json!(true));
    }

    #[test]
    fn state_round_trips_through_the_wire() {
        let mut resp = handle(json!({"self": uninitialized(), "op": "__init__", "args": {}}));
        for (k, v) in [("abde", 1), ("cdef", 4), ("world", 9)] {
            resp = handle(json!({
                "self": resp["self"],
                "op": "__setitem__",
                "args": {"key": k, "value": v},
            }));
            assert_eq!(resp["exception"], json!(false));
        }
        let state: WireState = serde_json::from_value(resp["self"].clone()).unwrap();
        let dict = restore_state(&state).unwrap();
        assert_eq!(dict.used(), 3);
        assert_eq!(
            dict.get_item(&"world".into()).result.unwrap(),
            PyValue::Int(9)
        );
    }
}
