use crate::{ErrorValue, Fields, Value};
use log::{trace, warn};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::collections::HashSet;

/// The marker which replaces a value that has already been serialized within the same call.
pub const CIRCULAR_MARKER: &str = "[Circular]";

const CYCLE_DETECTED: &str = "cyclic structure detected";
const FALLBACK_RECORD: &str = "{\"level\":\"ERROR\",\"msg\":\"record serialization failed\"}";

/// Serialize the given record into a JSON string.
///
/// The serialization never fails. [Value::Error] values are rendered as `{name, message, stack}`
/// and shared values which form a cycle are replaced by [CIRCULAR_MARKER].
pub fn to_json_string(record: &Fields) -> String {
    serialize(&ObjectRef(record))
}

/// Serialize the given value into a JSON string.
/// See [to_json_string] for the handling of errors and cycles.
pub fn value_to_json_string(value: &Value) -> String {
    serialize(value)
}

trait Node {
    fn serialize_node<S: Serializer>(
        &self,
        serializer: S,
        guard: &RefCell<Guard>,
    ) -> Result<S::Ok, S::Error>;
}

struct ObjectRef<'a>(&'a Fields);

impl Node for ObjectRef<'_> {
    fn serialize_node<S: Serializer>(
        &self,
        serializer: S,
        guard: &RefCell<Guard>,
    ) -> Result<S::Ok, S::Error> {
        serialize_fields(self.0, serializer, guard)
    }
}

impl Node for Value {
    fn serialize_node<S: Serializer>(
        &self,
        serializer: S,
        guard: &RefCell<Guard>,
    ) -> Result<S::Ok, S::Error> {
        serialize_value(self, serializer, guard)
    }
}

fn serialize<N: Node>(node: &N) -> String {
    // only shared values can form a cycle, so the guarded pass is only needed when one is detected
    match serde_json::to_string(&Root::new(node, Guard::path())) {
        Ok(json) => json,
        Err(e) => {
            trace!("Retrying record serialization with cycle detection, {}", e);
            serde_json::to_string(&Root::new(node, Guard::seen())).unwrap_or_else(|e| {
                warn!("Failed to serialize log record, {}", e);
                FALLBACK_RECORD.to_string()
            })
        }
    }
}

/// The bookkeeping of shared values encountered during a single serialization call.
#[derive(Debug)]
enum Guard {
    /// Tracks the shared values of the current path and fails once a cycle is entered.
    Path(Vec<usize>),
    /// Tracks every shared value of the call, replacing repeated ones with the marker.
    Seen(HashSet<usize>),
}

impl Guard {
    fn path() -> RefCell<Guard> {
        RefCell::new(Guard::Path(Vec::new()))
    }

    fn seen() -> RefCell<Guard> {
        RefCell::new(Guard::Seen(HashSet::new()))
    }
}

/// Binds a node to the guard of the serialization call.
struct Tracked<'a, N> {
    node: &'a N,
    guard: &'a RefCell<Guard>,
}

/// The owner of the guard of a serialization call.
struct Root<'a, N> {
    node: &'a N,
    guard: RefCell<Guard>,
}

impl<'a, N: Node> Root<'a, N> {
    fn new(node: &'a N, guard: RefCell<Guard>) -> Self {
        Self { node, guard }
    }
}

impl<N: Node> Serialize for Root<'_, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node.serialize_node(serializer, &self.guard)
    }
}

impl<N: Node> Serialize for Tracked<'_, N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.node.serialize_node(serializer, self.guard)
    }
}

fn serialize_value<S: Serializer>(
    value: &Value,
    serializer: S,
    guard: &RefCell<Guard>,
) -> Result<S::Ok, S::Error> {
    match value {
        Value::Null => serializer.serialize_unit(),
        Value::Bool(value) => serializer.serialize_bool(*value),
        Value::Number(value) => value.serialize(serializer),
        Value::String(value) => serializer.serialize_str(value),
        Value::Array(items) => {
            let mut seq = serializer.serialize_seq(Some(items.len()))?;
            for item in items {
                seq.serialize_element(&Tracked { node: item, guard })?;
            }
            seq.end()
        }
        Value::Object(fields) => serialize_fields(fields, serializer, guard),
        Value::Error(err) => serialize_error(err, serializer),
        Value::Shared(shared) => {
            let id = shared.id();
            let entered = {
                let mut guard = guard.borrow_mut();
                match &mut *guard {
                    Guard::Path(path) => {
                        if path.contains(&id) {
                            return Err(S::Error::custom(CYCLE_DETECTED));
                        }
                        path.push(id);
                        true
                    }
                    Guard::Seen(seen) => {
                        if !seen.insert(id) {
                            return serializer.serialize_str(CIRCULAR_MARKER);
                        }
                        false
                    }
                }
            };

            // the lock is released before recursing, nested shared values keep their identity
            let inner = shared.snapshot();
            let result = serialize_value(&inner, serializer, guard);

            if entered {
                if let Guard::Path(path) = &mut *guard.borrow_mut() {
                    path.pop();
                }
            }
            result
        }
    }
}

fn serialize_fields<S: Serializer>(
    fields: &Fields,
    serializer: S,
    guard: &RefCell<Guard>,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (key, value) in fields.iter() {
        map.serialize_entry(key, &Tracked { node: value, guard })?;
    }
    map.end()
}

fn serialize_error<S: Serializer>(err: &ErrorValue, serializer: S) -> Result<S::Ok, S::Error> {
    let len = if err.stack.is_some() { 3 } else { 2 };
    let mut map = serializer.serialize_map(Some(len))?;
    map.serialize_entry("name", &err.name)?;
    map.serialize_entry("message", &err.message)?;
    if let Some(stack) = &err.stack {
        map.serialize_entry("stack", stack)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fields, SharedValue};
    use serde_json::json;
    use std::sync::mpsc::channel;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_to_json_string() {
        let record = fields! {
            "ts" => 1700000000000i64,
            "level" => "INFO",
            "msg" => "lorem ipsum",
            "args" => vec![Value::from(1), Value::from("dolor"), Value::Null],
        };

        let result = to_json_string(&record);

        assert_eq!(
            r#"{"ts":1700000000000,"level":"INFO","msg":"lorem ipsum","args":[1,"dolor",null]}"#,
            result
        );
    }

    #[test]
    fn test_to_json_string_parse() {
        let expected = json!({
            "ts": 1,
            "level": "DEBUG",
            "nested": {"a": [1, 2, {"b": true}], "c": null},
            "msg": "unicode: 日本語, newline:\n, tab:\t, quote: \"test\"",
        });
        let record = Value::from(expected.clone()).to_fields().unwrap();

        let result = to_json_string(&record);

        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(expected, parsed);
    }

    #[test]
    fn test_error_value() {
        let record = fields! {
            "error" => ErrorValue::new("TestError", "test error message").with_stack("TestError: test error message"),
            "plain" => ErrorValue::new("Error", "no stack"),
        };

        let result: serde_json::Value = serde_json::from_str(&to_json_string(&record)).unwrap();

        assert_eq!(
            json!({
                "error": {
                    "name": "TestError",
                    "message": "test error message",
                    "stack": "TestError: test error message"
                },
                "plain": {"name": "Error", "message": "no stack"},
            }),
            result
        );
    }

    #[test]
    fn test_circular_reference() {
        let circular = SharedValue::object();
        circular.insert("name", "circular object");
        circular.insert("self", circular.clone());
        circular.insert("nested", fields! { "parent" => circular.clone() });
        let record = fields! { "msg" => "testing circular reference", "data" => circular };

        let result = to_json_string(&record);

        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(
            json!({
                "msg": "testing circular reference",
                "data": {
                    "name": "circular object",
                    "self": "[Circular]",
                    "nested": {"parent": "[Circular]"},
                }
            }),
            parsed
        );
    }

    #[test]
    fn test_circular_reference_with_error() {
        let obj = SharedValue::new(fields! {
            "msg" => "complex structure",
            "error" => ErrorValue::new("Error", "nested error"),
        });
        obj.insert("circular", obj.clone());

        let result = value_to_json_string(&Value::from(obj));

        let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
        assert_eq!(Some("nested error"), parsed["error"]["message"].as_str());
        assert_eq!(Some(CIRCULAR_MARKER), parsed["circular"].as_str());
    }

    #[test]
    fn test_shared_without_cycle() {
        let shared = SharedValue::new(fields! { "id" => 7 });
        let record = fields! { "first" => shared.clone(), "second" => shared };

        let result = to_json_string(&record);

        assert_eq!(r#"{"first":{"id":7},"second":{"id":7}}"#, result);
    }

    #[test]
    fn test_shared_repeated_within_cycle() {
        let shared = SharedValue::new(fields! { "id" => 7 });
        let circular = SharedValue::array();
        circular.push(circular.clone());
        let record = fields! {
            "first" => shared.clone(),
            "second" => shared,
            "cycle" => circular,
        };

        let result = to_json_string(&record);

        assert_eq!(
            r#"{"first":{"id":7},"second":"[Circular]","cycle":["[Circular]"]}"#,
            result
        );
    }

    #[test]
    fn test_concurrent_mutual_references() {
        let first = SharedValue::object();
        let second = SharedValue::object();
        first.insert("padding", (0..2000).collect::<Vec<i32>>());
        first.insert("other", second.clone());
        second.insert("padding", (0..2000).collect::<Vec<i32>>());
        second.insert("other", first.clone());
        let (tx, rx) = channel();

        for _ in 0..10 {
            for root in [first.clone(), second.clone()] {
                let tx = tx.clone();
                thread::spawn(move || {
                    let result = to_json_string(&fields! { "root" => root });
                    tx.send(result).unwrap();
                });
            }
        }

        for _ in 0..20 {
            let result = rx
                .recv_timeout(Duration::from_secs(2))
                .expect("expected the serialization to complete");
            let parsed: serde_json::Value = serde_json::from_str(&result).unwrap();
            assert_eq!(CIRCULAR_MARKER, parsed["root"]["other"]["other"]);
        }
    }
}
