//! Turns arbitrary tool output into plain JSON for the step history.

use std::fmt::{Debug, Display};

use serde::Serialize;
use serde_json::{Map, Value};

/// A value on its way into the step history.
#[derive(Debug, Clone, PartialEq)]
pub enum Loggable {
    Map(Vec<(String, Loggable)>),
    Seq(Vec<Loggable>),
    /// Dump of a known result type.
    Structured(Value),
    Opaque(String),
}

impl Loggable {
    /// Dumps a typed value through serde. Falls back to its debug form.
    pub fn structured<T: Serialize + Debug>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Loggable::Structured(v),
            Err(_) => Loggable::opaque(format_args!("{value:?}")),
        }
    }

    pub fn opaque(value: impl Display) -> Self {
        Loggable::Opaque(value.to_string())
    }

    /// Walks untyped JSON; every scalar leaf becomes its string form.
    #[cfg(test)]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Loggable::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Loggable::from_json(v)))
                    .collect(),
            ),
            Value::Array(items) => Loggable::Seq(items.iter().map(Loggable::from_json).collect()),
            Value::String(s) => Loggable::Opaque(s.clone()),
            other => Loggable::Opaque(other.to_string()),
        }
    }
}

pub fn safe_serialize(value: &Loggable) -> Value {
    match value {
        Loggable::Map(entries) => {
            let mut map = Map::new();
            for (key, item) in entries {
                map.insert(key.clone(), safe_serialize(item));
            }
            Value::Object(map)
        }
        Loggable::Seq(items) => Value::Array(items.iter().map(safe_serialize).collect()),
        Loggable::Structured(v) => v.clone(),
        Loggable::Opaque(s) => Value::String(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_json_round_trips_as_json() {
        let input = json!({
            "a": [1, 2.5, {"b": null, "c": true}],
            "d": "text",
            "e": {"f": [[], {}]}
        });
        let out = safe_serialize(&Loggable::from_json(&input));
        let text = serde_json::to_string(&out).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, out);
        assert_eq!(out["a"][0], json!("1"));
        assert_eq!(out["a"][2]["b"], json!("null"));
        assert_eq!(out["e"]["f"], json!([[], {}]));
    }

    #[derive(Debug, Serialize)]
    struct Dumped {
        name: &'static str,
        count: u32,
    }

    #[test]
    fn structured_values_keep_their_shape() {
        let dumped = Loggable::structured(&Dumped {
            name: "click",
            count: 2,
        });
        assert_eq!(safe_serialize(&dumped), json!({"name": "click", "count": 2}));
    }

    #[test]
    fn unserializable_values_fall_back_to_debug_text() {
        let mut keyed = std::collections::BTreeMap::new();
        keyed.insert((1u8, 2u8), "pair");
        let dumped = Loggable::structured(&keyed);
        assert_eq!(dumped, Loggable::Opaque(format!("{keyed:?}")));
        assert_eq!(safe_serialize(&dumped), json!("{(1, 2): \"pair\"}"));
    }

    #[test]
    fn mixed_tree_serializes_each_branch() {
        let tree = Loggable::Map(vec![
            ("raw".to_string(), Loggable::opaque(42)),
            (
                "items".to_string(),
                Loggable::Seq(vec![Loggable::opaque("x"), Loggable::Structured(json!([1]))]),
            ),
        ]);
        assert_eq!(
            safe_serialize(&tree),
            json!({"raw": "42", "items": ["x", [1]]})
        );
    }
}
