use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field carrying the operation name on every frame.
pub const OP_FIELD: &str = "msg";

/// An outbound request frame: an unordered bag of fields, one of which is
/// always `msg` (the operation name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Request(Map<String, Value>);

impl Request {
    pub fn new(op: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(OP_FIELD.to_string(), Value::String(op.to_string()));
        Self(fields)
    }

    /// Add (or replace) a parameter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// The operation name, if the frame carries one as a string.
    pub fn op(&self) -> Option<&str> {
        self.0.get(OP_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A Map of Values always serializes.
        let json = serde_json::to_string(&self.0).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_carries_op() {
        let req = Request::new("JoinLobby");
        assert_eq!(req.op(), Some("JoinLobby"));
        assert_eq!(req.fields().len(), 1);
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let req = Request::new("Whisper")
            .with("text", "hello there")
            .with("toProfileName", "Alice")
            .with("cardIds", vec![1u64, 2, 3]);

        let json = req.to_string();
        let decoded: Request = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, req);
        assert_eq!(decoded.op(), Some("Whisper"));
        assert_eq!(decoded.get("text").and_then(Value::as_str), Some("hello there"));
        assert_eq!(decoded.get("cardIds"), Some(&serde_json::json!([1, 2, 3])));
    }

    #[test]
    fn with_replaces_existing_key() {
        let req = Request::new("RoomEnter")
            .with("roomName", "a")
            .with("roomName", "b");
        assert_eq!(req.get("roomName").and_then(Value::as_str), Some("b"));
    }
}
