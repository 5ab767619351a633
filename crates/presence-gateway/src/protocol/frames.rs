//! Frame envelopes

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Inbound frame: `{"event": "...", "id": 7, "data": {...}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,

    /// Correlates the acknowledgement with the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default)]
    pub data: Value,
}

impl ClientFrame {
    pub fn new(event: impl Into<String>, id: Option<u64>, data: Value) -> Self {
        Self {
            event: event.into(),
            id,
            data,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Decode `data`; a missing body reads as `{}`
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        if self.data.is_null() {
            serde_json::from_value(Value::Object(serde_json::Map::new()))
        } else {
            serde_json::from_value(self.data.clone())
        }
    }
}

/// Outbound frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    /// `{"event": "presence_update", "data": {...}}`
    Event { event: String, data: Value },
    /// `{"ack": 7, "data": {...}}`
    Ack { ack: Option<u64>, data: Value },
}

impl ServerFrame {
    #[must_use]
    pub fn ack(id: Option<u64>, data: Value) -> Self {
        Self::Ack { ack: id, data }
    }

    /// Failed acknowledgement: `{"success": false, "error": {"code", "message"}}`
    #[must_use]
    pub fn error(id: Option<u64>, code: &str, message: impl Into<String>) -> Self {
        Self::Ack {
            ack: id,
            data: json!({
                "success": false,
                "error": { "code": code, "message": message.into() },
            }),
        }
    }

    #[must_use]
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self::Event {
            event: name.into(),
            data,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_client_frame() {
        let frame = ClientFrame::from_json(r#"{"event":"heartbeat","id":3,"data":{"status":"away"}}"#)
            .unwrap();
        assert_eq!(frame.event, "heartbeat");
        assert_eq!(frame.id, Some(3));
        assert_eq!(frame.data["status"], "away");
    }

    #[test]
    fn test_missing_data_reads_as_empty_object() {
        #[derive(Deserialize)]
        struct Body {
            status: Option<String>,
        }

        let frame = ClientFrame::from_json(r#"{"event":"heartbeat"}"#).unwrap();
        let body: Body = frame.payload().unwrap();
        assert!(body.status.is_none());
        assert!(frame.id.is_none());
    }

    #[test]
    fn test_error_ack_shape() {
        let json = ServerFrame::error(Some(9), "VALIDATION_ERROR", "bad status")
            .to_json()
            .unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["ack"], 9);
        assert_eq!(value["data"]["success"], false);
        assert_eq!(value["data"]["error"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_parse_server_frames() {
        let event = ServerFrame::from_json(r#"{"event":"user_online","data":{}}"#).unwrap();
        assert!(matches!(event, ServerFrame::Event { .. }));

        let ack = ServerFrame::from_json(r#"{"ack":null,"data":{"success":true}}"#).unwrap();
        assert_eq!(ack, ServerFrame::ack(None, json!({"success": true})));
    }

    #[test]
    fn test_event_shape() {
        let json = ServerFrame::event("presence_update", json!({"userId": "u1"}))
            .to_json()
            .unwrap();
        assert_eq!(json, r#"{"event":"presence_update","data":{"userId":"u1"}}"#);
    }
}
