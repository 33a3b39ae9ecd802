use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::OptionExt;
use uuid::Uuid;

use super::error::{BridgeResult, InvalidPayloadSnafu};

pub const REQUEST_ID_KEY: &str = "requestId";

/// Correlation token for one request.
///
/// Built from the command, the current unix time in milliseconds and a
/// random suffix, so two requests never share an id within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate(command: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self(format!("{command}-{millis}-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Message sent from the chat core to the host: `{command, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    pub command: String,
    pub data: Value,
}

impl OutboundEnvelope {
    /// Fire-and-forget message. A `null` payload is sent as an empty object.
    pub fn notification(command: &str, payload: Value) -> BridgeResult<Self> {
        Ok(Self {
            command: command.to_string(),
            data: Value::Object(payload_object(command, payload)?),
        })
    }

    /// Request message: the payload object plus the `requestId` field.
    pub fn request(command: &str, payload: Value, request_id: &RequestId) -> BridgeResult<Self> {
        let mut data = payload_object(command, payload)?;
        data.insert(
            REQUEST_ID_KEY.to_string(),
            Value::String(request_id.as_str().to_string()),
        );
        Ok(Self {
            command: command.to_string(),
            data: Value::Object(data),
        })
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.data
            .get(REQUEST_ID_KEY)
            .and_then(Value::as_str)
            .map(RequestId::from)
    }
}

fn payload_object(command: &str, payload: Value) -> BridgeResult<Map<String, Value>> {
    match payload {
        Value::Null => Ok(Map::new()),
        other => other.as_object().cloned().context(InvalidPayloadSnafu {
            stage: "build-envelope",
            command: command.to_string(),
        }),
    }
}

/// Anything the host sends: a reply (`requestId` + `data`/`error`) or a
/// broadcast (`command` + `data`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InboundMessage {
    pub fn reply(request_id: &RequestId, data: Value) -> Self {
        Self {
            request_id: Some(request_id.clone()),
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn error_reply(request_id: &RequestId, error: impl Into<String>) -> Self {
        Self {
            request_id: Some(request_id.clone()),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn broadcast(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: Some(command.into()),
            data: Some(data),
            ..Self::default()
        }
    }

    /// Splits a reply into its payload or error message.
    ///
    /// Some hosts nest the error inside `data`, so a string `data.error` is
    /// treated like a top-level `error`.
    pub fn into_reply(self) -> HostReply {
        if let Some(error) = self.error {
            return HostReply::Error(error);
        }

        let data = self.data.unwrap_or(Value::Null);
        match data.get("error").and_then(Value::as_str) {
            Some(error) => HostReply::Error(error.to_string()),
            None => HostReply::Data(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostReply {
    Data(Value),
    Error(String),
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_envelope_merges_request_id_into_payload() {
        let id = RequestId::from("getFileContent-1-abc");
        let envelope =
            OutboundEnvelope::request("getFileContent", json!({"fileName": "a.ts"}), &id).unwrap();

        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({
                "command": "getFileContent",
                "data": {"fileName": "a.ts", "requestId": "getFileContent-1-abc"}
            })
        );
        assert_eq!(envelope.request_id(), Some(id));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let id = RequestId::generate("insertText");
        assert!(OutboundEnvelope::request("insertText", json!("code"), &id).is_err());
        assert!(OutboundEnvelope::notification("insertText", json!(null)).is_ok());
    }

    #[test]
    fn generated_ids_are_prefixed_and_distinct() {
        let first = RequestId::generate("getWorkspaceFiles");
        let second = RequestId::generate("getWorkspaceFiles");

        assert!(first.as_str().starts_with("getWorkspaceFiles-"));
        assert_ne!(first, second);
    }

    #[test]
    fn inbound_reply_parses_camel_case_request_id() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"requestId":"x-1-2","data":{"files":[]}}"#).unwrap();

        assert_eq!(message.request_id, Some(RequestId::from("x-1-2")));
        assert_eq!(message.into_reply(), HostReply::Data(json!({"files": []})));
    }

    #[test]
    fn nested_data_error_is_treated_as_error_reply() {
        let message: InboundMessage =
            serde_json::from_str(r#"{"requestId":"x","data":{"error":"File not found"}}"#)
                .unwrap();

        assert_eq!(
            message.into_reply(),
            HostReply::Error("File not found".to_string())
        );
    }
}
