use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use snafu::ResultExt;

use super::bridge::{Bridge, Subscription};
use super::error::{BridgeResult, ContentNotUtf8Snafu, DecodeContentSnafu, UnexpectedReplySnafu};

pub const GET_FILE_CONTENT: &str = "getFileContent";
pub const GET_WORKSPACE_FILES: &str = "getWorkspaceFiles";
pub const INSERT_TEXT: &str = "insertText";
pub const SEND_INLINE_COMPLETION_RESULT: &str = "sendInlineCompletionResult";
pub const WORKSPACE_FILES: &str = "workspaceFiles";
pub const START_NEW_CHAT: &str = "startNewChat";
pub const INLINE_COMPLETION_REQUEST: &str = "inlineCompletionRequest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: FileKind,
}

impl WorkspaceFile {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Host asks for a fresh conversation about one file (e.g. from a context menu).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChatRequest {
    pub file_name: String,
    #[serde(default)]
    pub prompt: String,
}

/// Host asks for a single-line completion at the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineCompletionRequest {
    pub file_name: String,
    pub line: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct FileContentReply {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct WorkspaceFilesReply {
    #[serde(default)]
    files: Vec<WorkspaceFile>,
}

fn parse_reply<T: DeserializeOwned>(command: &str, data: Value) -> BridgeResult<T> {
    serde_json::from_value(data).context(UnexpectedReplySnafu {
        stage: "parse-reply",
        command,
    })
}

/// Typed host commands layered over [`Bridge::request`] and [`Bridge::subscribe`].
impl Bridge {
    /// Fetches a text file. The host sends base64; this returns UTF-8 text.
    pub async fn get_file_content(&self, file_name: &str) -> BridgeResult<String> {
        let encoded = self.get_file_content_base64(file_name).await?;
        let bytes = STANDARD
            .decode(encoded.trim())
            .context(DecodeContentSnafu {
                stage: "decode-file-content",
                file_name,
            })?;
        String::from_utf8(bytes).context(ContentNotUtf8Snafu {
            stage: "decode-file-content",
            file_name,
        })
    }

    /// Fetches a file as the raw base64 string (used for image previews).
    pub async fn get_file_content_base64(&self, file_name: &str) -> BridgeResult<String> {
        let data = self
            .request(GET_FILE_CONTENT, json!({ "fileName": file_name }))
            .await?;
        let reply: FileContentReply = parse_reply(GET_FILE_CONTENT, data)?;
        Ok(reply.content)
    }

    pub async fn get_workspace_files(&self) -> BridgeResult<Vec<WorkspaceFile>> {
        let data = self.request(GET_WORKSPACE_FILES, json!({})).await?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        let reply: WorkspaceFilesReply = parse_reply(GET_WORKSPACE_FILES, data)?;
        Ok(reply.files)
    }

    pub async fn insert_text(&self, code: &str) -> BridgeResult<()> {
        self.notify(INSERT_TEXT, json!({ "text": code })).await
    }

    pub async fn send_inline_completion_result(&self, suggestion: &str) -> BridgeResult<()> {
        self.notify(SEND_INLINE_COMPLETION_RESULT, json!({ "suggestion": suggestion }))
            .await
    }

    /// Workspace file list pushed by the host. A malformed push yields an empty list.
    pub fn on_workspace_files<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Vec<WorkspaceFile>) + Send + Sync + 'static,
    {
        self.subscribe(WORKSPACE_FILES, move |data| {
            let files = serde_json::from_value::<WorkspaceFilesReply>(data)
                .map(|reply| reply.files)
                .unwrap_or_default();
            callback(files);
        })
    }

    pub fn on_new_chat_request<F>(&self, callback: F) -> Subscription
    where
        F: Fn(NewChatRequest) + Send + Sync + 'static,
    {
        self.subscribe(START_NEW_CHAT, move |data| {
            match serde_json::from_value::<NewChatRequest>(data) {
                Ok(request) => callback(request),
                Err(error) => {
                    tracing::warn!(error = %error, "ignoring malformed startNewChat broadcast")
                }
            }
        })
    }

    pub fn on_inline_completion_request<F>(&self, callback: F) -> Subscription
    where
        F: Fn(InlineCompletionRequest) + Send + Sync + 'static,
    {
        self.subscribe(INLINE_COMPLETION_REQUEST, move |data| {
            match serde_json::from_value::<InlineCompletionRequest>(data) {
                Ok(request) => callback(request),
                Err(error) => tracing::warn!(
                    error = %error,
                    "ignoring malformed inlineCompletionRequest broadcast"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::envelope::InboundMessage;
    use crate::error::BridgeError;
    use crate::transport::ChannelTransport;

    /// Answers every request on `bridge` with `reply(command, data)`.
    fn scripted_host<F>(reply: F) -> Bridge
    where
        F: Fn(&str, &Value) -> InboundMessageBody + Send + 'static,
    {
        let (transport, mut outbound) = ChannelTransport::channel();
        let bridge = Bridge::connected(Arc::new(transport));
        let host = bridge.clone();
        tokio::spawn(async move {
            while let Some(envelope) = outbound.recv().await {
                let Some(request_id) = envelope.request_id() else {
                    continue;
                };
                let message = match reply(&envelope.command, &envelope.data) {
                    InboundMessageBody::Data(data) => InboundMessage::reply(&request_id, data),
                    InboundMessageBody::Error(error) => {
                        InboundMessage::error_reply(&request_id, error)
                    }
                };
                host.dispatch(message);
            }
        });
        bridge
    }

    enum InboundMessageBody {
        Data(Value),
        Error(&'static str),
    }

    #[tokio::test]
    async fn file_content_is_decoded_from_base64() {
        let bridge = scripted_host(|command, data| {
            assert_eq!(command, GET_FILE_CONTENT);
            assert_eq!(data["fileName"], "src/lib.rs");
            InboundMessageBody::Data(json!({ "content": STANDARD.encode("pub fn x() {}") }))
        });

        assert_eq!(
            bridge.get_file_content("src/lib.rs").await.unwrap(),
            "pub fn x() {}"
        );
    }

    #[tokio::test]
    async fn invalid_base64_is_reported_per_file() {
        let bridge =
            scripted_host(|_, _| InboundMessageBody::Data(json!({ "content": "***not-base64" })));

        let error = bridge.get_file_content("a.ts").await.unwrap_err();
        assert!(matches!(error, BridgeError::DecodeContent { ref file_name, .. } if file_name == "a.ts"));
    }

    #[tokio::test]
    async fn host_error_surfaces_as_rejection() {
        let bridge = scripted_host(|_, _| InboundMessageBody::Error("permission denied"));

        let error = bridge.get_file_content("secret.env").await.unwrap_err();
        assert!(matches!(error, BridgeError::HostRejected { .. }));
    }

    #[tokio::test]
    async fn workspace_files_accept_type_field() {
        let bridge = scripted_host(|_, _| {
            InboundMessageBody::Data(json!({
                "files": [
                    { "name": "a.ts", "type": "file" },
                    { "name": "logo.png", "type": "image" }
                ]
            }))
        });

        let files = bridge.get_workspace_files().await.unwrap();
        assert_eq!(
            files,
            vec![
                WorkspaceFile::new("a.ts", FileKind::File),
                WorkspaceFile::new("logo.png", FileKind::Image),
            ]
        );
    }

    #[tokio::test]
    async fn fallback_bridge_serves_demo_listing_and_content() {
        let bridge = Bridge::fallback();

        let files = bridge.get_workspace_files().await.unwrap();
        assert_eq!(files.len(), 3);

        let content = bridge.get_file_content("mock/component.tsx").await.unwrap();
        assert!(content.starts_with("// Mock content for mock/component.tsx"));
    }

    #[test]
    fn typed_broadcast_listeners_decode_payloads() {
        let bridge = Bridge::detached();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let _subscription = bridge.on_new_chat_request(move |request| sink.lock().push(request));

        bridge.dispatch(InboundMessage::broadcast(
            START_NEW_CHAT,
            json!({ "fileName": "a.ts", "prompt": "Explain this" }),
        ));
        bridge.dispatch(InboundMessage::broadcast(START_NEW_CHAT, json!({ "bogus": 1 })));

        assert_eq!(
            seen.lock().as_slice(),
            &[NewChatRequest {
                file_name: "a.ts".to_string(),
                prompt: "Explain this".to_string(),
            }]
        );
    }
}
