//! Canned host answers used when the chat core runs without a host.
//!
//! Only the file listing and file content commands are answered; anything
//! else fails with `NoHost` exactly like a detached bridge.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use super::error::{BridgeResult, NoHostSnafu};
use super::host::{FileKind, GET_FILE_CONTENT, GET_WORKSPACE_FILES, WorkspaceFile};

pub fn demo_workspace_files() -> Vec<WorkspaceFile> {
    vec![
        WorkspaceFile::new("mock/component.tsx", FileKind::File),
        WorkspaceFile::new("mock/image.png", FileKind::Image),
        WorkspaceFile::new("mock/styles.css", FileKind::File),
    ]
}

pub fn demo_file_content(file_name: &str) -> String {
    format!("// Mock content for {file_name}\nconsole.log(\"Hello, World!\");")
}

pub(crate) fn respond(command: &str, payload: &Value) -> BridgeResult<Value> {
    match command {
        GET_WORKSPACE_FILES => {
            tracing::info!(command, "no host attached, serving demo workspace files");
            Ok(json!({ "files": demo_workspace_files() }))
        }
        GET_FILE_CONTENT => {
            let file_name = payload
                .get("fileName")
                .and_then(Value::as_str)
                .unwrap_or_default();
            tracing::info!(command, file_name, "no host attached, serving demo file content");
            Ok(json!({ "content": STANDARD.encode(demo_file_content(file_name)) }))
        }
        _ => NoHostSnafu {
            stage: "fallback-respond",
            command,
        }
        .fail(),
    }
}
