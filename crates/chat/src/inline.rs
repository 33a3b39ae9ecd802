use std::sync::Arc;

use codeassist_bridge::{Bridge, BridgeResult, InlineCompletionRequest};
use codeassist_llm::{CodeAssistant, InlineSuggestionInput};

/// Single-line completion at the editor cursor.
///
/// Failures never propagate: the host always gets an answer, possibly empty.
#[derive(Clone)]
pub struct InlineCompleter {
    bridge: Bridge,
    assistant: Arc<dyn CodeAssistant>,
}

impl InlineCompleter {
    pub fn new(bridge: Bridge, assistant: Arc<dyn CodeAssistant>) -> Self {
        Self { bridge, assistant }
    }

    pub async fn complete(&self, request: &InlineCompletionRequest) -> String {
        let full_content = match self.bridge.get_file_content(&request.file_name).await {
            Ok(content) => content,
            Err(error) => {
                tracing::warn!(
                    file_name = %request.file_name,
                    error = %error,
                    "inline completion skipped, file content unavailable"
                );
                return String::new();
            }
        };

        let input = InlineSuggestionInput {
            language: request.language.clone(),
            line: request.line.clone(),
            full_content,
        };
        match self.assistant.inline_suggest(input).await {
            Ok(output) => output.suggestion,
            Err(error) => {
                tracing::warn!(
                    file_name = %request.file_name,
                    error = %error,
                    "inline completion failed"
                );
                String::new()
            }
        }
    }

    /// Computes a completion and sends it back with `sendInlineCompletionResult`.
    pub async fn serve(&self, request: &InlineCompletionRequest) -> BridgeResult<String> {
        let suggestion = self.complete(request).await;
        self.bridge.send_inline_completion_result(&suggestion).await?;
        Ok(suggestion)
    }
}
