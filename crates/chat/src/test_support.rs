//! Recording test doubles shared by the module tests.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use codeassist_bridge::{Bridge, ChannelTransport, GET_FILE_CONTENT, InboundMessage};
use codeassist_llm::{
    AssistError, AssistResult, BoxFuture, CodeAssistant, ContextualSuggestionInput,
    ContextualSuggestionOutput, GenerateCodeInput, GenerateCodeOutput, InlineSuggestionInput,
    InlineSuggestionOutput, ProviderError, RefactorCodeInput, RefactorCodeOutput,
    SummarizeCodeInput, SummarizeCodeOutput,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;

pub(crate) fn encode(text: &str) -> String {
    STANDARD.encode(text)
}

/// Host answering `getFileContent` with `content_of(name)`, or an error for `None`.
pub(crate) fn file_host<F>(content_of: F) -> Bridge
where
    F: Fn(&str) -> Option<String> + Send + 'static,
{
    let (transport, mut outbound) = ChannelTransport::channel();
    let bridge = Bridge::connected(Arc::new(transport));
    let host = bridge.clone();
    tokio::spawn(async move {
        while let Some(envelope) = outbound.recv().await {
            let Some(request_id) = envelope.request_id() else {
                continue;
            };
            if envelope.command != GET_FILE_CONTENT {
                host.dispatch(InboundMessage::error_reply(&request_id, "unsupported"));
                continue;
            }
            let name = envelope.data["fileName"].as_str().unwrap_or_default();
            let reply = match content_of(name) {
                Some(content) => {
                    InboundMessage::reply(&request_id, json!({ "content": encode(&content) }))
                }
                None => InboundMessage::error_reply(&request_id, "file not found"),
            };
            host.dispatch(reply);
        }
    });
    bridge
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Summarize { code: String, file_name: String },
    Refactor { code: String, request: String },
    Contextual { content: String, query: String },
    Inline { language: String, line: String, content: String },
    Generate { prompt: String },
}

/// Deterministic assistant that records every call.
#[derive(Default)]
pub(crate) struct FakeAssistant {
    calls: Mutex<Vec<Call>>,
    failing: bool,
    gate: Option<Arc<Notify>>,
    reply: Option<String>,
}

impl FakeAssistant {
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Every call answers `reply` verbatim.
    pub(crate) fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Every call waits for one `notify_one` on the returned handle.
    pub(crate) fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let assistant = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (assistant, gate)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    async fn answer(&self, call: Call, name: &'static str, text: String) -> AssistResult<String> {
        self.calls.lock().push(call);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing {
            return Err(AssistError::ModelCallFailed {
                stage: "fake-assistant",
                call: name,
                source: ProviderError::EmptyCompletion {
                    stage: "fake-assistant",
                    model_id: "fake".to_string(),
                },
            });
        }
        Ok(self.reply.clone().unwrap_or(text))
    }
}

impl CodeAssistant for FakeAssistant {
    fn summarize<'a>(
        &'a self,
        input: SummarizeCodeInput,
    ) -> BoxFuture<'a, AssistResult<SummarizeCodeOutput>> {
        Box::pin(async move {
            let text = format!("summary of {}", input.file_name);
            let call = Call::Summarize {
                code: input.code,
                file_name: input.file_name,
            };
            let summary = self.answer(call, "summarize", text).await?;
            Ok(SummarizeCodeOutput { summary })
        })
    }

    fn refactor<'a>(
        &'a self,
        input: RefactorCodeInput,
    ) -> BoxFuture<'a, AssistResult<RefactorCodeOutput>> {
        Box::pin(async move {
            let text = format!("refactored: {}", input.code);
            let call = Call::Refactor {
                code: input.code,
                request: input.request,
            };
            let refactored_code = self.answer(call, "refactor", text).await?;
            Ok(RefactorCodeOutput { refactored_code })
        })
    }

    fn contextual_suggest<'a>(
        &'a self,
        input: ContextualSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<ContextualSuggestionOutput>> {
        Box::pin(async move {
            let text = format!("suggestion for: {}", input.query);
            let call = Call::Contextual {
                content: input.current_file_content,
                query: input.query,
            };
            let suggestion = self.answer(call, "contextual-suggest", text).await?;
            Ok(ContextualSuggestionOutput { suggestion })
        })
    }

    fn inline_suggest<'a>(
        &'a self,
        input: InlineSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<InlineSuggestionOutput>> {
        Box::pin(async move {
            let text = format!("{} // completed", input.line);
            let call = Call::Inline {
                language: input.language,
                line: input.line,
                content: input.full_content,
            };
            let suggestion = self.answer(call, "inline-suggest", text).await?;
            Ok(InlineSuggestionOutput { suggestion })
        })
    }

    fn generate<'a>(
        &'a self,
        input: GenerateCodeInput,
    ) -> BoxFuture<'a, AssistResult<GenerateCodeOutput>> {
        Box::pin(async move {
            let text = format!("generated: {}", input.prompt);
            let call = Call::Generate {
                prompt: input.prompt,
            };
            let code = self.answer(call, "generate", text).await?;
            Ok(GenerateCodeOutput { code })
        })
    }
}
