use std::path::Path;
use std::sync::Arc;

use codeassist_llm::{
    AssistResult, CodeAssistant, ContextualSuggestionInput, GenerateCodeInput, RefactorCodeInput,
    SummarizeCodeInput,
};

use super::message::Attachment;

/// The model call a chat submission is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptRoute {
    Summarize,
    Refactor,
    ContextualSuggest,
    Generate,
}

/// Keyword routes in priority order. Only consulted when a file is attached.
const KEYWORD_ROUTES: &[(PromptRoute, &[&str])] = &[
    (PromptRoute::Summarize, &["summarize"]),
    (
        PromptRoute::Refactor,
        &["refactor", "change", "update", "modify", "rewrite"],
    ),
];

impl PromptRoute {
    pub fn select(text: &str, attachments: &[Attachment]) -> Self {
        if context_file(attachments).is_none() {
            return Self::Generate;
        }

        let lowered = text.to_lowercase();
        KEYWORD_ROUTES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| lowered.contains(keyword)))
            .map(|(route, _)| *route)
            .unwrap_or(Self::ContextualSuggest)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Refactor => "refactor",
            Self::ContextualSuggest => "contextual-suggest",
            Self::Generate => "generate",
        }
    }

    /// Whether the reply is code to be shown as one fenced block.
    pub fn is_fenced(self) -> bool {
        matches!(self, Self::Refactor | Self::Generate)
    }
}

/// The attachment used as model context: the first one, if it is a file.
fn context_file(attachments: &[Attachment]) -> Option<&Attachment> {
    attachments.first().filter(|attachment| attachment.is_file())
}

/// Wraps `code` in a fenced block tagged with `language`.
pub fn fence(language: &str, code: &str) -> String {
    format!("```{language}\n{}\n```", code.trim_matches('\n'))
}

/// Drops one fenced block wrapping the whole of `text`, keeping its body.
///
/// Text with prose around the fence, or with more than one block, is kept.
pub fn strip_outer_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return text;
    };
    match body.split_once('\n') {
        Some((_, inner)) if !inner.contains("```") => inner,
        _ => text,
    }
}

/// Fence tag for a file, taken from its extension.
pub fn fence_language(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Routes submissions to the matching [`CodeAssistant`] call.
#[derive(Clone)]
pub struct PromptDispatcher {
    assistant: Arc<dyn CodeAssistant>,
}

impl PromptDispatcher {
    pub fn new(assistant: Arc<dyn CodeAssistant>) -> Self {
        Self { assistant }
    }

    /// Returns the assistant reply text. Attachments are expected to be resolved.
    pub async fn dispatch(&self, text: &str, attachments: &[Attachment]) -> AssistResult<String> {
        let route = PromptRoute::select(text, attachments);
        tracing::debug!(route = route.name(), "dispatching chat prompt");

        let file = context_file(attachments);
        let code = file
            .and_then(|file| file.content.clone())
            .unwrap_or_default();
        let file_name = file.map(|file| file.name.clone()).unwrap_or_default();

        let reply = match route {
            PromptRoute::Summarize => {
                self.assistant
                    .summarize(SummarizeCodeInput {
                        code,
                        file_name: file_name.clone(),
                    })
                    .await?
                    .summary
            }
            PromptRoute::Refactor => {
                self.assistant
                    .refactor(RefactorCodeInput {
                        code,
                        file_name: file_name.clone(),
                        request: text.to_string(),
                    })
                    .await?
                    .refactored_code
            }
            PromptRoute::ContextualSuggest => {
                self.assistant
                    .contextual_suggest(ContextualSuggestionInput {
                        current_file_content: code,
                        query: text.to_string(),
                    })
                    .await?
                    .suggestion
            }
            PromptRoute::Generate => {
                self.assistant
                    .generate(GenerateCodeInput {
                        prompt: text.to_string(),
                    })
                    .await?
                    .code
            }
        };

        if !route.is_fenced() {
            return Ok(reply);
        }
        Ok(fence(&fence_language(&file_name), strip_outer_fence(&reply)))
    }
}
