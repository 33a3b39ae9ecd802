use std::sync::Arc;

use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use super::prompts::{self, PromptParts};
use super::provider::{BoxFuture, CompletionRequest, LlmProvider, ProviderError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeCodeInput {
    pub code: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeCodeOutput {
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefactorCodeInput {
    pub code: String,
    pub file_name: String,
    pub request: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefactorCodeOutput {
    pub refactored_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualSuggestionInput {
    pub current_file_content: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextualSuggestionOutput {
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineSuggestionInput {
    pub language: String,
    pub line: String,
    pub full_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineSuggestionOutput {
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateCodeInput {
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateCodeOutput {
    pub code: String,
}

pub type AssistResult<T> = Result<T, AssistError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AssistError {
    #[snafu(display("model call `{call}` failed: {source}"))]
    ModelCallFailed {
        stage: &'static str,
        call: &'static str,
        source: ProviderError,
    },
    #[snafu(display("invalid input for `{call}`: {details}"))]
    InvalidInput {
        stage: &'static str,
        call: &'static str,
        details: String,
    },
}

/// The templated model calls the chat core depends on.
///
/// Implementations take structured input and return structured output; every
/// failure surfaces as an [`AssistError`].
pub trait CodeAssistant: Send + Sync {
    fn summarize<'a>(
        &'a self,
        input: SummarizeCodeInput,
    ) -> BoxFuture<'a, AssistResult<SummarizeCodeOutput>>;

    fn refactor<'a>(
        &'a self,
        input: RefactorCodeInput,
    ) -> BoxFuture<'a, AssistResult<RefactorCodeOutput>>;

    fn contextual_suggest<'a>(
        &'a self,
        input: ContextualSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<ContextualSuggestionOutput>>;

    fn inline_suggest<'a>(
        &'a self,
        input: InlineSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<InlineSuggestionOutput>>;

    fn generate<'a>(
        &'a self,
        input: GenerateCodeInput,
    ) -> BoxFuture<'a, AssistResult<GenerateCodeOutput>>;
}

/// [`CodeAssistant`] backed by an [`LlmProvider`] and the prompt templates.
pub struct ProviderAssistant {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
}

impl ProviderAssistant {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into();
        let model_id = if model_id.trim().is_empty() {
            provider.default_model().to_string()
        } else {
            model_id.trim().to_string()
        };

        Self {
            provider,
            model_id,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn run(&self, call: &'static str, parts: PromptParts) -> AssistResult<String> {
        let mut request =
            CompletionRequest::new(self.model_id.clone(), parts.prompt).with_preamble(parts.preamble);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        tracing::debug!(call, model_id = %self.model_id, "invoking model call");
        let text = self
            .provider
            .complete(request)
            .await
            .context(ModelCallFailedSnafu {
                stage: "provider-complete",
                call,
            })?;

        Ok(text.trim_end().to_string())
    }
}

impl CodeAssistant for ProviderAssistant {
    fn summarize<'a>(
        &'a self,
        input: SummarizeCodeInput,
    ) -> BoxFuture<'a, AssistResult<SummarizeCodeOutput>> {
        Box::pin(async move {
            ensure!(
                !input.file_name.trim().is_empty(),
                InvalidInputSnafu {
                    stage: "validate-summarize",
                    call: "summarize",
                    details: "file name is empty".to_string(),
                }
            );
            let summary = self.run("summarize", prompts::summarize(&input)).await?;
            Ok(SummarizeCodeOutput { summary })
        })
    }

    fn refactor<'a>(
        &'a self,
        input: RefactorCodeInput,
    ) -> BoxFuture<'a, AssistResult<RefactorCodeOutput>> {
        Box::pin(async move {
            ensure!(
                !input.request.trim().is_empty(),
                InvalidInputSnafu {
                    stage: "validate-refactor",
                    call: "refactor",
                    details: "refactor request is empty".to_string(),
                }
            );
            let refactored_code = self.run("refactor", prompts::refactor(&input)).await?;
            Ok(RefactorCodeOutput { refactored_code })
        })
    }

    fn contextual_suggest<'a>(
        &'a self,
        input: ContextualSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<ContextualSuggestionOutput>> {
        Box::pin(async move {
            let suggestion = self
                .run("contextual-suggest", prompts::contextual_suggestion(&input))
                .await?;
            Ok(ContextualSuggestionOutput { suggestion })
        })
    }

    fn inline_suggest<'a>(
        &'a self,
        input: InlineSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<InlineSuggestionOutput>> {
        Box::pin(async move {
            let suggestion = self
                .run("inline-suggest", prompts::inline_suggestion(&input))
                .await?;
            Ok(InlineSuggestionOutput { suggestion })
        })
    }

    fn generate<'a>(
        &'a self,
        input: GenerateCodeInput,
    ) -> BoxFuture<'a, AssistResult<GenerateCodeOutput>> {
        Box::pin(async move {
            ensure!(
                !input.prompt.trim().is_empty(),
                InvalidInputSnafu {
                    stage: "validate-generate",
                    call: "generate",
                    details: "prompt is empty".to_string(),
                }
            );
            let code = self.run("generate", prompts::generate(&input)).await?;
            Ok(GenerateCodeOutput { code })
        })
    }
}
