use std::sync::Arc;

mod assistant;
mod model;
pub mod prompts;
mod provider;
mod rig_adapter;

pub use assistant::{
    AssistError, AssistResult, CodeAssistant, ContextualSuggestionInput,
    ContextualSuggestionOutput, GenerateCodeInput, GenerateCodeOutput, InlineSuggestionInput,
    InlineSuggestionOutput, ProviderAssistant, RefactorCodeInput, RefactorCodeOutput,
    SummarizeCodeInput, SummarizeCodeOutput,
};
pub use model::{DEFAULT_OPENAI_MODEL, ModelInfo, OPENAI_MODELS, is_known_model, suggest_models};
pub use provider::{
    BoxFuture, CompletionRequest, LlmProvider, ProviderConfig, ProviderError, ProviderResult,
};
pub use rig_adapter::{RIG_OPENAI_PROVIDER_ID, RigProviderAdapter};

pub fn create_provider(mut config: ProviderConfig) -> ProviderResult<Arc<dyn LlmProvider>> {
    if config.provider_id.trim().is_empty() {
        config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
    }

    match config.provider_id.as_str() {
        "openai" | "rig-openai" => {
            config.provider_id = RIG_OPENAI_PROVIDER_ID.to_string();
            Ok(Arc::new(RigProviderAdapter::new(config)?))
        }
        _ => Err(ProviderError::UnsupportedProvider {
            stage: "create-provider",
            provider_id: config.provider_id,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let error = create_provider(ProviderConfig::new("anthropic", "key", "")).err();
        assert!(matches!(
            error,
            Some(ProviderError::UnsupportedProvider { .. })
        ));
    }

    #[test]
    fn missing_api_key_is_rejected() {
        let error = create_provider(ProviderConfig::new("openai", "  ", "")).err();
        assert!(matches!(error, Some(ProviderError::MissingApiKey { .. })));
    }
}
