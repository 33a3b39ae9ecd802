use std::sync::Arc;

use arc_swap::ArcSwap;
use codeassist_llm::{
    AssistResult, BoxFuture, CodeAssistant, ContextualSuggestionInput, ContextualSuggestionOutput,
    GenerateCodeInput, GenerateCodeOutput, InlineSuggestionInput, InlineSuggestionOutput,
    LlmProvider, ProviderAssistant, RefactorCodeInput, RefactorCodeOutput, SummarizeCodeInput,
    SummarizeCodeOutput,
};

use super::settings::AppSettings;

/// [`CodeAssistant`] whose model can be swapped while calls are in flight.
///
/// A call keeps the assistant it started with; later calls see the new model.
pub struct SwitchableAssistant {
    provider: Arc<dyn LlmProvider>,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
    current: ArcSwap<ProviderAssistant>,
}

impl SwitchableAssistant {
    pub fn new(provider: Arc<dyn LlmProvider>, settings: &AppSettings) -> Self {
        let current = build(&provider, &settings.model, settings.temperature, settings.max_tokens);
        Self {
            provider,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            current: ArcSwap::from_pointee(current),
        }
    }

    pub fn model_id(&self) -> String {
        self.current.load().model_id().to_string()
    }

    pub fn set_model(&self, model_id: &str) {
        let next = build(&self.provider, model_id, self.temperature, self.max_tokens);
        tracing::info!(model_id = next.model_id(), "switched model");
        self.current.store(Arc::new(next));
    }
}

fn build(
    provider: &Arc<dyn LlmProvider>,
    model_id: &str,
    temperature: Option<f64>,
    max_tokens: Option<u64>,
) -> ProviderAssistant {
    let mut assistant = ProviderAssistant::new(provider.clone(), model_id);
    if let Some(temperature) = temperature {
        assistant = assistant.with_temperature(temperature);
    }
    if let Some(max_tokens) = max_tokens {
        assistant = assistant.with_max_tokens(max_tokens);
    }
    assistant
}

impl CodeAssistant for SwitchableAssistant {
    fn summarize<'a>(
        &'a self,
        input: SummarizeCodeInput,
    ) -> BoxFuture<'a, AssistResult<SummarizeCodeOutput>> {
        let assistant = self.current.load_full();
        Box::pin(async move { assistant.summarize(input).await })
    }

    fn refactor<'a>(
        &'a self,
        input: RefactorCodeInput,
    ) -> BoxFuture<'a, AssistResult<RefactorCodeOutput>> {
        let assistant = self.current.load_full();
        Box::pin(async move { assistant.refactor(input).await })
    }

    fn contextual_suggest<'a>(
        &'a self,
        input: ContextualSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<ContextualSuggestionOutput>> {
        let assistant = self.current.load_full();
        Box::pin(async move { assistant.contextual_suggest(input).await })
    }

    fn inline_suggest<'a>(
        &'a self,
        input: InlineSuggestionInput,
    ) -> BoxFuture<'a, AssistResult<InlineSuggestionOutput>> {
        let assistant = self.current.load_full();
        Box::pin(async move { assistant.inline_suggest(input).await })
    }

    fn generate<'a>(
        &'a self,
        input: GenerateCodeInput,
    ) -> BoxFuture<'a, AssistResult<GenerateCodeOutput>> {
        let assistant = self.current.load_full();
        Box::pin(async move { assistant.generate(input).await })
    }
}

#[cfg(test)]
mod tests {
    use codeassist_llm::{CompletionRequest, ProviderResult};
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct EchoModelProvider {
        models: Mutex<Vec<String>>,
    }

    impl LlmProvider for EchoModelProvider {
        fn id(&self) -> &str {
            "echo"
        }

        fn name(&self) -> &str {
            "Echo"
        }

        fn default_model(&self) -> &str {
            "echo-default"
        }

        fn complete<'a>(
            &'a self,
            request: CompletionRequest,
        ) -> BoxFuture<'a, ProviderResult<String>> {
            Box::pin(async move {
                self.models.lock().push(request.model_id.clone());
                Ok(request.model_id)
            })
        }
    }

    #[tokio::test]
    async fn later_calls_use_the_switched_model() {
        let provider = Arc::new(EchoModelProvider::default());
        let assistant = SwitchableAssistant::new(provider.clone(), &AppSettings::default());

        assistant.set_model("gpt-4o");
        let output = assistant
            .generate(GenerateCodeInput {
                prompt: "a".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(output.code, "gpt-4o");
        assert_eq!(assistant.model_id(), "gpt-4o");

        assistant.set_model(" ");
        assert_eq!(assistant.model_id(), "echo-default");
    }
}
