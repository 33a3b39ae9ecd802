use futures::StreamExt;
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};

use super::model::DEFAULT_OPENAI_MODEL;
use super::provider::{
    BoxFuture, CompletionRequest, CompletionsFailedSnafu, EmptyCompletionSnafu, EmptyPromptSnafu,
    HttpClientSnafu, LlmProvider, MissingApiKeySnafu, ProviderConfig, ProviderError,
    ProviderResult,
};

pub const RIG_OPENAI_PROVIDER_ID: &str = "openai";

pub struct RigProviderAdapter {
    config: ProviderConfig,
}

impl RigProviderAdapter {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    /// Streams the completion and concatenates every text chunk.
    ///
    /// Reasoning and tool-call chunks are dropped; the templated calls only
    /// consume the final assistant text.
    async fn run_completion(
        config: &ProviderConfig,
        request: CompletionRequest,
    ) -> ProviderResult<String> {
        ensure!(
            !request.prompt.trim().is_empty(),
            EmptyPromptSnafu {
                stage: "run-completion",
                model_id: request.model_id.clone(),
            }
        );

        let client = Self::build_client(config)?;
        let model = client.completion_model(request.model_id.clone());

        let mut builder = model.completion_request(RigMessage::user(request.prompt.clone()));

        if let Some(preamble) = request.preamble.as_ref()
            && !preamble.trim().is_empty()
        {
            builder = builder.preamble(preamble.clone());
        }

        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let mut stream = builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })?;

        let mut output = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(StreamedAssistantContent::Text(text)) => output.push_str(&text.text),
                Ok(_) => {}
                Err(source) => {
                    tracing::warn!(
                        model_id = %request.model_id,
                        error = %source,
                        "provider stream emitted an error chunk"
                    );
                    return Err(ProviderError::CompletionsFailed {
                        stage: "stream-chunk",
                        source,
                    });
                }
            }
        }

        ensure!(
            !output.trim().is_empty(),
            EmptyCompletionSnafu {
                stage: "collect-stream",
                model_id: request.model_id,
            }
        );

        Ok(output)
    }
}

impl LlmProvider for RigProviderAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Rig OpenAI"
    }

    fn default_model(&self) -> &str {
        DEFAULT_OPENAI_MODEL
    }

    fn complete<'a>(&'a self, request: CompletionRequest) -> BoxFuture<'a, ProviderResult<String>> {
        Box::pin(async move {
            let model_id = request.model_id.clone();
            let result = Self::run_completion(&self.config, request).await;
            if let Err(error) = &result {
                tracing::error!(
                    provider_id = %self.config.provider_id,
                    model_id = %model_id,
                    error = %error,
                    "completion request failed"
                );
            }
            result
        })
    }
}
