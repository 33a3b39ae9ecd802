use codeassist_bridge::BridgeError;
use codeassist_llm::ProviderError;
use snafu::Snafu;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display(
        "no api key configured; set `api_key` in {path} or export OPENAI_API_KEY"
    ))]
    MissingCredentials { stage: &'static str, path: String },
    #[snafu(display("failed to initialize model provider on `{stage}`: {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
    #[snafu(display("failed to connect to host on `{stage}`: {source}"))]
    Host {
        stage: &'static str,
        source: BridgeError,
    },
    #[snafu(display("failed to read input on `{stage}`: {source}"))]
    Input {
        stage: &'static str,
        source: std::io::Error,
    },
}
