use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BridgeError {
    #[snafu(display("no host is attached; `{command}` cannot be delivered"))]
    NoHost {
        stage: &'static str,
        command: String,
    },
    #[snafu(display("host rejected `{command}`: {message}"))]
    HostRejected {
        stage: &'static str,
        command: String,
        message: String,
    },
    #[snafu(display("bridge shut down before `{command}` ({request_id}) was answered"))]
    ReplyDropped {
        stage: &'static str,
        command: String,
        request_id: String,
    },
    #[snafu(display("failed to write `{command}` to the host on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        command: String,
        source: std::io::Error,
    },
    #[snafu(display("host transport for `{command}` is closed"))]
    TransportClosed {
        stage: &'static str,
        command: String,
    },
    #[snafu(display("failed to encode `{command}` envelope: {source}"))]
    EncodeEnvelope {
        stage: &'static str,
        command: String,
        source: serde_json::Error,
    },
    #[snafu(display("payload for `{command}` must be a JSON object"))]
    InvalidPayload {
        stage: &'static str,
        command: String,
    },
    #[snafu(display("reply to `{command}` has an unexpected shape: {source}"))]
    UnexpectedReply {
        stage: &'static str,
        command: String,
        source: serde_json::Error,
    },
    #[snafu(display("content of '{file_name}' is not valid base64: {source}"))]
    DecodeContent {
        stage: &'static str,
        file_name: String,
        source: base64::DecodeError,
    },
    #[snafu(display("content of '{file_name}' is not valid UTF-8"))]
    ContentNotUtf8 {
        stage: &'static str,
        file_name: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("failed to connect to host at {address}: {source}"))]
    Connect {
        stage: &'static str,
        address: String,
        source: std::io::Error,
    },
}

impl BridgeError {
    /// True when the failure means no host is present at all.
    pub fn is_no_host(&self) -> bool {
        matches!(self, Self::NoHost { .. })
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
