//! Message bridge between the chat core and its host.
//!
//! One bidirectional channel carries `{command, data}` envelopes. Requests are
//! correlated with replies through a generated `requestId`; everything else is
//! a broadcast delivered to subscribers by command name.

mod bridge;
pub mod envelope;
mod error;
pub mod fallback;
mod host;
pub mod transport;

pub use bridge::{Bridge, Callback, DispatchOutcome, HostMode, Subscription};
pub use envelope::{HostReply, InboundMessage, OutboundEnvelope, RequestId};
pub use error::{BridgeError, BridgeResult};
pub use host::{
    FileKind, GET_FILE_CONTENT, GET_WORKSPACE_FILES, INLINE_COMPLETION_REQUEST, INSERT_TEXT,
    InlineCompletionRequest, NewChatRequest, SEND_INLINE_COMPLETION_RESULT, START_NEW_CHAT,
    WORKSPACE_FILES, WorkspaceFile,
};
pub use transport::{ChannelTransport, HostTransport, LineTransport};
