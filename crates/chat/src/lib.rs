//! Chat core: message history, attachment resolution, prompt routing and
//! transcript rendering on top of [`codeassist_bridge::Bridge`].

pub mod composer;
mod dispatch;
mod error;
mod inline;
mod message;
mod render;
mod resolver;
mod session;
mod store;

#[cfg(test)]
mod test_support;

pub use dispatch::{PromptDispatcher, PromptRoute, fence, fence_language, strip_outer_fence};
pub use error::{CodeActionError, CodeActionResult, FileFailure, ResolveError, ResolveResult};
pub use inline::InlineCompleter;
pub use message::{Attachment, GREETING, Message, MessageId, Role, TYPING_PLACEHOLDER};
pub use render::{Clipboard, CodeActions, Segment, code_blocks, render_segments};
pub use resolver::{AttachmentResolver, PreviewCache};
pub use session::{APOLOGY, ChatEvent, ChatSession, FailureDisplay, SubmitOutcome};
pub use store::ChatStore;
