use std::fmt;

use codeassist_bridge::{FileKind, WorkspaceFile};
use uuid::Uuid;

/// Content of the assistant placeholder shown while a model call is in flight.
pub const TYPING_PLACEHOLDER: &str = "...";

pub const GREETING: &str = "Hello! I am CodeAssist. I can help you generate, summarize, and \
refactor code. \n\nTo get started, try one of these: \n- Ask me to create a new component. \n\
- Attach a file with `@` and ask me to summarize it. \n- Attach a file and ask me to refactor \
it (e.g., \"@src/app/page.tsx refactor to use a button\").";

/// Stable identifier for one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Time-ordered, so ids also sort in creation order.
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// A file or image the user wants included as context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub kind: FileKind,
    /// Text content; filled once by the resolver for file attachments.
    pub content: Option<String>,
}

impl Attachment {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::File,
            content: None,
        }
    }

    pub fn image(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Image,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn needs_content(&self) -> bool {
        self.is_file() && self.content.is_none()
    }
}

impl From<WorkspaceFile> for Attachment {
    fn from(file: WorkspaceFile) -> Self {
        Self {
            name: file.name,
            kind: file.kind,
            content: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new_v7(),
            role,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::new(Role::User, content)
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn placeholder() -> Self {
        Self::assistant(TYPING_PLACEHOLDER)
    }

    pub fn greeting() -> Self {
        Self::assistant(GREETING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_ids_are_unique_and_ordered() {
        let ids = (0..64).map(|_| MessageId::new_v7()).collect::<Vec<_>>();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), ids.len());
    }

    #[test]
    fn only_unresolved_files_need_content() {
        assert!(Attachment::file("a.ts").needs_content());
        assert!(!Attachment::file("a.ts").with_content("x").needs_content());
        assert!(!Attachment::image("logo.png").needs_content());
    }

    #[test]
    fn placeholder_is_an_assistant_ellipsis() {
        let placeholder = Message::placeholder();
        assert_eq!(placeholder.role, Role::Assistant);
        assert_eq!(placeholder.content, TYPING_PLACEHOLDER);
    }
}
