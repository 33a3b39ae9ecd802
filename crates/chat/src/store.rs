use super::message::{Message, MessageId};

/// Ordered chat history plus the `sending` flag gating submissions.
///
/// Messages are append-only; the one exception is the typing placeholder,
/// whose content is replaced in place (or which is removed) when its model
/// call settles. The placeholder is tracked by id, so a reply that happens to
/// read `...` is still a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatStore {
    messages: Vec<Message>,
    sending: bool,
    typing: Option<MessageId>,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    /// Starts with the assistant greeting.
    pub fn new() -> Self {
        Self {
            messages: vec![Message::greeting()],
            sending: false,
            typing: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            sending: false,
            typing: None,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_sending(&self) -> bool {
        self.sending
    }

    /// Claims the send slot. Returns false if a submission is already in flight.
    pub fn try_begin_send(&mut self) -> bool {
        if self.sending {
            return false;
        }
        self.sending = true;
        true
    }

    pub fn finish_send(&mut self) {
        self.sending = false;
    }

    pub fn push(&mut self, message: Message) -> MessageId {
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub fn push_placeholder(&mut self) -> MessageId {
        let id = self.push(Message::placeholder());
        self.typing = Some(id);
        id
    }

    /// The assistant message still waiting for its reply, if any.
    pub fn typing_placeholder(&self) -> Option<MessageId> {
        self.typing
    }

    pub fn is_typing(&self, id: MessageId) -> bool {
        self.typing == Some(id)
    }

    /// Replaces the content of message `id`. Returns false if it no longer exists.
    ///
    /// Replacing the placeholder's content settles it.
    pub fn replace_content(&mut self, id: MessageId, content: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|message| message.id == id) {
            Some(message) => {
                message.content = content.into();
                self.settle(id);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let index = self.messages.iter().position(|message| message.id == id)?;
        self.settle(id);
        Some(self.messages.remove(index))
    }

    /// Drops the history back to the greeting. The `sending` flag is untouched.
    pub fn reset(&mut self) {
        self.messages = vec![Message::greeting()];
        self.typing = None;
    }

    fn settle(&mut self, id: MessageId) {
        if self.typing == Some(id) {
            self.typing = None;
        }
    }
}
