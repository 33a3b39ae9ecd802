use std::sync::Arc;

use codeassist_bridge::{Bridge, NewChatRequest};
use codeassist_llm::CodeAssistant;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::dispatch::PromptDispatcher;
use super::message::{Attachment, Message};
use super::resolver::AttachmentResolver;
use super::store::ChatStore;

pub const APOLOGY: &str = "Sorry, I encountered an error. Please try again.";

/// How a failed model call shows up in the transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureDisplay {
    /// Replace the placeholder with [`APOLOGY`].
    #[default]
    Apology,
    /// Drop the placeholder and raise a notification instead.
    #[serde(alias = "remove")]
    RemovePlaceholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing to send, or a submission was already in flight.
    Ignored,
    Completed,
    ModelFailed,
    AttachmentsFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    MessagesChanged,
    Notification { title: String, description: String },
}

/// Releases the send slot on every exit path, including cancellation.
struct SendingGuard {
    store: Arc<Mutex<ChatStore>>,
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        self.store.lock().finish_send();
    }
}

/// Chat controller: store, resolver and dispatcher behind one submit entry point.
#[derive(Clone)]
pub struct ChatSession {
    store: Arc<Mutex<ChatStore>>,
    resolver: AttachmentResolver,
    dispatcher: PromptDispatcher,
    failure_display: FailureDisplay,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ChatSession {
    pub fn new(
        bridge: Bridge,
        assistant: Arc<dyn CodeAssistant>,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let session = Self {
            store: Arc::new(Mutex::new(ChatStore::new())),
            resolver: AttachmentResolver::new(bridge),
            dispatcher: PromptDispatcher::new(assistant),
            failure_display: FailureDisplay::default(),
            events,
        };
        (session, receiver)
    }

    pub fn with_failure_display(mut self, failure_display: FailureDisplay) -> Self {
        self.failure_display = failure_display;
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        self.store.lock().messages().to_vec()
    }

    /// Consistent copy of the history and its typing placeholder.
    pub fn snapshot(&self) -> ChatStore {
        self.store.lock().clone()
    }

    pub fn is_sending(&self) -> bool {
        self.store.lock().is_sending()
    }

    /// Sends one user turn. A call made while another is in flight is dropped.
    pub async fn submit(&self, text: &str, attachments: Vec<Attachment>) -> SubmitOutcome {
        if text.trim().is_empty() && attachments.is_empty() {
            return SubmitOutcome::Ignored;
        }
        let Some(guard) = self.claim() else {
            tracing::debug!("submission dropped, another one is in flight");
            return SubmitOutcome::Ignored;
        };
        self.run(guard, text, attachments, false).await
    }

    /// Resets the conversation and asks about `request.file_name`.
    ///
    /// Ignored while a submission is in flight. The old conversation is only
    /// dropped once the file has been read.
    pub async fn start_new_chat(&self, request: NewChatRequest) -> SubmitOutcome {
        let Some(guard) = self.claim() else {
            tracing::debug!(file_name = %request.file_name, "new chat dropped, busy");
            return SubmitOutcome::Ignored;
        };
        let attachments = vec![Attachment::file(request.file_name)];
        self.run(guard, &request.prompt, attachments, true).await
    }

    /// Back to the greeting. Returns false while a submission is in flight.
    pub fn reset(&self) -> bool {
        let Some(_guard) = self.claim() else {
            return false;
        };
        self.store.lock().reset();
        self.emit(ChatEvent::MessagesChanged);
        true
    }

    fn claim(&self) -> Option<SendingGuard> {
        if !self.store.lock().try_begin_send() {
            return None;
        }
        Some(SendingGuard {
            store: self.store.clone(),
        })
    }

    async fn run(
        &self,
        _guard: SendingGuard,
        text: &str,
        attachments: Vec<Attachment>,
        reset: bool,
    ) -> SubmitOutcome {
        let attachments = match self.resolver.resolve(attachments).await {
            Ok(attachments) => attachments,
            Err(error) => {
                self.notify(
                    "Could not attach files",
                    format!("Failed to read {}.", error.failed_files().join(", ")),
                );
                return SubmitOutcome::AttachmentsFailed;
            }
        };

        let placeholder = {
            let mut store = self.store.lock();
            if reset {
                store.reset();
            }
            store.push(Message::user(text, attachments.clone()));
            store.push_placeholder()
        };
        self.emit(ChatEvent::MessagesChanged);

        let outcome = match self.dispatcher.dispatch(text, &attachments).await {
            Ok(reply) => {
                self.store.lock().replace_content(placeholder, reply);
                SubmitOutcome::Completed
            }
            Err(error) => {
                tracing::error!(error = %error, "model call failed");
                match self.failure_display {
                    FailureDisplay::Apology => {
                        self.store.lock().replace_content(placeholder, APOLOGY);
                    }
                    FailureDisplay::RemovePlaceholder => {
                        self.store.lock().remove(placeholder);
                        self.notify("Error", error.to_string());
                    }
                }
                SubmitOutcome::ModelFailed
            }
        };
        self.emit(ChatEvent::MessagesChanged);
        outcome
    }

    fn notify(&self, title: &str, description: String) {
        self.emit(ChatEvent::Notification {
            title: title.to_string(),
            description,
        });
    }

    fn emit(&self, event: ChatEvent) {
        if self.events.send(event).is_err() {
            tracing::trace!("chat event dropped, no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::message::{Role, TYPING_PLACEHOLDER};
    use crate::test_support::{Call, FakeAssistant, file_host};

    fn session_with(
        assistant: FakeAssistant,
    ) -> (ChatSession, Arc<FakeAssistant>, mpsc::UnboundedReceiver<ChatEvent>) {
        let assistant = Arc::new(assistant);
        let bridge = file_host(|name| (name != "missing.ts").then(|| format!("content of {name}")));
        let (session, events) = ChatSession::new(bridge, assistant.clone());
        (session, assistant, events)
    }

    fn contents(session: &ChatSession) -> Vec<String> {
        session
            .messages()
            .into_iter()
            .map(|message| message.content)
            .collect()
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = events.try_recv() {
            drained.push(event);
        }
        drained
    }

    #[tokio::test]
    async fn refactor_reply_replaces_placeholder_with_fenced_code() {
        let (session, assistant, _events) = session_with(FakeAssistant::default());

        let outcome = session
            .submit("refactor this", vec![Attachment::file("a.ts")])
            .await;

        assert_eq!(outcome, SubmitOutcome::Completed);
        let messages = session.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].attachments[0].content.as_deref(),
            Some("content of a.ts")
        );
        assert_eq!(
            messages[2].content,
            "```ts\nrefactored: content of a.ts\n```"
        );
        assert!(matches!(assistant.calls()[0], Call::Refactor { .. }));
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn submit_is_a_no_op_while_sending() {
        let (assistant, gate) = FakeAssistant::gated();
        let (session, assistant, _events) = session_with(assistant);

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.submit("write a function", Vec::new()).await }
        });
        while session.snapshot().typing_placeholder().is_none() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let before = session.messages();

        let second = session.submit("write another", Vec::new()).await;

        assert_eq!(second, SubmitOutcome::Ignored);
        assert_eq!(session.messages(), before);
        assert!(session.is_sending());

        gate.notify_one();
        assert_eq!(first.await.unwrap(), SubmitOutcome::Completed);
        assert_eq!(assistant.calls().len(), 1);
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn attachment_failure_leaves_no_placeholder() {
        let (session, assistant, mut events) = session_with(FakeAssistant::default());

        let outcome = session
            .submit(
                "summarize",
                vec![Attachment::file("a.ts"), Attachment::file("missing.ts")],
            )
            .await;

        assert_eq!(outcome, SubmitOutcome::AttachmentsFailed);
        assert_eq!(session.messages().len(), 1);
        assert!(!contents(&session).iter().any(|c| c == TYPING_PLACEHOLDER));
        assert!(!session.is_sending());
        assert!(assistant.calls().is_empty());
        assert!(matches!(
            drain(&mut events).as_slice(),
            [ChatEvent::Notification { description, .. }] if description.contains("missing.ts")
        ));
    }

    #[tokio::test]
    async fn model_failure_shows_apology_by_default() {
        let (session, _, _events) = session_with(FakeAssistant::failing());

        let outcome = session.submit("write a function", Vec::new()).await;

        assert_eq!(outcome, SubmitOutcome::ModelFailed);
        assert_eq!(contents(&session).last().map(String::as_str), Some(APOLOGY));
        assert!(!session.is_sending());
    }

    #[tokio::test]
    async fn model_failure_can_remove_the_placeholder() {
        let (session, _, mut events) = session_with(FakeAssistant::failing());
        let session = session.with_failure_display(FailureDisplay::RemovePlaceholder);

        session.submit("write a function", Vec::new()).await;

        let messages = session.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::User);
        assert!(
            drain(&mut events)
                .iter()
                .any(|event| matches!(event, ChatEvent::Notification { .. }))
        );
    }

    #[tokio::test]
    async fn blank_input_without_attachments_is_ignored() {
        let (session, assistant, _events) = session_with(FakeAssistant::default());

        assert_eq!(session.submit("   ", Vec::new()).await, SubmitOutcome::Ignored);
        assert_eq!(session.messages().len(), 1);
        assert!(assistant.calls().is_empty());
    }

    #[tokio::test]
    async fn new_chat_resets_and_asks_about_the_file() {
        let (session, assistant, _events) = session_with(FakeAssistant::default());
        session.submit("write a function", Vec::new()).await;

        let outcome = session
            .start_new_chat(NewChatRequest {
                file_name: "src/a.ts".to_string(),
                prompt: "Summarize this code.".to_string(),
            })
            .await;

        assert_eq!(outcome, SubmitOutcome::Completed);
        assert_eq!(
            contents(&session)[1..],
            ["Summarize this code.".to_string(), "summary of src/a.ts".to_string()]
        );
        assert!(matches!(assistant.calls()[1], Call::Summarize { .. }));
    }

    #[tokio::test]
    async fn failed_new_chat_keeps_the_old_conversation() {
        let (session, assistant, mut events) = session_with(FakeAssistant::default());
        session.submit("write a function", Vec::new()).await;
        let before = session.messages();
        drain(&mut events);

        let outcome = session
            .start_new_chat(NewChatRequest {
                file_name: "missing.ts".to_string(),
                prompt: "Summarize this code.".to_string(),
            })
            .await;

        assert_eq!(outcome, SubmitOutcome::AttachmentsFailed);
        assert_eq!(session.messages(), before);
        assert_eq!(assistant.calls().len(), 1);
        assert!(!session.is_sending());
        assert!(matches!(
            drain(&mut events).as_slice(),
            [ChatEvent::Notification { description, .. }] if description.contains("missing.ts")
        ));
    }

    #[tokio::test]
    async fn ellipsis_reply_settles_the_placeholder() {
        let (session, _, _events) =
            session_with(FakeAssistant::default().with_reply(TYPING_PLACEHOLDER));

        session.submit("explain", vec![Attachment::file("a.ts")]).await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.typing_placeholder(), None);
        assert_eq!(
            snapshot.messages().last().map(|message| message.content.as_str()),
            Some(TYPING_PLACEHOLDER)
        );
    }

    #[tokio::test]
    async fn cancelled_submission_releases_the_send_slot() {
        let (assistant, _gate) = FakeAssistant::gated();
        let (session, _, _events) = session_with(assistant);

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.submit("write a function", Vec::new()).await }
        });
        while !session.is_sending() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        pending.abort();
        let _ = pending.await;

        assert!(!session.is_sending());
        assert!(session.reset());
    }
}
