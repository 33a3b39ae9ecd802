use std::process::ExitCode;
use std::sync::Arc;

use codeassist_bridge::{Bridge, InlineCompletionRequest, NewChatRequest, WorkspaceFile};
use codeassist_chat::composer::{self, Composer};
use codeassist_chat::{
    Attachment, ChatEvent, ChatSession, CodeActions, InlineCompleter, PreviewCache, Role,
    SubmitOutcome,
};
use codeassist_llm::{create_provider, is_known_model, suggest_models};
use snafu::{OptionExt, ResultExt};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod assistant;
mod clipboard;
mod error;
mod repl;
mod settings;

use assistant::SwitchableAssistant;
use clipboard::SystemClipboard;
use error::{AppResult, HostSnafu, InputSnafu, MissingCredentialsSnafu, ProviderSnafu};
use repl::{Command, HELP, OpenMention, Transcript};
use settings::{HostModeSetting, SettingsStore};

enum AppEvent {
    Input(String),
    InputClosed,
    WorkspaceFiles(Vec<WorkspaceFile>),
    NewChat(NewChatRequest),
    InlineCompletion(InlineCompletionRequest),
    Chat(ChatEvent),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "codeassist exited with an error");
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> AppResult<()> {
    let store = SettingsStore::load();
    let settings = store
        .settings()
        .as_ref()
        .clone()
        .with_openai_fallback(|name| std::env::var(name).ok());

    let config = settings
        .to_provider_config()
        .context(MissingCredentialsSnafu {
            stage: "load-provider-config",
            path: store.config_path().display().to_string(),
        })?;
    let provider = create_provider(config).context(ProviderSnafu {
        stage: "create-provider",
    })?;
    let assistant = Arc::new(SwitchableAssistant::new(provider, &settings));

    let bridge = match settings.host.mode {
        HostModeSetting::Tcp => Bridge::connect_tcp(&settings.host.address)
            .await
            .context(HostSnafu {
                stage: "connect-host",
            })?,
        HostModeSetting::Fallback => Bridge::fallback(),
        HostModeSetting::Detached => Bridge::detached(),
    };
    tracing::info!(mode = ?bridge.mode(), model_id = %assistant.model_id(), "codeassist started");

    let (session, chat_events) = ChatSession::new(bridge.clone(), assistant.clone());
    let session = session.with_failure_display(settings.model_failure);

    let (events_tx, events) = mpsc::unbounded_channel();
    let subscriptions = {
        let workspace_tx = events_tx.clone();
        let new_chat_tx = events_tx.clone();
        let inline_tx = events_tx.clone();
        vec![
            bridge.on_workspace_files(move |files| {
                let _ = workspace_tx.send(AppEvent::WorkspaceFiles(files));
            }),
            bridge.on_new_chat_request(move |request| {
                let _ = new_chat_tx.send(AppEvent::NewChat(request));
            }),
            bridge.on_inline_completion_request(move |request| {
                let _ = inline_tx.send(AppEvent::InlineCompletion(request));
            }),
        ]
    };
    forward_chat_events(chat_events, events_tx.clone());
    spawn_stdin_reader(events_tx.clone());
    fetch_workspace_files(bridge.clone(), events_tx);

    let mut app = App {
        store,
        assistant: assistant.clone(),
        session,
        actions: CodeActions::new(bridge.clone(), Arc::new(SystemClipboard::default())),
        completer: InlineCompleter::new(bridge.clone(), assistant),
        previews: PreviewCache::new(bridge.clone()),
        composer: Composer::default(),
        workspace_files: Vec::new(),
        transcript: Transcript::default(),
    };
    app.print_transcript();
    println!("type /help for commands");

    app.run(events).await;

    drop(subscriptions);
    bridge.shutdown();
    Ok(())
}

fn forward_chat_events(
    mut chat_events: mpsc::UnboundedReceiver<ChatEvent>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = chat_events.recv().await {
            if events_tx.send(AppEvent::Chat(event)).is_err() {
                break;
            }
        }
    });
}

fn spawn_stdin_reader(events_tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = lines.next_line().await.context(InputSnafu {
                stage: "read-stdin-line",
            });
            let event = match line {
                Ok(Some(line)) => AppEvent::Input(line),
                Ok(None) => AppEvent::InputClosed,
                Err(error) => {
                    tracing::error!(error = %error, "stdin reader stopped");
                    AppEvent::InputClosed
                }
            };
            let closed = matches!(event, AppEvent::InputClosed);
            if events_tx.send(event).is_err() || closed {
                break;
            }
        }
    });
}

fn fetch_workspace_files(bridge: Bridge, events_tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        match bridge.get_workspace_files().await {
            Ok(files) => {
                let _ = events_tx.send(AppEvent::WorkspaceFiles(files));
            }
            Err(error) => tracing::warn!(error = %error, "workspace file listing unavailable"),
        }
    });
}

struct App {
    store: SettingsStore,
    assistant: Arc<SwitchableAssistant>,
    session: ChatSession,
    actions: CodeActions,
    completer: InlineCompleter,
    previews: PreviewCache,
    composer: Composer,
    workspace_files: Vec<WorkspaceFile>,
    transcript: Transcript,
}

impl App {
    async fn run(&mut self, mut events: mpsc::UnboundedReceiver<AppEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                AppEvent::Input(line) => {
                    let Some(command) = Command::parse(&line) else {
                        continue;
                    };
                    if command == Command::Quit {
                        break;
                    }
                    self.handle_command(command).await;
                }
                AppEvent::InputClosed => break,
                AppEvent::WorkspaceFiles(files) => {
                    tracing::debug!(count = files.len(), "workspace files updated");
                    self.workspace_files = files;
                }
                AppEvent::NewChat(request) => {
                    let session = self.session.clone();
                    tokio::spawn(async move {
                        if session.start_new_chat(request).await == SubmitOutcome::Ignored {
                            println!("(busy, new chat request dropped)");
                        }
                    });
                }
                AppEvent::InlineCompletion(request) => {
                    let completer = self.completer.clone();
                    tokio::spawn(async move {
                        if let Err(error) = completer.serve(&request).await {
                            tracing::warn!(error = %error, "failed to send inline completion");
                        }
                    });
                }
                AppEvent::Chat(ChatEvent::MessagesChanged) => self.print_transcript(),
                AppEvent::Chat(ChatEvent::Notification { title, description }) => {
                    println!("! {title}: {description}");
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Send(text) => self.send(&text),
            Command::Quick(action) => self.send(action.text),
            Command::Files(query) => {
                let candidates = composer::filter_candidates(
                    &self.workspace_files,
                    self.composer.attachments(),
                    &query,
                );
                if candidates.is_empty() {
                    println!("no matching files");
                }
                for file in candidates {
                    println!("  {} ({:?})", file.name, file.kind);
                }
            }
            Command::Attach(name) => {
                let attachment = self.attachment_for(&name);
                if !attachment.is_file() {
                    let previews = self.previews.clone();
                    let image = attachment.clone();
                    tokio::spawn(async move { previews.prefetch(&image).await });
                }
                if self.composer.attach(attachment) {
                    println!("attached {name}");
                } else {
                    println!("{name} is already attached");
                }
            }
            Command::Clear => self.composer.clear(),
            Command::New => {
                if !self.session.reset() {
                    println!("(busy, wait for the current reply)");
                }
            }
            Command::Copy(number) => match self.last_reply() {
                Some(reply) => match self.actions.copy_block(&reply, number - 1) {
                    Ok(_) => println!("copied block {number}"),
                    Err(error) => println!("! {error}"),
                },
                None => println!("nothing to copy yet"),
            },
            Command::Insert(number) => match self.last_reply() {
                Some(reply) => match self.actions.insert_block(&reply, number - 1).await {
                    Ok(_) => println!("inserted block {number}"),
                    Err(error) => println!("! {error}"),
                },
                None => println!("nothing to insert yet"),
            },
            Command::Model(None) => {
                println!("model: {}", self.assistant.model_id());
                for model in suggest_models("") {
                    println!("  {:<14} {}", model.id, model.note);
                }
            }
            Command::Model(Some(model_id)) => match self.store.set_model(&model_id) {
                Ok(settings) => {
                    if !is_known_model(&settings.model) {
                        println!("note: {} is not a known model id", settings.model);
                    }
                    self.assistant.set_model(&settings.model);
                    println!("model: {}", self.assistant.model_id());
                }
                Err(error) => println!("! {error}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Invalid(message) => println!("{message}"),
            Command::Quit => {}
        }
    }

    fn send(&mut self, line: &str) {
        if self.session.is_sending() {
            println!("(busy, wait for the current reply)");
            return;
        }

        let line = match repl::close_open_mention(
            line,
            &self.workspace_files,
            self.composer.attachments(),
        ) {
            OpenMention::Keep => line.to_string(),
            OpenMention::Pick { file, line } => {
                println!("attached {}", file.name);
                self.composer.attach(Attachment::from(file.clone()));
                line
            }
            OpenMention::Ambiguous(candidates) => {
                println!("which file?");
                for file in candidates {
                    println!("  {}", file.name);
                }
                return;
            }
        };

        let (text, mentions) = composer::extract_mentions(&line, &self.workspace_files);
        for mention in mentions {
            self.composer.attach(mention);
        }
        if !self.composer.can_send(&text) {
            return;
        }

        let attachments = self.composer.take();
        let session = self.session.clone();
        tokio::spawn(async move {
            if session.submit(&text, attachments).await == SubmitOutcome::Ignored {
                tracing::debug!("submission ignored");
            }
        });
    }

    fn attachment_for(&self, name: &str) -> Attachment {
        self.workspace_files
            .iter()
            .find(|file| file.name == name)
            .cloned()
            .map(Attachment::from)
            .unwrap_or_else(|| Attachment::file(name))
    }

    fn last_reply(&self) -> Option<String> {
        let snapshot = self.session.snapshot();
        snapshot
            .messages()
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant && !snapshot.is_typing(message.id))
            .map(|message| message.content.clone())
    }

    fn print_transcript(&mut self) {
        for update in self.transcript.updates(&self.session.snapshot()) {
            println!("{update}");
        }
    }
}
