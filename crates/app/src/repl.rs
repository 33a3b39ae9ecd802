//! Line commands and transcript formatting for the terminal front end.

use std::collections::HashMap;

use codeassist_bridge::WorkspaceFile;
use codeassist_chat::composer::{self, QuickAction, quick_action};
use codeassist_chat::{Attachment, ChatStore, Message, MessageId, Role, Segment, render_segments};

pub const HELP: &str = "\
commands:
  <text> [@file ...]       send a message, attaching any @mentioned files
  /files [query]           list workspace files
  /attach <file>           attach a file to the next message
  /clear                   drop pending attachments
  /new                     start a new conversation
  /copy <n>                copy code block n of the last reply
  /insert <n>              insert code block n of the last reply into the editor
  /summarize | /refactor | /explain
                           quick actions on the pending attachments
  /model [id]              show or switch the model
  /quit                    exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    Files(String),
    Attach(String),
    Clear,
    New,
    /// 1-based block number.
    Copy(usize),
    Insert(usize),
    Quick(QuickAction),
    Model(Option<String>),
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Send(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "files" => Self::Files(argument.to_string()),
            "attach" if !argument.is_empty() => Self::Attach(argument.to_string()),
            "attach" => Self::Invalid("usage: /attach <file>".to_string()),
            "clear" => Self::Clear,
            "new" => Self::New,
            "copy" => block_number(argument).map_or_else(
                || Self::Invalid("usage: /copy <n>".to_string()),
                Self::Copy,
            ),
            "insert" => block_number(argument).map_or_else(
                || Self::Invalid("usage: /insert <n>".to_string()),
                Self::Insert,
            ),
            "model" if argument.is_empty() => Self::Model(None),
            "model" => Self::Model(Some(argument.to_string())),
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => match quick_action(other) {
                Some(action) => Self::Quick(action),
                None => Self::Invalid(format!("unknown command `/{other}`, try /help")),
            },
        };
        Some(command)
    }
}

fn block_number(argument: &str) -> Option<usize> {
    argument.parse::<usize>().ok().filter(|number| *number > 0)
}

/// What to do with a line that ends in a partial `@name`.
#[derive(Debug, PartialEq, Eq)]
pub enum OpenMention<'a> {
    /// No partial mention; send the line as typed.
    Keep,
    /// One workspace file matches: attach it and send the rest of the line.
    Pick {
        file: &'a WorkspaceFile,
        line: String,
    },
    /// Several files match; nothing is sent.
    Ambiguous(Vec<&'a WorkspaceFile>),
}

pub fn close_open_mention<'a>(
    line: &str,
    files: &'a [WorkspaceFile],
    attached: &[Attachment],
) -> OpenMention<'a> {
    let Some(query) = composer::active_mention(line) else {
        return OpenMention::Keep;
    };
    if query.is_empty() || files.iter().any(|file| file.name == query) {
        return OpenMention::Keep;
    }
    let mut candidates = composer::filter_candidates(files, attached, query);
    match candidates.len() {
        0 => OpenMention::Keep,
        1 => OpenMention::Pick {
            file: candidates.remove(0),
            line: composer::complete_mention(line),
        },
        _ => OpenMention::Ambiguous(candidates),
    }
}

/// Formats one message for the terminal. Code blocks are numbered from 1.
pub fn format_message(message: &Message, typing: bool) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    if typing {
        return format!("{speaker}: ...");
    }

    let mut out = format!("{speaker}:");
    for attachment in &message.attachments {
        out.push_str(&format!(" [@{}]", attachment.name));
    }
    out.push('\n');

    let mut block = 0;
    for segment in render_segments(&message.content) {
        match &segment {
            Segment::Prose { .. } => {
                for paragraph in segment.paragraphs() {
                    out.push_str(&format!("  {paragraph}\n"));
                }
            }
            Segment::Code { language, code } => {
                block += 1;
                out.push_str(&format!("  [{block}] ```{language}\n"));
                for line in code.lines() {
                    out.push_str(&format!("  | {line}\n"));
                }
                out.push_str("  ```\n");
            }
        }
    }
    out.trim_end().to_string()
}

/// Prints only messages that are new or whose content changed since last time.
#[derive(Debug, Default)]
pub struct Transcript {
    first: Option<MessageId>,
    printed: HashMap<MessageId, String>,
}

impl Transcript {
    /// Returns the formatted updates for the current history.
    pub fn updates(&mut self, store: &ChatStore) -> Vec<String> {
        let messages = store.messages();
        let mut updates = Vec::new();
        let first = messages.first().map(|message| message.id);
        if self.first.is_some() && self.first != first {
            self.printed.clear();
            updates.push("--- new conversation ---".to_string());
        }
        self.first = first;

        for message in messages {
            let formatted = format_message(message, store.is_typing(message.id));
            if self.printed.get(&message.id) == Some(&formatted) {
                continue;
            }
            self.printed.insert(message.id, formatted.clone());
            updates.push(formatted);
        }
        updates
    }
}
