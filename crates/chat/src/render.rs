use std::sync::{Arc, LazyLock};

use codeassist_bridge::Bridge;
use regex::Regex;
use snafu::{OptionExt, ResultExt};

use super::error::{CodeActionResult, InsertSnafu, NoSuchBlockSnafu};

/// Opening fence with an optional language tag, body, closing fence.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+#.-]*)[^\n]*\n(.*?)```")
        .expect("FENCE_RE is a valid static regex pattern")
});

/// One displayable piece of a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Prose { text: String },
    Code { language: String, code: String },
}

impl Segment {
    pub fn prose(text: impl Into<String>) -> Self {
        Self::Prose { text: text.into() }
    }

    pub fn code(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self::Code {
            language: language.into(),
            code: code.into(),
        }
    }

    /// Prose lines, one paragraph each. Empty for code segments.
    pub fn paragraphs(&self) -> Vec<&str> {
        match self {
            Self::Prose { text } => text.lines().collect(),
            Self::Code { .. } => Vec::new(),
        }
    }
}

/// Splits message text into prose and fenced code, in original order.
///
/// Whitespace-only prose between blocks is dropped; prose and code are
/// trimmed. An unterminated fence is left as prose.
pub fn render_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for captures in FENCE_RE.captures_iter(text) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        push_prose(&mut segments, &text[cursor..whole.start()]);

        let language = captures.get(1).map_or("", |group| group.as_str());
        let code = captures.get(2).map_or("", |group| group.as_str());
        segments.push(Segment::code(language, code.trim()));
        cursor = whole.end();
    }
    push_prose(&mut segments, &text[cursor..]);

    segments
}

fn push_prose(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::prose(text));
    }
}

/// Code bodies of every fenced block in `text`.
pub fn code_blocks(text: &str) -> Vec<String> {
    render_segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Code { code, .. } => Some(code),
            Segment::Prose { .. } => None,
        })
        .collect()
}

/// System clipboard seam.
pub trait Clipboard: Send + Sync {
    fn set_text(&self, text: &str) -> CodeActionResult<()>;
}

/// Per-block copy and insert actions.
#[derive(Clone)]
pub struct CodeActions {
    bridge: Bridge,
    clipboard: Arc<dyn Clipboard>,
}

impl CodeActions {
    pub fn new(bridge: Bridge, clipboard: Arc<dyn Clipboard>) -> Self {
        Self { bridge, clipboard }
    }

    /// Copies locally. Never touches the bridge.
    pub fn copy(&self, code: &str) -> CodeActionResult<()> {
        self.clipboard.set_text(code)
    }

    pub async fn insert(&self, code: &str) -> CodeActionResult<()> {
        self.bridge
            .insert_text(code)
            .await
            .context(InsertSnafu { stage: "insert-code" })
    }

    pub fn copy_block(&self, text: &str, index: usize) -> CodeActionResult<String> {
        let code = block_at(text, index)?;
        self.copy(&code)?;
        Ok(code)
    }

    pub async fn insert_block(&self, text: &str, index: usize) -> CodeActionResult<String> {
        let code = block_at(text, index)?;
        self.insert(&code).await?;
        Ok(code)
    }
}

fn block_at(text: &str, index: usize) -> CodeActionResult<String> {
    code_blocks(text)
        .into_iter()
        .nth(index)
        .context(NoSuchBlockSnafu {
            stage: "select-code-block",
            index,
        })
}
