//! Input-side helpers: quick actions and `@` file mentions.

use codeassist_bridge::WorkspaceFile;

use super::message::Attachment;

/// Most candidates offered for one `@` query.
pub const MAX_MENTION_CANDIDATES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickAction {
    pub label: &'static str,
    pub text: &'static str,
}

pub const QUICK_ACTIONS: [QuickAction; 3] = [
    QuickAction {
        label: "Summarize",
        text: "Summarize this code.",
    },
    QuickAction {
        label: "Refactor",
        text: "Refactor this code.",
    },
    QuickAction {
        label: "Explain",
        text: "Explain this code.",
    },
];

pub fn quick_action(label: &str) -> Option<QuickAction> {
    QUICK_ACTIONS
        .into_iter()
        .find(|action| action.label.eq_ignore_ascii_case(label))
}

/// The partial file name typed after the last `@`, if a mention is open.
pub fn active_mention(input: &str) -> Option<&str> {
    let at = input.rfind('@')?;
    let query = &input[at + 1..];
    if query.contains(' ') {
        return None;
    }
    Some(query)
}

/// Workspace files matching `query`, case-insensitively, minus those already attached.
pub fn filter_candidates<'a>(
    files: &'a [WorkspaceFile],
    attached: &[Attachment],
    query: &str,
) -> Vec<&'a WorkspaceFile> {
    let query = query.to_lowercase();
    files
        .iter()
        .filter(|file| !attached.iter().any(|attachment| attachment.name == file.name))
        .filter(|file| file.name.to_lowercase().contains(&query))
        .take(MAX_MENTION_CANDIDATES)
        .collect()
}

/// Drops the open mention from `input` once a candidate is picked.
pub fn complete_mention(input: &str) -> String {
    match input.rfind('@') {
        Some(at) => format!("{} ", &input[..at]),
        None => input.to_string(),
    }
}

/// Splits `@name` tokens out of a one-shot input line.
///
/// Names found in `files` keep their kind; anything else is attached as a file.
/// Duplicates are attached once.
pub fn extract_mentions(input: &str, files: &[WorkspaceFile]) -> (String, Vec<Attachment>) {
    let mut words = Vec::new();
    let mut attachments: Vec<Attachment> = Vec::new();

    for word in input.split_whitespace() {
        let Some(name) = word.strip_prefix('@').filter(|name| !name.is_empty()) else {
            words.push(word);
            continue;
        };
        if attachments.iter().any(|attachment| attachment.name == name) {
            continue;
        }
        let attachment = files
            .iter()
            .find(|file| file.name == name)
            .cloned()
            .map(Attachment::from)
            .unwrap_or_else(|| Attachment::file(name));
        attachments.push(attachment);
    }

    (words.join(" "), attachments)
}

/// Pending attachments for the next submission.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    attachments: Vec<Attachment>,
}

impl Composer {
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Returns false if an attachment with that name is already pending.
    pub fn attach(&mut self, attachment: Attachment) -> bool {
        if self
            .attachments
            .iter()
            .any(|pending| pending.name == attachment.name)
        {
            return false;
        }
        self.attachments.push(attachment);
        true
    }

    pub fn detach(&mut self, name: &str) -> Option<Attachment> {
        let index = self
            .attachments
            .iter()
            .position(|attachment| attachment.name == name)?;
        Some(self.attachments.remove(index))
    }

    pub fn clear(&mut self) {
        self.attachments.clear();
    }

    /// Text is sendable if it is non-blank or something is attached.
    pub fn can_send(&self, text: &str) -> bool {
        !text.trim().is_empty() || !self.attachments.is_empty()
    }

    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.attachments)
    }
}

#[cfg(test)]
mod tests {
    use codeassist_bridge::FileKind;

    use super::*;

    fn files() -> Vec<WorkspaceFile> {
        vec![
            WorkspaceFile::new("src/App.tsx", FileKind::File),
            WorkspaceFile::new("src/app.css", FileKind::File),
            WorkspaceFile::new("public/logo.png", FileKind::Image),
        ]
    }

    #[test]
    fn mention_is_open_until_a_space() {
        assert_eq!(active_mention("look at @src/ap"), Some("src/ap"));
        assert_eq!(active_mention("mail a@"), Some(""));
        assert_eq!(active_mention("@src/app.css please"), None);
        assert_eq!(active_mention("no mention"), None);
    }

    #[test]
    fn candidates_are_case_insensitive_and_skip_attached() {
        let files = files();
        let attached = [Attachment::file("src/app.css")];

        let names = filter_candidates(&files, &attached, "APP")
            .into_iter()
            .map(|file| file.name.as_str())
            .collect::<Vec<_>>();

        assert_eq!(names, ["src/App.tsx"]);
    }

    #[test]
    fn candidates_are_capped() {
        let files = (0..80)
            .map(|index| WorkspaceFile::new(format!("f{index}.rs"), FileKind::File))
            .collect::<Vec<_>>();

        assert_eq!(
            filter_candidates(&files, &[], "").len(),
            MAX_MENTION_CANDIDATES
        );
    }

    #[test]
    fn completing_a_mention_strips_the_query() {
        assert_eq!(complete_mention("fix @src/Ap"), "fix  ");
    }

    #[test]
    fn extracts_mentions_with_known_kinds() {
        let (text, attachments) = extract_mentions(
            "@public/logo.png refactor @src/App.tsx now @src/App.tsx @notes.md",
            &files(),
        );

        assert_eq!(text, "refactor now");
        assert_eq!(
            attachments,
            vec![
                Attachment::image("public/logo.png"),
                Attachment::file("src/App.tsx"),
                Attachment::file("notes.md"),
            ]
        );
    }

    #[test]
    fn quick_actions_match_by_label() {
        assert_eq!(quick_action("refactor").map(|action| action.text), Some("Refactor this code."));
        assert!(quick_action("deploy").is_none());
    }

    #[test]
    fn composer_tracks_pending_attachments() {
        let mut composer = Composer::default();

        assert!(!composer.can_send("  "));
        assert!(composer.attach(Attachment::file("a.ts")));
        assert!(!composer.attach(Attachment::file("a.ts")));
        assert!(composer.can_send(""));

        assert_eq!(composer.take().len(), 1);
        assert!(composer.attachments().is_empty());
    }
}
