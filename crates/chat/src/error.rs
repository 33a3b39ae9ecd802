use std::fmt;

use codeassist_bridge::BridgeError;
use snafu::Snafu;

/// One attachment whose content could not be fetched.
#[derive(Debug)]
pub struct FileFailure {
    pub file_name: String,
    pub error: BridgeError,
}

impl fmt::Display for FileFailure {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.file_name, self.error)
    }
}

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ResolveError {
    #[snafu(display("failed to fetch {} attachment(s): {}", failures.len(), summary(failures)))]
    FetchFailed {
        stage: &'static str,
        failures: Vec<FileFailure>,
    },
}

impl ResolveError {
    pub fn failures(&self) -> &[FileFailure] {
        match self {
            Self::FetchFailed { failures, .. } => failures,
        }
    }

    pub fn failed_files(&self) -> Vec<&str> {
        self.failures()
            .iter()
            .map(|failure| failure.file_name.as_str())
            .collect()
    }
}

fn summary(failures: &[FileFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type CodeActionResult<T> = Result<T, CodeActionError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodeActionError {
    #[snafu(display("clipboard is unavailable: {message}"))]
    Clipboard {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("failed to insert code into the editor: {source}"))]
    Insert {
        stage: &'static str,
        source: BridgeError,
    },
    #[snafu(display("no code block at index {index}"))]
    NoSuchBlock { stage: &'static str, index: usize },
}
