use codeassist_chat::{Clipboard, CodeActionError, CodeActionResult};
use parking_lot::Mutex;

/// System clipboard, opened on first use.
///
/// Headless sessions have no clipboard; copying then fails with a clear error
/// instead of aborting startup.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Mutex<Option<arboard::Clipboard>>,
}

impl Clipboard for SystemClipboard {
    fn set_text(&self, text: &str) -> CodeActionResult<()> {
        let mut inner = self.inner.lock();
        if inner.is_none() {
            let clipboard =
                arboard::Clipboard::new().map_err(|error| clipboard_error("open", error))?;
            *inner = Some(clipboard);
        }

        if let Some(clipboard) = inner.as_mut() {
            clipboard
                .set_text(text.to_string())
                .map_err(|error| clipboard_error("set-text", error))?;
            tracing::debug!(chars = text.len(), "copied code block to clipboard");
        }
        Ok(())
    }
}

fn clipboard_error(step: &'static str, error: arboard::Error) -> CodeActionError {
    tracing::error!(step, error = %error, "clipboard operation failed");
    CodeActionError::Clipboard {
        stage: step,
        message: error.to_string(),
    }
}
