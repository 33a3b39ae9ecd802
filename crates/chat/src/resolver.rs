use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use codeassist_bridge::{Bridge, BridgeResult};
use futures::future::join_all;
use parking_lot::Mutex;

use super::error::{FetchFailedSnafu, FileFailure, ResolveResult};
use super::message::Attachment;

/// Fills in missing file content before a message is sent.
#[derive(Clone)]
pub struct AttachmentResolver {
    bridge: Bridge,
}

impl AttachmentResolver {
    pub fn new(bridge: Bridge) -> Self {
        Self { bridge }
    }

    /// Fetches every file attachment lacking content, concurrently.
    ///
    /// Either all fetches succeed and the attachments come back with content,
    /// or the whole batch fails and lists each file that could not be read.
    pub async fn resolve(&self, attachments: Vec<Attachment>) -> ResolveResult<Vec<Attachment>> {
        let fetches = attachments.iter().map(|attachment| async move {
            if attachment.needs_content() {
                Some(self.bridge.get_file_content(&attachment.name).await)
            } else {
                None
            }
        });
        let results: Vec<Option<BridgeResult<String>>> = join_all(fetches).await;

        let mut resolved = Vec::with_capacity(attachments.len());
        let mut failures = Vec::new();
        for (mut attachment, result) in attachments.into_iter().zip(results) {
            match result {
                Some(Ok(content)) => attachment.content = Some(content),
                Some(Err(error)) => {
                    tracing::warn!(
                        file_name = %attachment.name,
                        error = %error,
                        "attachment fetch failed"
                    );
                    failures.push(FileFailure {
                        file_name: attachment.name.clone(),
                        error,
                    });
                }
                None => {}
            }
            resolved.push(attachment);
        }

        if !failures.is_empty() {
            return FetchFailedSnafu {
                stage: "resolve-attachments",
                failures,
            }
            .fail();
        }
        Ok(resolved)
    }
}

/// Display-only `data:` URI previews for image attachments, keyed by name.
#[derive(Clone)]
pub struct PreviewCache {
    bridge: Bridge,
    previews: Arc<Mutex<HashMap<String, String>>>,
}

impl PreviewCache {
    pub fn new(bridge: Bridge) -> Self {
        Self {
            bridge,
            previews: Arc::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.previews.lock().get(name).cloned()
    }

    /// Best effort: a failed fetch leaves the cache untouched.
    pub async fn prefetch(&self, attachment: &Attachment) -> Option<String> {
        if attachment.is_file() {
            return None;
        }
        if let Some(preview) = self.get(&attachment.name) {
            return Some(preview);
        }

        match self.bridge.get_file_content_base64(&attachment.name).await {
            Ok(encoded) => {
                let preview = format!(
                    "data:{};base64,{}",
                    image_mime(&attachment.name),
                    encoded.trim()
                );
                self.previews
                    .lock()
                    .insert(attachment.name.clone(), preview.clone());
                Some(preview)
            }
            Err(error) => {
                tracing::debug!(
                    file_name = %attachment.name,
                    error = %error,
                    "image preview unavailable"
                );
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.previews.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn image_mime(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use codeassist_bridge::{ChannelTransport, GET_FILE_CONTENT, InboundMessage};
    use serde_json::json;

    use super::*;
    use crate::test_support::encode;

    /// Serves `getFileContent` for every name except those in `missing`.
    fn host_with_missing(missing: &'static [&'static str], calls: Arc<AtomicUsize>) -> Bridge {
        let (transport, mut outbound) = ChannelTransport::channel();
        let bridge = Bridge::connected(Arc::new(transport));
        let host = bridge.clone();
        tokio::spawn(async move {
            while let Some(envelope) = outbound.recv().await {
                let Some(request_id) = envelope.request_id() else {
                    continue;
                };
                assert_eq!(envelope.command, GET_FILE_CONTENT);
                calls.fetch_add(1, Ordering::SeqCst);
                let name = envelope.data["fileName"].as_str().unwrap_or_default();
                let reply = if missing.contains(&name) {
                    InboundMessage::error_reply(&request_id, "file not found")
                } else {
                    InboundMessage::reply(&request_id, json!({ "content": encode(name) }))
                };
                host.dispatch(reply);
            }
        });
        bridge
    }

    #[tokio::test]
    async fn fills_missing_file_content_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = AttachmentResolver::new(host_with_missing(&[], calls.clone()));

        let resolved = resolver
            .resolve(vec![
                Attachment::file("a.ts"),
                Attachment::file("b.ts").with_content("cached"),
                Attachment::image("logo.png"),
            ])
            .await
            .unwrap();

        assert_eq!(resolved[0].content.as_deref(), Some("a.ts"));
        assert_eq!(resolved[1].content.as_deref(), Some("cached"));
        assert_eq!(resolved[2].content, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn one_failure_fails_the_batch_and_names_each_file() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver =
            AttachmentResolver::new(host_with_missing(&["gone.ts", "lost.ts"], calls.clone()));

        let error = resolver
            .resolve(vec![
                Attachment::file("ok.ts"),
                Attachment::file("gone.ts"),
                Attachment::file("lost.ts"),
            ])
            .await
            .unwrap_err();

        assert_eq!(error.failed_files(), ["gone.ts", "lost.ts"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn detached_bridge_reports_no_host_per_file() {
        let resolver = AttachmentResolver::new(Bridge::detached());

        let error = resolver
            .resolve(vec![Attachment::file("a.ts")])
            .await
            .unwrap_err();

        assert!(error.failures()[0].error.is_no_host());
    }

    #[tokio::test]
    async fn previews_are_cached_data_uris() {
        let cache = PreviewCache::new(Bridge::fallback());

        let preview = cache
            .prefetch(&Attachment::image("mock/image.png"))
            .await
            .unwrap();

        assert!(preview.starts_with("data:image/png;base64,"));
        assert_eq!(cache.get("mock/image.png"), Some(preview));
        assert!(cache.prefetch(&Attachment::file("a.ts")).await.is_none());
    }

    #[tokio::test]
    async fn preview_failures_are_swallowed() {
        let cache = PreviewCache::new(Bridge::detached());

        assert!(cache.prefetch(&Attachment::image("logo.gif")).await.is_none());
        assert!(cache.is_empty());
    }
}
