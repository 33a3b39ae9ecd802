use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, ensure};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::envelope::{HostReply, InboundMessage, OutboundEnvelope, RequestId};
use super::error::{
    BridgeResult, ConnectSnafu, HostRejectedSnafu, NoHostSnafu, ReplyDroppedSnafu,
};
use super::fallback;
use super::transport::{HostTransport, LineTransport};

pub type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// How the bridge reaches (or fails to reach) a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostMode {
    /// A live host answers requests.
    Connected,
    /// No host; a fixed set of commands gets canned answers so the UI stays usable.
    Fallback,
    /// No host; every request fails fast.
    Detached,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Reply,
    Broadcast { delivered: usize },
    Ignored,
}

enum Host {
    Connected(Arc<dyn HostTransport>),
    Fallback,
    Detached,
}

struct PendingRequest {
    command: String,
    reply_tx: oneshot::Sender<HostReply>,
}

struct Listener {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback,
}

struct BridgeInner {
    host: Host,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    listeners: Mutex<HashMap<String, Vec<Listener>>>,
    next_listener_id: AtomicU64,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl BridgeInner {
    fn remove_listener(&self, command: &str, id: u64) {
        let mut listeners = self.listeners.lock();
        if let Some(entries) = listeners.get_mut(command) {
            entries.retain(|listener| listener.id != id);
            if entries.is_empty() {
                listeners.remove(command);
            }
        }
    }

    fn ensure_open(&self, command: &str) -> BridgeResult<()> {
        ensure!(
            !self.closed.load(Ordering::SeqCst),
            NoHostSnafu {
                stage: "host-closed",
                command,
            }
        );
        Ok(())
    }

    /// Marks the host gone, then fails whatever is still pending.
    fn close(&self, reason: &'static str) {
        self.closed.store(true, Ordering::SeqCst);
        self.drop_pending(reason);
    }

    fn drop_pending(&self, reason: &'static str) {
        let dropped = std::mem::take(&mut *self.pending.lock());
        if !dropped.is_empty() {
            tracing::debug!(
                pending = dropped.len(),
                reason,
                "dropping unanswered host requests"
            );
        }
    }
}

/// Handle to the single boundary channel between the chat core and its host.
///
/// Cloning shares the same pending-request map and subscription registry.
/// The instance lives until [`Bridge::shutdown`]; there is no global state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    fn with_host(host: Host) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                host,
                pending: Mutex::new(HashMap::new()),
                listeners: Mutex::new(HashMap::new()),
                next_listener_id: AtomicU64::new(1),
                reader_task: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn connected(transport: Arc<dyn HostTransport>) -> Self {
        Self::with_host(Host::Connected(transport))
    }

    pub fn fallback() -> Self {
        Self::with_host(Host::Fallback)
    }

    pub fn detached() -> Self {
        Self::with_host(Host::Detached)
    }

    /// Connects to a host speaking newline-delimited JSON over TCP.
    pub async fn connect_tcp(address: &str) -> BridgeResult<Self> {
        let stream = TcpStream::connect(address).await.context(ConnectSnafu {
            stage: "tcp-connect",
            address,
        })?;
        let (reader, writer) = stream.into_split();

        let bridge = Self::connected(Arc::new(LineTransport::new(writer)));
        bridge.spawn_reader(reader);
        tracing::info!(%address, "connected to host");
        Ok(bridge)
    }

    pub fn mode(&self) -> HostMode {
        match self.inner.host {
            Host::Connected(_) => HostMode::Connected,
            Host::Fallback => HostMode::Fallback,
            Host::Detached => HostMode::Detached,
        }
    }

    /// True once the host closed the channel or the bridge was shut down.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Sends `command` and waits for the reply carrying the same request id.
    ///
    /// There is no timeout: an unanswered request stays pending until the
    /// host closes the channel or the bridge shuts down. Once the channel is
    /// closed every request fails fast with [`BridgeError::NoHost`].
    ///
    /// [`BridgeError::NoHost`]: crate::BridgeError::NoHost
    pub async fn request(&self, command: &str, payload: Value) -> BridgeResult<Value> {
        let transport = match &self.inner.host {
            Host::Connected(transport) => transport.clone(),
            Host::Fallback => return fallback::respond(command, &payload),
            Host::Detached => {
                return NoHostSnafu {
                    stage: "request",
                    command,
                }
                .fail();
            }
        };

        self.inner.ensure_open(command)?;
        let request_id = RequestId::generate(command);
        let envelope = OutboundEnvelope::request(command, payload, &request_id)?;
        let (reply_tx, reply_rx) = oneshot::channel();

        // Register before posting so a fast reply always finds its entry.
        self.inner.pending.lock().insert(
            request_id.clone(),
            PendingRequest {
                command: command.to_string(),
                reply_tx,
            },
        );
        // The reader may have closed between the first check and the insert.
        if let Err(error) = self.inner.ensure_open(command) {
            self.inner.pending.lock().remove(&request_id);
            return Err(error);
        }

        tracing::trace!(command, request_id = %request_id, "posting request to host");
        if let Err(error) = transport.post(envelope).await {
            self.inner.pending.lock().remove(&request_id);
            return Err(error);
        }

        let reply = reply_rx.await.ok().context(ReplyDroppedSnafu {
            stage: "await-reply",
            command,
            request_id: request_id.to_string(),
        })?;

        match reply {
            HostReply::Data(data) => Ok(data),
            HostReply::Error(message) => HostRejectedSnafu {
                stage: "host-reply",
                command,
                message,
            }
            .fail(),
        }
    }

    /// Fire-and-forget message. Without a host it is logged and dropped.
    pub async fn notify(&self, command: &str, payload: Value) -> BridgeResult<()> {
        let envelope = OutboundEnvelope::notification(command, payload)?;
        match &self.inner.host {
            Host::Connected(transport) => {
                self.inner.ensure_open(command)?;
                transport.post(envelope).await
            }
            Host::Fallback | Host::Detached => {
                tracing::info!(command, "no host attached, message not sent");
                Ok(())
            }
        }
    }

    /// Registers `callback` for host-pushed `command` broadcasts.
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe<F>(&self, command: &str, callback: F) -> Subscription
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.inner
            .listeners
            .lock()
            .entry(command.to_string())
            .or_default()
            .push(Listener {
                id,
                active: active.clone(),
                callback: Arc::new(callback),
            });

        Subscription {
            bridge: Arc::downgrade(&self.inner),
            command: command.to_string(),
            id,
            active,
        }
    }

    /// Routes one inbound message.
    ///
    /// A message whose `requestId` matches a pending request is consumed as
    /// that request's reply and never reaches subscribers. Everything else is
    /// delivered by `command`; unmatched messages are ignored.
    pub fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        if let Some(request_id) = message.request_id.clone() {
            let pending = self.inner.pending.lock().remove(&request_id);
            if let Some(pending) = pending {
                tracing::trace!(
                    command = %pending.command,
                    request_id = %request_id,
                    "routing reply to pending request"
                );
                // The requester may have given up; the entry is consumed either way.
                let _ = pending.reply_tx.send(message.into_reply());
                return DispatchOutcome::Reply;
            }
        }

        let Some(command) = message.command.as_deref() else {
            tracing::debug!(
                request_id = ?message.request_id,
                "ignoring reply with no pending request"
            );
            return DispatchOutcome::Ignored;
        };

        let snapshot = self
            .inner
            .listeners
            .lock()
            .get(command)
            .map(|entries| {
                entries
                    .iter()
                    .map(|listener| (listener.active.clone(), listener.callback.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::debug!(command, "ignoring broadcast without listeners");
            return DispatchOutcome::Ignored;
        }

        let data = message.data.unwrap_or(Value::Null);
        let mut delivered = 0;
        for (active, callback) in snapshot {
            // Callbacks run outside the registry lock, so one may unsubscribe another.
            if active.load(Ordering::Acquire) {
                callback(data.clone());
                delivered += 1;
            }
        }

        DispatchOutcome::Broadcast { delivered }
    }

    /// Reads newline-delimited JSON from `reader` and dispatches each message.
    ///
    /// When the host closes the stream every pending request fails.
    pub fn spawn_reader<R>(&self, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let bridge = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::info!("host closed the channel");
                        break;
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "failed to read from host");
                        break;
                    }
                };

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let message = match serde_json::from_str::<InboundMessage>(trimmed) {
                    Ok(message) => message,
                    Err(error) => {
                        tracing::warn!(error = %error, "skipping malformed host message");
                        continue;
                    }
                };

                let Some(inner) = bridge.upgrade() else {
                    return;
                };
                Bridge { inner }.dispatch(message);
            }

            if let Some(inner) = bridge.upgrade() {
                inner.close("host-eof");
            }
        });

        if let Some(previous) = self.inner.reader_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Tears the bridge down: stops the reader, fails every pending request
    /// and clears all subscriptions.
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.reader_task.lock().take() {
            task.abort();
        }

        self.inner.close("shutdown");

        let listeners = std::mem::take(&mut *self.inner.listeners.lock());
        for listener in listeners.into_values().flatten() {
            listener.active.store(false, Ordering::Release);
        }
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.pending.lock().len()
    }

    pub fn listener_count(&self, command: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .get(command)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Registration of one broadcast callback; deregisters it on drop.
#[must_use = "dropping a Subscription unsubscribes its callback"]
pub struct Subscription {
    bridge: Weak<BridgeInner>,
    command: String,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(inner) = self.bridge.upgrade() {
            inner.remove_listener(&self.command, self.id);
        }
    }
}
