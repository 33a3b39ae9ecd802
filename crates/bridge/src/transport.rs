use std::future::Future;
use std::pin::Pin;

use snafu::{OptionExt, ResultExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};

use super::envelope::OutboundEnvelope;
use super::error::{BridgeResult, EncodeEnvelopeSnafu, TransportClosedSnafu, TransportSnafu};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound half of the boundary channel.
pub trait HostTransport: Send + Sync {
    fn post<'a>(&'a self, envelope: OutboundEnvelope) -> BoxFuture<'a, BridgeResult<()>>;
}

/// Newline-delimited JSON over any async writer (TCP socket, pipe, stdout).
pub struct LineTransport<W> {
    writer: Mutex<W>,
}

impl<W> LineTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W> HostTransport for LineTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn post<'a>(&'a self, envelope: OutboundEnvelope) -> BoxFuture<'a, BridgeResult<()>> {
        Box::pin(async move {
            let mut line = serde_json::to_string(&envelope).context(EncodeEnvelopeSnafu {
                stage: "serialize-line",
                command: envelope.command.clone(),
            })?;
            line.push('\n');

            let mut writer = self.writer.lock().await;
            writer
                .write_all(line.as_bytes())
                .await
                .context(TransportSnafu {
                    stage: "write-line",
                    command: envelope.command.clone(),
                })?;
            writer.flush().await.context(TransportSnafu {
                stage: "flush-line",
                command: envelope.command,
            })
        })
    }
}

/// In-process transport; the host side holds the receiver.
pub struct ChannelTransport {
    sender: mpsc::UnboundedSender<OutboundEnvelope>,
}

impl ChannelTransport {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundEnvelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl HostTransport for ChannelTransport {
    fn post<'a>(&'a self, envelope: OutboundEnvelope) -> BoxFuture<'a, BridgeResult<()>> {
        Box::pin(async move {
            let command = envelope.command.clone();
            self.sender.send(envelope).ok().context(TransportClosedSnafu {
                stage: "channel-send",
                command,
            })
        })
    }
}
