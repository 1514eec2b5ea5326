//! Hosted transports. Each runs as a tokio task that only ever posts into
//! the device [`Inbox`]; outbound bytes travel back over an unbounded
//! channel.
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use liftpuck_core::{InboundEvent, Inbox, Link, TransportId};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("link closed")]
pub struct LinkClosed;

/// Device-side half of a hosted transport.
#[derive(Debug, Clone)]
pub struct ChannelLink {
    connected: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl Link for ChannelLink {
    type Error = LinkClosed;

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkClosed> {
        self.tx.send(bytes.to_vec()).map_err(|_| LinkClosed)
    }
}

/// Connection changes must not be lost to a momentarily full inbox.
async fn post_state(inbox: &Inbox, event: InboundEvent) {
    for _ in 0..50 {
        if inbox.post(event.clone()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tracing::error!(?event, "inbox stayed full, connection event lost");
}

async fn write_frame<W: AsyncWrite + Unpin>(
    out: &mut W,
    bytes: &[u8],
    delimit: bool,
) -> std::io::Result<()> {
    out.write_all(bytes).await?;
    if delimit {
        out.write_all(b"\n").await?;
    }
    out.flush().await
}

/// Serves one peer at a time on `addr`.
///
/// Inbound data is read as newline-delimited payloads. The wireless link
/// hands over unframed messages, so its frames get a newline on the way
/// out; framed links already carry one.
pub async fn spawn_tcp(
    addr: SocketAddr,
    transport: TransportId,
    inbox: &'static Inbox,
) -> std::io::Result<ChannelLink> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%transport, %addr, "listening");
    let connected = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let link = ChannelLink { connected: connected.clone(), tx };
    let delimit = !transport.is_line_framed();

    tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(%transport, "accept failed: {e}");
                    continue;
                }
            };
            tracing::info!(%transport, %peer, "peer connected");
            while rx.try_recv().is_ok() {}
            connected.store(true, Ordering::Release);
            post_state(inbox, InboundEvent::Connected(transport)).await;

            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            inbox.post(InboundEvent::Payload { from: transport, data: line.into_bytes() });
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::warn!(%transport, "read failed: {e}");
                            break;
                        }
                    },
                    Some(bytes) = rx.recv() => {
                        if let Err(e) = write_frame(&mut write, &bytes, delimit).await {
                            tracing::warn!(%transport, "write failed: {e}");
                            break;
                        }
                    }
                }
            }

            connected.store(false, Ordering::Release);
            post_state(inbox, InboundEvent::Disconnected(transport)).await;
            tracing::info!(%transport, %peer, "peer disconnected");
        }
    });
    Ok(link)
}

/// The wired console on this process's stdin and stdout.
pub async fn spawn_stdio(inbox: &'static Inbox) -> ChannelLink {
    let connected = Arc::new(AtomicBool::new(true));
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let link = ChannelLink { connected: connected.clone(), tx };
    post_state(inbox, InboundEvent::Connected(TransportId::Wired)).await;

    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(bytes) = rx.recv().await {
            if write_frame(&mut stdout, &bytes, false).await.is_err() {
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            inbox.post(InboundEvent::Payload {
                from: TransportId::Wired,
                data: line.into_bytes(),
            });
        }
        connected.store(false, Ordering::Release);
        post_state(inbox, InboundEvent::Disconnected(TransportId::Wired)).await;
    });
    link
}
