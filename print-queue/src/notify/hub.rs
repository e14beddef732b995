//! Real-time hub transport
//!
//! TCP connection to the hub that relays events to tablets and the
//! monitor. Frames are `[type: u8][len: u32 LE][payload]`:
//!
//! ```text
//! 0x01 handshake  {"token": "..."}
//! 0x02 event      {"room": "...", "event": "...", "data": {...}}
//! ```
//!
//! The connection loop owns an explicit [`ConnectionState`]. Publishing
//! only queues a frame when the state is `Connected`; frames still queued
//! when the connection drops are discarded, never replayed.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{EventPublisher, NotifyError, NotifyResult};

/// Frame type bytes
pub const FRAME_HANDSHAKE: u8 = 0x01;
pub const FRAME_EVENT: u8 = 0x02;

/// Largest inbound frame accepted from the hub
const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Frames buffered while connected
const QUEUE_CAPACITY: usize = 256;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub addr: String,
    pub token: String,
    pub reconnect_delay: Duration,
}

/// Encode one frame
pub fn encode_frame(kind: u8, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(5 + payload.len());
    data.push(kind);
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(payload);
    data
}

/// Read one frame
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let mut type_buf = [0u8; 1];
    reader.read_exact(&mut type_buf).await?;

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok((type_buf[0], payload))
}

/// Why a connected session ended
enum SessionEnd {
    Shutdown,
    Dropped(String),
}

/// Publisher side of the hub connection
pub struct HubPublisher {
    state: Arc<RwLock<ConnectionState>>,
    tx: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
}

impl HubPublisher {
    /// Create the publisher and its connection loop
    ///
    /// The returned future must be spawned; it reconnects with a fixed
    /// delay until `shutdown` is cancelled or [`close`](EventPublisher::close)
    /// is called.
    pub fn new(
        config: HubConfig,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, impl std::future::Future<Output = ()> + Send + 'static) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let publisher = Arc::new(Self {
            state: state.clone(),
            tx,
            shutdown: shutdown.clone(),
        });
        (publisher, connection_loop(config, state, rx, shutdown))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }
}

#[async_trait]
impl EventPublisher for HubPublisher {
    async fn publish(&self, room: &str, event: &str, payload: &Value) -> NotifyResult<()> {
        if self.state() != ConnectionState::Connected {
            return Err(NotifyError::NotConnected);
        }
        let body = serde_json::to_vec(&json!({
            "room": room,
            "event": event,
            "data": payload,
        }))?;
        self.tx
            .try_send(encode_frame(FRAME_EVENT, &body))
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => NotifyError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => NotifyError::NotConnected,
            })
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}

async fn connection_loop(
    config: HubConfig,
    state: Arc<RwLock<ConnectionState>>,
    mut rx: mpsc::Receiver<Vec<u8>>,
    shutdown: CancellationToken,
) {
    tracing::info!(addr = %config.addr, "Event hub connection loop started");
    let mut attempt: u64 = 0;

    while !shutdown.is_cancelled() {
        *state.write() = ConnectionState::Connecting;
        attempt += 1;

        match connect(&config).await {
            Ok(stream) => {
                *state.write() = ConnectionState::Connected;
                tracing::info!(addr = %config.addr, attempt, "Connected to event hub");
                attempt = 0;

                let end = run_session(stream, &mut rx, &shutdown).await;
                *state.write() = ConnectionState::Disconnected;

                let dropped = drain(&mut rx);
                if dropped > 0 {
                    tracing::warn!(dropped, "Discarded undelivered events");
                }
                match end {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Dropped(reason) => {
                        tracing::warn!(reason = %reason, "Event hub connection lost");
                    }
                }
            }
            Err(e) => {
                *state.write() = ConnectionState::Disconnected;
                tracing::warn!(addr = %config.addr, attempt, error = %e, "Event hub unreachable");
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    *state.write() = ConnectionState::Disconnected;
    drain(&mut rx);
    tracing::info!("Event hub connection loop stopped");
}

async fn connect(config: &HubConfig) -> std::io::Result<TcpStream> {
    let mut stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&config.addr))
        .await
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timeout"))??;
    stream.set_nodelay(true)?;

    let handshake = serde_json::to_vec(&json!({ "token": config.token }))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    stream
        .write_all(&encode_frame(FRAME_HANDSHAKE, &handshake))
        .await?;
    Ok(stream)
}

async fn run_session(
    stream: TcpStream,
    rx: &mut mpsc::Receiver<Vec<u8>>,
    shutdown: &CancellationToken,
) -> SessionEnd {
    let (mut reader, mut writer) = stream.into_split();

    // Inbound frames are acknowledgements only; EOF means the hub hung up.
    let mut inbound = tokio::spawn(async move {
        loop {
            match read_frame(&mut reader).await {
                Ok((kind, payload)) => {
                    tracing::trace!(kind, len = payload.len(), "Frame from event hub");
                }
                Err(e) => return e,
            }
        }
    });

    let end = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    break SessionEnd::Shutdown;
                };
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    break SessionEnd::Dropped(format!("write failed: {e}"));
                }
            }
            result = &mut inbound => {
                let reason = match result {
                    Ok(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => "closed by hub".to_string(),
                    Ok(e) => format!("read failed: {e}"),
                    Err(e) => format!("reader task failed: {e}"),
                };
                break SessionEnd::Dropped(reason);
            }
        }
    };

    inbound.abort();
    let _ = writer.shutdown().await;
    end
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

fn drain(rx: &mut mpsc::Receiver<Vec<u8>>) -> usize {
    let mut dropped = 0;
    while rx.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn wait_for(publisher: &HubPublisher, wanted: ConnectionState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while publisher.state() != wanted {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn config(addr: String) -> HubConfig {
        HubConfig {
            addr,
            token: "secret".into(),
            reconnect_delay: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_frame_layout() {
        let frame = encode_frame(FRAME_EVENT, b"{}");
        assert_eq!(frame, vec![0x02, 2, 0, 0, 0, b'{', b'}']);
    }

    #[tokio::test]
    async fn test_read_frame_roundtrip_and_limit() {
        let frame = encode_frame(FRAME_HANDSHAKE, b"abc");
        let (kind, payload) = read_frame(&mut frame.as_slice()).await.unwrap();
        assert_eq!(kind, FRAME_HANDSHAKE);
        assert_eq!(payload, b"abc");

        let mut huge = vec![FRAME_EVENT];
        huge.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(read_frame(&mut huge.as_slice()).await.is_err());
    }

    #[tokio::test]
    async fn test_publish_while_disconnected_is_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let shutdown = CancellationToken::new();
        let (publisher, run) = HubPublisher::new(config(addr), shutdown.clone());
        let handle = tokio::spawn(run);

        let err = publisher
            .publish("monitor", "print:success", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::NotConnected));

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_handshake_events_and_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let shutdown = CancellationToken::new();
        let (publisher, run) = HubPublisher::new(config(addr), shutdown.clone());
        let handle = tokio::spawn(run);

        // first session: handshake then one event, then the hub hangs up
        let (mut socket, _) = listener.accept().await.unwrap();
        let (kind, payload) = read_frame(&mut socket).await.unwrap();
        assert_eq!(kind, FRAME_HANDSHAKE);
        let hello: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(hello["token"], "secret");

        wait_for(&publisher, ConnectionState::Connected).await;
        publisher
            .publish("tablets", "print:failed", &json!({ "id": 9 }))
            .await
            .unwrap();

        let (kind, payload) = read_frame(&mut socket).await.unwrap();
        assert_eq!(kind, FRAME_EVENT);
        let event: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(event["room"], "tablets");
        assert_eq!(event["event"], "print:failed");
        assert_eq!(event["data"]["id"], 9);
        drop(socket);

        // the loop notices and reconnects on its own
        let (mut socket, _) = listener.accept().await.unwrap();
        let (kind, _) = read_frame(&mut socket).await.unwrap();
        assert_eq!(kind, FRAME_HANDSHAKE);
        wait_for(&publisher, ConnectionState::Connected).await;

        publisher.close().await;
        handle.await.unwrap();
        assert_eq!(publisher.state(), ConnectionState::Disconnected);
    }
}
