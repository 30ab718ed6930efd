//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of panel
//! events to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::events::PanelEvent;
use crate::state::PanelCommand;

use super::protocol::{
    Notification, PanelStatus, ProtocolError, Request, Response, MAX_MESSAGE_LEN,
};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<RwLock<ServerState>>,
    shutdown_tx: broadcast::Sender<()>,
    /// Forwards client intents to the view-model
    command_tx: mpsc::Sender<PanelCommand>,
    /// Source of notifications for subscribed clients
    event_tx: broadcast::Sender<PanelEvent>,
}

/// Shared server state
struct ServerState {
    status: PanelStatus,
    start_time: std::time::Instant,
}

/// Everything a client handler needs
#[derive(Clone)]
struct ClientContext {
    state: Arc<RwLock<ServerState>>,
    command_tx: mpsc::Sender<PanelCommand>,
    event_tx: broadcast::Sender<PanelEvent>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(
        socket_path: &Path,
        command_tx: mpsc::Sender<PanelCommand>,
        event_tx: broadcast::Sender<PanelEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(RwLock::new(ServerState {
            status: PanelStatus::default(),
            start_time: std::time::Instant::now(),
        }));

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
            command_tx,
            event_tx,
        })
    }

    /// Fold a panel event into the status served to clients
    pub async fn apply_event(&self, event: &PanelEvent) {
        let mut state = self.state.write().await;
        state.status.apply(event);
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let ctx = ClientContext {
                        state: Arc::clone(&self.state),
                        command_tx: self.command_tx.clone(),
                        event_tx: self.event_tx.clone(),
                    };
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, ctx) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, ctx: ClientContext) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();

        // Frames are read on their own task so a push notification never
        // interrupts a partially read request.
        let (frame_tx, mut frame_rx) = mpsc::channel::<Result<Vec<u8>, ProtocolError>>(8);
        let read_task = tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(frame)) => {
                        if frame_tx.send(Ok(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let _ = frame_tx.send(Err(e)).await;
                        break;
                    }
                }
            }
        });

        let mut events: Option<broadcast::Receiver<PanelEvent>> = None;

        let result: Result<()> = loop {
            tokio::select! {
                frame = frame_rx.recv() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(ProtocolError::TooLarge(len))) => {
                            warn!(len, "message too large, disconnecting");
                            break Ok(());
                        }
                        Some(Err(e)) => break Err(e.into()),
                        None => {
                            debug!("client disconnected");
                            break Ok(());
                        }
                    };

                    let response = match serde_json::from_slice::<Request>(&frame) {
                        Ok(request) => {
                            debug!(?request, "received request");
                            if matches!(request, Request::Subscribe) && events.is_none() {
                                events = Some(ctx.event_tx.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            Self::process_request(request, &ctx).await
                        }
                        Err(e) => {
                            let e = ProtocolError::from(e);
                            warn!(%e, "failed to parse request");
                            Response::Error {
                                code: e.code().to_string(),
                                message: e.to_string(),
                            }
                        }
                    };

                    if let Err(e) = send_message(&mut writer, &response).await {
                        break Err(e.into());
                    }
                }

                event = next_event(&mut events), if events.is_some() => {
                    match event {
                        Ok(event) => {
                            let notification = Notification::PanelEvent(event);
                            if let Err(e) = send_message(&mut writer, &notification).await {
                                break Err(e.into());
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged behind panel events");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events = None;
                        }
                    }
                }
            }
        };

        read_task.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, ctx: &ClientContext) -> Response {
        match request {
            Request::Ping => Response::Pong,

            Request::Subscribe => Response::Subscribed,

            Request::GetStatus => {
                let mut state = ctx.state.write().await;
                state.status.uptime_secs = state.start_time.elapsed().as_secs();
                Response::Status(state.status.clone())
            }

            request => {
                let Some(command) = request.into_command() else {
                    return Response::Error {
                        code: "unsupported".to_string(),
                        message: "request carries no command".to_string(),
                    };
                };
                match ctx.command_tx.send(command).await {
                    Ok(()) => Response::Accepted,
                    Err(_) => Response::Error {
                        code: "unavailable".to_string(),
                        message: "panel is shutting down".to_string(),
                    },
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Read one length-prefixed frame. Returns `None` on a clean disconnect.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLarge(len));
    }

    let mut msg_buf = vec![0u8; len];
    reader.read_exact(&mut msg_buf).await?;
    Ok(Some(msg_buf))
}

/// Send a length-prefixed JSON message
async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<PanelEvent>>,
) -> Result<PanelEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::device::Device;

    static NEXT_SOCKET: AtomicUsize = AtomicUsize::new(0);

    fn socket_path() -> PathBuf {
        std::env::temp_dir().join(format!(
            "home-panel-test-{}-{}.sock",
            std::process::id(),
            NEXT_SOCKET.fetch_add(1, Ordering::SeqCst)
        ))
    }

    struct Fixture {
        server: Arc<Server>,
        command_rx: mpsc::Receiver<PanelCommand>,
        event_tx: broadcast::Sender<PanelEvent>,
        path: PathBuf,
    }

    fn start_server() -> Fixture {
        let path = socket_path();
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, _) = broadcast::channel(16);
        let server = Arc::new(Server::new(&path, command_tx, event_tx.clone()).unwrap());

        let running = Arc::clone(&server);
        tokio::spawn(async move {
            let _ = running.run().await;
        });

        Fixture {
            server,
            command_rx,
            event_tx,
            path,
        }
    }

    async fn request(stream: &mut UnixStream, request: &Request) -> serde_json::Value {
        send_message(stream, request).await.unwrap();
        read_value(stream).await
    }

    async fn read_value(stream: &mut UnixStream) -> serde_json::Value {
        let frame = tokio::time::timeout(Duration::from_secs(1), read_frame(stream))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_ping_and_status() {
        let fixture = start_server();
        let mut stream = UnixStream::connect(&fixture.path).await.unwrap();

        let pong = request(&mut stream, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        fixture
            .server
            .apply_event(&PanelEvent::DeviceChanged {
                device: Device::Window,
                value: "open".to_string(),
                checked: true,
            })
            .await;

        let status = request(&mut stream, &Request::GetStatus).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["devices"]["window"]["value"], "open");
        assert_eq!(status["devices"]["window"]["checked"], true);
        assert_eq!(status["devices"]["door"]["value"], "Unknown");

        fixture.server.shutdown().await;
        assert!(!fixture.path.exists());
    }

    #[tokio::test]
    async fn test_toggle_forwarded_to_view_model() {
        let mut fixture = start_server();
        let mut stream = UnixStream::connect(&fixture.path).await.unwrap();

        let response = request(
            &mut stream,
            &Request::Toggle {
                device: Device::Door,
                checked: false,
            },
        )
        .await;
        assert_eq!(response["type"], "accepted");

        let command = fixture.command_rx.recv().await.unwrap();
        assert!(matches!(
            command,
            PanelCommand::Toggle {
                device: Device::Door,
                checked: false
            }
        ));

        fixture.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_request_gets_error() {
        let fixture = start_server();
        let mut stream = UnixStream::connect(&fixture.path).await.unwrap();

        let body = br#"{"type":"launch_rockets"}"#;
        stream.write_all(&(body.len() as u32).to_le_bytes()).await.unwrap();
        stream.write_all(body).await.unwrap();

        let response = read_value(&mut stream).await;
        assert_eq!(response["type"], "error");
        assert_eq!(response["code"], "malformed_request");

        // Connection stays usable
        let pong = request(&mut stream, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        fixture.server.shutdown().await;
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let fixture = start_server();
        let mut stream = UnixStream::connect(&fixture.path).await.unwrap();

        let response = request(&mut stream, &Request::Subscribe).await;
        assert_eq!(response["type"], "subscribed");

        fixture
            .event_tx
            .send(PanelEvent::TranscriptRecognized {
                text: "light on".to_string(),
            })
            .unwrap();

        let notification = read_value(&mut stream).await;
        assert_eq!(notification["type"], "panel_event");
        assert_eq!(notification["event"]["text"], "light on");

        fixture.server.shutdown().await;
    }
}
