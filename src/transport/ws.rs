use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tungstenite::{Message, WebSocket};

use crate::detect::BackendRegistry;
use crate::error::SessionError;
use crate::session::protocol::send_event;
use crate::session::{ControllerSettings, ServerEvent, SessionController};

use super::Transport;

/// How long the control loop holds the socket waiting for a message.
const CONTROL_POLL: Duration = Duration::from_millis(25);
/// Pause between polls so the stream task can take the socket.
const WRITER_TURN: Duration = Duration::from_millis(2);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_IDLE: Duration = Duration::from_millis(50);

/// One client's WebSocket, shared by its control loop and stream task.
pub struct WsTransport {
    peer: SocketAddr,
    socket: Mutex<WebSocket<TcpStream>>,
}

impl WsTransport {
    fn new(peer: SocketAddr, socket: WebSocket<TcpStream>) -> Self {
        Self {
            peer,
            socket: Mutex::new(socket),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, WebSocket<TcpStream>>, SessionError> {
        self.socket
            .lock()
            .map_err(|_| SessionError::TransportDisconnected("socket lock poisoned".into()))
    }

    fn send(&self, message: Message) -> Result<(), SessionError> {
        self.lock()?
            .send(message)
            .map_err(|e| SessionError::TransportDisconnected(format!("{}: {}", self.peer, e)))
    }

    /// Wait briefly for the next control message.
    ///
    /// `Ok(None)` when nothing arrived within the poll window.
    fn poll_text(&self) -> Result<Option<String>, SessionError> {
        let mut socket = self.lock()?;
        match socket.read() {
            Ok(Message::Text(text)) => Ok(Some(text)),
            Ok(Message::Binary(_)) => Err(SessionError::MalformedControlMessage(
                "binary control messages are not supported".into(),
            )),
            Ok(Message::Close(_)) => Err(SessionError::TransportDisconnected(
                "client closed the connection".into(),
            )),
            Ok(_) => Ok(None),
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(SessionError::TransportDisconnected(e.to_string())),
        }
    }

    fn close(&self) {
        if let Ok(mut socket) = self.lock() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
    }
}

impl Transport for WsTransport {
    fn send_text(&self, text: &str) -> Result<(), SessionError> {
        self.send(Message::Text(text.to_string()))
    }

    fn send_binary(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.send(Message::Binary(payload))
    }
}

#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    /// Stop accepting, tear down every connection (stopping its session) and wait.
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("stream server thread panicked"))?;
        }
        Ok(())
    }
}

/// WebSocket server: one control loop thread per connection.
pub struct StreamServer {
    listen_addr: String,
    registry: Arc<BackendRegistry>,
    settings: ControllerSettings,
}

impl StreamServer {
    pub fn new(
        listen_addr: impl Into<String>,
        registry: Arc<BackendRegistry>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            registry,
            settings,
        }
    }

    pub fn spawn(self) -> Result<ServerHandle> {
        let configured_addr: SocketAddr = self.listen_addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        log::info!("stream server listening on ws://{}", addr);

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("stream-server".into())
            .spawn(move || {
                if let Err(err) = run_server(listener, self.registry, self.settings, shutdown_thread)
                {
                    log::error!("stream server stopped: {}", err);
                }
            })?;

        Ok(ServerHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    registry: Arc<BackendRegistry>,
    settings: ControllerSettings,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut next_connection: u64 = 0;
    let mut connections: Vec<JoinHandle<()>> = Vec::new();

    while !shutdown.load(Ordering::SeqCst) {
        connections.retain(|conn| !conn.is_finished());
        match listener.accept() {
            Ok((stream, peer)) => {
                next_connection += 1;
                let id = next_connection;
                let registry = registry.clone();
                let settings = settings.clone();
                let shutdown = shutdown.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("conn-{}", id))
                    .spawn(move || {
                        if let Err(err) =
                            serve_connection(id, stream, peer, registry, settings, shutdown)
                        {
                            log::warn!("connection {} ({}) rejected: {}", id, peer, err);
                        }
                    });
                match spawned {
                    Ok(join) => connections.push(join),
                    Err(err) => log::error!("connection {}: thread spawn failed: {}", id, err),
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPT_IDLE);
            }
            Err(err) => return Err(err.into()),
        }
    }

    for conn in connections {
        if conn.join().is_err() {
            log::error!("connection thread panicked");
        }
    }
    Ok(())
}

fn serve_connection(
    id: u64,
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<BackendRegistry>,
    settings: ControllerSettings,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    let socket =
        tungstenite::accept(stream).map_err(|e| anyhow!("websocket handshake failed: {}", e))?;
    socket.get_ref().set_read_timeout(Some(CONTROL_POLL))?;
    log::info!("connection {} opened from {}", id, peer);

    let transport = Arc::new(WsTransport::new(peer, socket));
    let mut controller = SessionController::new(id, transport.clone(), registry, settings);

    let reason = loop {
        if shutdown.load(Ordering::SeqCst) {
            break "server shutdown".to_string();
        }
        controller.reap_finished();

        match transport.poll_text() {
            Ok(Some(text)) => {
                if let Some(reply) = controller.handle_text(&text) {
                    if let Err(err) = send_event(transport.as_ref(), &reply) {
                        break err.to_string();
                    }
                }
            }
            Ok(None) => std::thread::sleep(WRITER_TURN),
            Err(err @ SessionError::MalformedControlMessage(_)) => {
                if let Err(send_err) = send_event(transport.as_ref(), &ServerEvent::from(&err)) {
                    break send_err.to_string();
                }
            }
            Err(err) => break err.to_string(),
        }
    };

    // Teardown is an implicit stop, whatever ended the loop.
    if let Some(report) = controller.shutdown() {
        log::info!(
            "connection {}: last session {} with {} counted",
            id,
            report.end,
            report.summary.total_counted
        );
    }
    transport.close();
    log::info!("connection {} closed ({})", id, reason);
    Ok(())
}
