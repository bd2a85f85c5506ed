use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parmirror_proto::{FrameConfig, Message, MessageReader, WireError};
use tracing::{debug, info, warn};

use crate::error::{RelayError, Result};
use crate::registry::SessionRegistry;
use crate::session::{default_session_config, ClientSession, SessionId};

/// Pause after a failed accept so fd exhaustion does not spin the loop.
const ACCEPT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

/// Accepts client connections and runs one receive loop per session.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    frame_config: FrameConfig,
    next_session_id: AtomicU64,
}

impl RelayServer {
    /// Bind the listening socket. Port 0 picks a free port.
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|source| RelayError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        Ok(Self {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            frame_config: default_session_config(),
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Override the frame configuration applied to every session.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// The bound address (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(RelayError::Accept)
    }

    /// The session registry, shared with every receive loop.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until `running` clears.
    ///
    /// Each accepted connection gets its own receive-loop thread; no
    /// connection blocks waiting on another. An accept failure (fd
    /// exhaustion, a connection aborted in the backlog) never stops
    /// the loop: connected clients keep their sessions.
    pub fn run(&self, running: &AtomicBool) -> Result<()> {
        info!(addr = ?self.local_addr().ok(), "relay listening");

        while running.load(Ordering::SeqCst) {
            let (stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    std::thread::sleep(ACCEPT_RETRY_DELAY);
                    continue;
                }
            };
            if let Err(err) = self.spawn_session(stream, addr) {
                warn!(%addr, error = %err, "session setup failed");
            }
        }

        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));

        let write_half = stream
            .try_clone()
            .map_err(|source| RelayError::SessionSetup { addr, source })?;
        let session = Arc::new(
            ClientSession::from_stream(id, write_half, self.frame_config.clone())
                .map_err(|source| RelayError::SessionSetup { addr, source })?,
        );

        let reader = MessageReader::with_config(stream, self.frame_config.clone());
        let registry = Arc::clone(&self.registry);
        registry.register(Arc::clone(&session));

        std::thread::spawn(move || {
            receive_loop(reader, session, &registry);
        });

        Ok(())
    }
}

/// One session's receive loop: decode, route, repeat until the
/// connection drops. Every exit path unregisters the session.
fn receive_loop(
    mut reader: MessageReader<TcpStream>,
    session: Arc<ClientSession>,
    registry: &SessionRegistry,
) {
    loop {
        match reader.read_message() {
            // Liveness is answered at the session, not relayed.
            Ok(Message::Ping { payload }) => {
                if let Err(err) = session.send(&Message::pong_for(payload)) {
                    warn!(session = %session.id(), error = %err, "pong send failed");
                    break;
                }
            }
            Ok(Message::Pong { .. }) => {}
            Ok(Message::Unknown { kind, .. }) => {
                debug!(session = %session.id(), kind, "dropping unknown message type");
            }
            // Everything else fans out to every session — the sender
            // included, by design.
            Ok(msg) => {
                registry.broadcast(&msg);
            }
            Err(WireError::ConnectionClosed) => {
                debug!(session = %session.id(), "client disconnected");
                break;
            }
            Err(err) => {
                warn!(session = %session.id(), error = %err, "receive failed");
                break;
            }
        }
    }

    registry.unregister(session.id());
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::time::Duration;

    use parmirror_proto::MessageWriter;

    use super::*;

    fn start_relay() -> SocketAddr {
        let server = RelayServer::bind("127.0.0.1:0").expect("relay should bind");
        let addr = server.local_addr().unwrap();
        std::thread::spawn(move || {
            let running = AtomicBool::new(true);
            let _ = server.run(&running);
        });
        addr
    }

    struct TestClient {
        reader: MessageReader<TcpStream>,
        writer: MessageWriter<TcpStream>,
    }

    impl TestClient {
        fn connect(addr: SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).expect("client should connect");
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let reader = MessageReader::new(stream.try_clone().unwrap());
            let writer = MessageWriter::new(stream);
            Self { reader, writer }
        }

        fn send(&mut self, msg: &Message) {
            self.writer.send(msg).expect("send should succeed");
        }

        fn recv(&mut self) -> Message {
            self.reader.read_message().expect("recv should succeed")
        }
    }

    #[test]
    fn broadcast_reaches_all_clients_including_sender() {
        let addr = start_relay();
        let mut a = TestClient::connect(addr);
        let mut b = TestClient::connect(addr);

        // Make sure both sessions are registered before sending.
        std::thread::sleep(Duration::from_millis(100));

        a.send(&Message::remove_window("op-1"));

        assert_eq!(b.recv(), Message::remove_window("op-1"));
        // Deliberate echo back to the sender.
        assert_eq!(a.recv(), Message::remove_window("op-1"));
    }

    #[test]
    fn ping_gets_pong_to_sender_only() {
        let addr = start_relay();
        let mut a = TestClient::connect(addr);
        let mut b = TestClient::connect(addr);

        std::thread::sleep(Duration::from_millis(100));

        let payload = serde_json::json!({"seq": 1});
        a.send(&Message::Ping {
            payload: Some(payload.clone()),
        });
        assert_eq!(a.recv(), Message::pong_for(Some(payload)));

        // b must see nothing: prove it by sending a marker through the
        // broadcast path and checking it arrives first.
        a.send(&Message::remove_window("marker"));
        assert_eq!(b.recv(), Message::remove_window("marker"));
    }

    #[test]
    fn disconnected_client_does_not_disturb_the_rest() {
        let addr = start_relay();
        let mut a = TestClient::connect(addr);
        let b = TestClient::connect(addr);
        let mut c = TestClient::connect(addr);

        std::thread::sleep(Duration::from_millis(100));
        drop(b);
        std::thread::sleep(Duration::from_millis(100));

        a.send(&Message::remove_window("op-2"));
        assert_eq!(c.recv(), Message::remove_window("op-2"));
        assert_eq!(a.recv(), Message::remove_window("op-2"));
    }

    #[test]
    fn accept_failures_do_not_stop_the_relay() {
        let server = RelayServer::bind("127.0.0.1:0").expect("relay should bind");
        let addr = server.local_addr().unwrap();
        // Make every idle accept fail immediately instead of blocking,
        // so the loop keeps hitting its error path.
        server.listener.set_nonblocking(true).unwrap();
        std::thread::spawn(move || {
            let running = AtomicBool::new(true);
            let _ = server.run(&running);
        });

        // Let the loop survive a few failed accepts before anyone connects.
        std::thread::sleep(Duration::from_millis(300));

        let mut a = TestClient::connect(addr);
        let mut b = TestClient::connect(addr);
        std::thread::sleep(Duration::from_millis(300));

        a.send(&Message::remove_window("op-3"));
        assert_eq!(b.recv(), Message::remove_window("op-3"));
    }

    #[test]
    fn client_ready_is_relayed_to_the_host_side() {
        // The relay does not answer client_ready itself; it forwards
        // it so the host can push the snapshot.
        let addr = start_relay();
        let mut host = TestClient::connect(addr);
        let mut ui = TestClient::connect(addr);

        std::thread::sleep(Duration::from_millis(100));

        ui.send(&Message::client_ready());
        assert_eq!(host.recv(), Message::ClientReady);
    }
}
