use std::io::Write;
use std::net::TcpStream;
use std::sync::Mutex;
use std::time::Duration;

use parmirror_proto::{FrameConfig, Message, MessageWriter, WireError};

/// How long one slow client may stall a send before it is dropped.
///
/// Every session writer carries a write timeout so a client that stops
/// reading can delay a broadcast by at most this long before its send
/// fails and the session is unregistered.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// The frame configuration sessions get unless overridden.
pub(crate) fn default_session_config() -> FrameConfig {
    FrameConfig {
        write_timeout: Some(DEFAULT_WRITE_TIMEOUT),
        ..FrameConfig::default()
    }
}

/// Identifies one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// One live client connection's sending half.
///
/// Created on accept, destroyed on disconnect or unrecoverable send
/// error. The writer is mutex-guarded so broadcasts from different
/// receive loops never interleave a frame.
pub struct ClientSession {
    id: SessionId,
    addr: String,
    writer: Mutex<MessageWriter<Box<dyn Write + Send>>>,
}

impl ClientSession {
    pub fn new(id: SessionId, addr: impl Into<String>, writer: Box<dyn Write + Send>) -> Self {
        Self {
            id,
            addr: addr.into(),
            writer: Mutex::new(MessageWriter::with_config(writer, default_session_config())),
        }
    }

    /// Wrap the write half of an accepted TCP stream.
    pub fn from_stream(
        id: SessionId,
        stream: TcpStream,
        config: FrameConfig,
    ) -> std::io::Result<Self> {
        let addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        stream.set_write_timeout(config.write_timeout)?;
        Ok(Self {
            id,
            addr,
            writer: Mutex::new(MessageWriter::with_config(Box::new(stream), config)),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Peer address, for logs.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Deliver one message to this client.
    pub fn send(&self, msg: &Message) -> Result<(), WireError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| WireError::Io(std::io::Error::other("session writer poisoned")))?;
        writer.send(msg)
    }
}
