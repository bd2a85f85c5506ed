//! Reconnecting connection from the host to the relay.
//!
//! The link owns a background thread that connects, hands the engine a
//! live writer, replays the current snapshot, and pumps inbound
//! messages into the engine. When the transport drops, it waits a
//! fixed delay and tries again — connection loss is never fatal. The
//! backoff wait is cancellable so a pending timer never races an
//! explicit reconnect or shutdown.

use std::io::ErrorKind;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use parmirror_proto::{FrameConfig, Message, MessageReader, MessageWriter, WireError};
use tracing::{error, info, warn};

use crate::engine::{Outbound, SyncEngine};
use crate::error::{HostError, SendFault};
use crate::provider::{SchemaProvider, ValueStore};

/// Configuration for the relay link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Relay address, e.g. `127.0.0.1:9877`.
    pub addr: String,
    /// Fixed delay between reconnect attempts. Default: 5 s.
    pub retry_delay: Duration,
    /// Timeout for each connect attempt.
    pub connect_timeout: Duration,
    /// How often the pump loop checks for shutdown while idle.
    pub poll_interval: Duration,
}

impl LinkConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            retry_delay: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// The engine's outbound sink, backed by whichever relay connection is
/// currently live. Sends while disconnected fail as [`SendFault`]s and
/// are absorbed by the engine.
#[derive(Clone, Default)]
pub struct LinkSender {
    writer: Arc<Mutex<Option<MessageWriter<TcpStream>>>>,
    // Set when a live writer fails mid-send, so the pump thread can
    // reconnect without waiting for its read half to notice.
    lost: Arc<AtomicBool>,
}

impl LinkSender {
    pub fn new() -> Self {
        Self::default()
    }

    fn install(&self, writer: MessageWriter<TcpStream>) {
        if let Ok(mut guard) = self.writer.lock() {
            *guard = Some(writer);
        }
        self.lost.store(false, Ordering::SeqCst);
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.writer.lock() {
            *guard = None;
        }
        self.lost.store(false, Ordering::SeqCst);
    }

    fn writer_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

impl Outbound for LinkSender {
    fn send(&mut self, msg: &Message) -> Result<(), SendFault> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| SendFault("link writer poisoned".to_string()))?;

        match guard.take() {
            Some(mut writer) => match writer.send(msg) {
                Ok(()) => {
                    *guard = Some(writer);
                    Ok(())
                }
                // Writer stays cleared; flag the loss so the pump
                // thread reconnects instead of reading a dead stream.
                Err(err) => {
                    self.lost.store(true, Ordering::SeqCst);
                    Err(SendFault(err.to_string()))
                }
            },
            None => Err(SendFault("relay link not connected".to_string())),
        }
    }
}

enum LinkControl {
    Shutdown,
    ReconnectNow,
}

enum PumpEnd {
    Shutdown,
    TransportLost,
}

/// Handle to a running relay link.
pub struct LinkHandle {
    control: Sender<LinkControl>,
    thread: Option<JoinHandle<()>>,
}

impl LinkHandle {
    /// Skip the remaining backoff delay and reconnect immediately.
    pub fn reconnect_now(&self) {
        let _ = self.control.send(LinkControl::ReconnectNow);
    }

    /// Stop the link thread, interrupting a pending backoff wait.
    pub fn shutdown(mut self) {
        let _ = self.control.send(LinkControl::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The reconnecting client adapter.
pub struct RelayLink;

impl RelayLink {
    /// Spawn the link thread driving `engine` over connections to
    /// `config.addr`. `sender` must be the same [`LinkSender`] the
    /// engine was constructed with.
    pub fn spawn<P, V>(
        config: LinkConfig,
        engine: Arc<Mutex<SyncEngine<P, V, LinkSender>>>,
        sender: LinkSender,
    ) -> LinkHandle
    where
        P: SchemaProvider + Send + 'static,
        V: ValueStore + Send + 'static,
    {
        let (control_tx, control_rx) = mpsc::channel();
        let thread = std::thread::spawn(move || {
            run_link(&config, &engine, &sender, &control_rx);
        });

        LinkHandle {
            control: control_tx,
            thread: Some(thread),
        }
    }
}

fn run_link<P, V>(
    config: &LinkConfig,
    engine: &Arc<Mutex<SyncEngine<P, V, LinkSender>>>,
    sender: &LinkSender,
    control: &Receiver<LinkControl>,
) where
    P: SchemaProvider,
    V: ValueStore,
{
    loop {
        match connect_and_pump(config, engine, sender, control) {
            PumpEnd::Shutdown => break,
            PumpEnd::TransportLost => {}
        }
        sender.clear();

        // Cancellable backoff: shutdown interrupts it, an explicit
        // reconnect skips the remaining delay.
        match control.recv_timeout(config.retry_delay) {
            Ok(LinkControl::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(LinkControl::ReconnectNow) | Err(RecvTimeoutError::Timeout) => continue,
        }
    }
    sender.clear();
    info!("relay link stopped");
}

fn connect_and_pump<P, V>(
    config: &LinkConfig,
    engine: &Arc<Mutex<SyncEngine<P, V, LinkSender>>>,
    sender: &LinkSender,
    control: &Receiver<LinkControl>,
) -> PumpEnd
where
    P: SchemaProvider,
    V: ValueStore,
{
    let (mut reader, writer) = match open_transport(config) {
        Ok(pair) => pair,
        Err(err) => {
            warn!(addr = %config.addr, error = %err, "relay connect failed");
            return PumpEnd::TransportLost;
        }
    };

    info!(addr = %config.addr, "connected to relay");
    sender.install(writer);

    // The fresh transport has seen nothing: replay the full snapshot
    // rather than relying on missed incremental updates.
    match engine.lock() {
        Ok(mut engine) => engine.resync(),
        Err(_) => {
            error!("engine mutex poisoned, stopping link");
            return PumpEnd::Shutdown;
        }
    }

    loop {
        match control.try_recv() {
            Ok(LinkControl::Shutdown) | Err(TryRecvError::Disconnected) => {
                return PumpEnd::Shutdown;
            }
            // Already connected; nothing to skip.
            Ok(LinkControl::ReconnectNow) | Err(TryRecvError::Empty) => {}
        }

        if sender.writer_lost() {
            warn!("outbound writer lost, reconnecting");
            return PumpEnd::TransportLost;
        }

        match reader.read_message() {
            Ok(msg) => match engine.lock() {
                Ok(mut engine) => engine.on_inbound(&msg),
                Err(_) => {
                    error!("engine mutex poisoned, stopping link");
                    return PumpEnd::Shutdown;
                }
            },
            // Read timeout: idle tick, go check the control channel.
            Err(WireError::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(err) => {
                warn!(error = %err, "relay transport lost");
                return PumpEnd::TransportLost;
            }
        }
    }
}

fn connect(config: &LinkConfig) -> Result<TcpStream, HostError> {
    let addr = config
        .addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(ErrorKind::InvalidInput, "address resolved to nothing"))?;
    Ok(TcpStream::connect_timeout(&addr, config.connect_timeout)?)
}

fn open_transport(
    config: &LinkConfig,
) -> Result<(MessageReader<TcpStream>, MessageWriter<TcpStream>), HostError> {
    let stream = connect(config)?;
    let frame_config = FrameConfig {
        read_timeout: Some(config.poll_interval),
        write_timeout: Some(config.connect_timeout),
        ..FrameConfig::default()
    };
    let reader = MessageReader::with_config_tcp(stream.try_clone()?, frame_config.clone())?;
    let writer = MessageWriter::with_config_tcp(stream, frame_config)?;
    Ok((reader, writer))
}
