//! The owned, concurrency-safe session registry.
//!
//! Broadcast snapshots the live set under the lock and delivers
//! outside it, so concurrent register/unregister during a broadcast in
//! progress can neither corrupt iteration nor block other sessions'
//! receive loops behind a slow send.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use parmirror_proto::Message;
use tracing::{debug, info, warn};

use crate::session::{ClientSession, SessionId};

/// The live set of client sessions.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<ClientSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session. Re-registering the same id replaces it.
    pub fn register(&self, session: Arc<ClientSession>) {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!(session = %session.id(), addr = session.addr(), "client registered");
        sessions.insert(session.id(), session);
    }

    /// Remove a session. Idempotent.
    pub fn unregister(&self, id: SessionId) {
        let mut sessions = match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if sessions.remove(&id).is_some() {
            info!(session = %id, "client unregistered");
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        match self.sessions.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `msg` to every currently registered session, including
    /// the one it came from.
    ///
    /// A send failure never blocks or fails delivery to the others;
    /// the failed session is unregistered. Returns the number of
    /// successful deliveries.
    pub fn broadcast(&self, msg: &Message) -> usize {
        let snapshot: Vec<Arc<ClientSession>> = {
            let sessions = match self.sessions.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            sessions.values().cloned().collect()
        };

        let mut delivered = 0usize;
        for session in snapshot {
            match session.send(msg) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(session = %session.id(), error = %err, "send failed, dropping session");
                    self.unregister(session.id());
                }
            }
        }

        debug!(kind = msg.kind(), delivered, "broadcast");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingWriter(Arc<AtomicUsize>);

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.fetch_add(buf.len(), Ordering::SeqCst);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn counting_session(id: u64) -> (Arc<ClientSession>, Arc<AtomicUsize>) {
        let bytes = Arc::new(AtomicUsize::new(0));
        let session = Arc::new(ClientSession::new(
            SessionId(id),
            format!("peer-{id}"),
            Box::new(CountingWriter(bytes.clone())),
        ));
        (session, bytes)
    }

    #[test]
    fn broadcast_reaches_every_session() {
        let registry = SessionRegistry::new();
        let (s1, b1) = counting_session(1);
        let (s2, b2) = counting_session(2);
        registry.register(s1);
        registry.register(s2);

        let delivered = registry.broadcast(&Message::ping());
        assert_eq!(delivered, 2);
        assert!(b1.load(Ordering::SeqCst) > 0);
        assert!(b2.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn one_dead_session_does_not_disturb_the_rest() {
        let registry = SessionRegistry::new();
        let (s1, b1) = counting_session(1);
        let (s3, b3) = counting_session(3);
        registry.register(s1);
        registry.register(Arc::new(ClientSession::new(
            SessionId(2),
            "peer-2",
            Box::new(BrokenWriter),
        )));
        registry.register(s3);

        let delivered = registry.broadcast(&Message::remove_window("op-1"));
        assert_eq!(delivered, 2);
        assert!(b1.load(Ordering::SeqCst) > 0);
        assert!(b3.load(Ordering::SeqCst) > 0);

        // Exactly the failed session was dropped.
        assert_eq!(registry.len(), 2);
        let delivered = registry.broadcast(&Message::remove_window("op-1"));
        assert_eq!(delivered, 2);
    }

    /// A client that stopped reading: its socket buffer is full, so
    /// every write reports would-block until the write timeout fires.
    struct StalledWriter;

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stalled_session_does_not_block_the_rest() {
        let registry = SessionRegistry::new();
        registry.register(Arc::new(ClientSession::new(
            SessionId(1),
            "peer-1",
            Box::new(StalledWriter),
        )));
        let (healthy, healthy_bytes) = counting_session(2);
        registry.register(healthy);

        let delivered = registry.broadcast(&Message::ping());
        assert_eq!(delivered, 1);
        assert!(healthy_bytes.load(Ordering::SeqCst) > 0);

        // The stalled session was dropped, not waited on.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let (s1, _) = counting_session(1);
        registry.register(s1);

        registry.unregister(SessionId(1));
        registry.unregister(SessionId(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_to_empty_registry_delivers_nothing() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.broadcast(&Message::ping()), 0);
    }

    #[test]
    fn register_unregister_during_concurrent_broadcasts() {
        let registry = Arc::new(SessionRegistry::new());
        let (stable, stable_bytes) = counting_session(1);
        registry.register(stable);

        let broadcaster = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    registry.broadcast(&Message::ping());
                }
            })
        };

        for i in 2..50u64 {
            let (session, _) = counting_session(i);
            registry.register(session);
            registry.unregister(SessionId(i));
        }

        broadcaster.join().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(stable_bytes.load(Ordering::SeqCst) > 0);
    }
}
