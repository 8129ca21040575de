use super::engine::QueryEngine;
use super::transport::{Snmp2Transport, Transport};
use super::types::{Binding, WalkResult};
use crate::error::{ProtocolError, SnmpResult};
use crate::oid::OidPath;
use crate::session::SessionConfig;
use tokio::sync::{mpsc, oneshot};

/// Request handed to a session worker
#[derive(Debug)]
enum SessionRequest {
    Get {
        oid: OidPath,
        response_tx: oneshot::Sender<SnmpResult<Binding>>,
    },
    Walk {
        root: OidPath,
        response_tx: oneshot::Sender<WalkResult>,
    },
}

/// Handle to one polling session.
///
/// The transport lives on a dedicated worker thread, so requests on a session
/// run one at a time and in order. Clones share the same worker. When the last
/// handle is dropped the worker exits and the socket is closed.
#[derive(Clone)]
pub struct Session {
    target: String,
    request_tx: mpsc::UnboundedSender<SessionRequest>,
}

impl Session {
    /// Open a UDP session to the configured target.
    pub async fn open(config: SessionConfig) -> SnmpResult<Self> {
        let target = config.address();
        let retries = config.retries();

        tracing::info!("Opening {} session to {}", config.mode_name(), target);

        let transport = tokio::task::spawn_blocking(move || Snmp2Transport::open(&config))
            .await
            .map_err(|e| ProtocolError::Transport(format!("Task join error: {}", e)))??;

        Self::spawn(target, QueryEngine::new(transport, retries))
    }

    /// Start a worker thread that owns `engine`.
    pub fn spawn<T>(target: String, engine: QueryEngine<T>) -> SnmpResult<Self>
    where
        T: Transport + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let worker_target = target.clone();

        // 8MB stack (default is 2MB) for SNMPv3 key localization and crypto
        std::thread::Builder::new()
            .name(format!("snmp-{}", target))
            .stack_size(8 * 1024 * 1024)
            .spawn(move || run_session(worker_target, engine, request_rx))
            .map_err(|e| {
                ProtocolError::Transport(format!("Failed to spawn session thread: {}", e))
            })?;

        Ok(Self { target, request_tx })
    }

    /// `host:port` this session talks to
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Single-object GET
    pub async fn get(&self, oid: &OidPath) -> SnmpResult<Binding> {
        let (response_tx, response_rx) = oneshot::channel();

        self.request_tx
            .send(SessionRequest::Get {
                oid: oid.clone(),
                response_tx,
            })
            .map_err(|_| ProtocolError::SessionClosed)?;

        response_rx
            .await
            .map_err(|_| ProtocolError::SessionClosed)?
    }

    /// Subtree WALK. Empty if the walk failed at any point.
    pub async fn walk(&self, root: &OidPath) -> WalkResult {
        let (response_tx, response_rx) = oneshot::channel();

        let sent = self.request_tx.send(SessionRequest::Walk {
            root: root.clone(),
            response_tx,
        });
        if sent.is_err() {
            tracing::warn!("Walk of {} on {}: session closed", root, self.target);
            return Vec::new();
        }

        response_rx.await.unwrap_or_else(|_| {
            tracing::warn!("Walk of {} on {}: session worker stopped", root, self.target);
            Vec::new()
        })
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .finish()
    }
}

/// Worker loop (blocking). Returns when every handle has been dropped.
fn run_session<T: Transport>(
    target: String,
    mut engine: QueryEngine<T>,
    mut request_rx: mpsc::UnboundedReceiver<SessionRequest>,
) {
    tracing::debug!("Session worker started for {}", target);

    while let Some(request) = request_rx.blocking_recv() {
        match request {
            SessionRequest::Get { oid, response_tx } => {
                let _ = response_tx.send(engine.get(&oid));
            }
            SessionRequest::Walk { root, response_tx } => {
                let _ = response_tx.send(engine.walk(&root));
            }
        }
    }

    tracing::debug!("Session worker stopped for {}", target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SnmpResult;
    use crate::snmp::engine::tests::{oid, reply, ScriptedTransport};
    use crate::snmp::types::{Response, SnmpValue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Flags when the worker drops its transport
    struct DropTracking {
        inner: ScriptedTransport,
        dropped: Arc<AtomicBool>,
    }

    impl Transport for DropTracking {
        fn get(&mut self, oid: &OidPath) -> SnmpResult<Response> {
            self.inner.get(oid)
        }

        fn get_next(&mut self, oid: &OidPath) -> SnmpResult<Response> {
            self.inner.get_next(oid)
        }
    }

    impl Drop for DropTracking {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    fn scripted_session(script: Vec<SnmpResult<Response>>) -> Session {
        let engine = QueryEngine::new(ScriptedTransport::new(script), 1);
        Session::spawn("test-device:161".to_string(), engine).unwrap()
    }

    #[tokio::test]
    async fn test_session_get() {
        let session = scripted_session(vec![reply(
            "1.3.6.1.2.1.1.5.0",
            SnmpValue::OctetString(b"edge1".to_vec()),
        )]);

        let binding = session.get(&oid("1.3.6.1.2.1.1.5.0")).await.unwrap();
        assert_eq!(binding.value, SnmpValue::OctetString(b"edge1".to_vec()));
        assert_eq!(session.target(), "test-device:161");
    }

    #[tokio::test]
    async fn test_session_requests_run_in_order() {
        let session = scripted_session(vec![
            reply("1.3.6.1.2.1.2.2.1.10.1", SnmpValue::Counter32(100)),
            reply("1.3.6.1.2.1.2.2.1.10.2", SnmpValue::Counter32(200)),
            reply("1.3.6.1.2.1.2.2.1.11.1", SnmpValue::Counter32(1)),
            reply("1.3.6.1.2.1.1.3.0", SnmpValue::TimeTicks(42)),
        ]);

        let walk = session.walk(&oid("1.3.6.1.2.1.2.2.1.10")).await;
        assert_eq!(walk.len(), 2);

        let uptime = session.get(&oid("1.3.6.1.2.1.1.3.0")).await.unwrap();
        assert_eq!(uptime.value, SnmpValue::TimeTicks(42));
    }

    #[tokio::test]
    async fn test_session_get_error_is_a_value() {
        let session = scripted_session(vec![Err(ProtocolError::Auth("bad key".into()))]);

        let result = session.get(&oid("1.3.6.1.2.1.1.5.0")).await;
        assert!(matches!(result, Err(ProtocolError::Auth(_))));
    }

    #[tokio::test]
    async fn test_dropping_session_releases_transport() {
        let dropped = Arc::new(AtomicBool::new(false));
        let transport = DropTracking {
            inner: ScriptedTransport::new(Vec::new()),
            dropped: Arc::clone(&dropped),
        };
        let session = Session::spawn("test-device:161".to_string(), QueryEngine::new(transport, 0))
            .unwrap();
        let clone = session.clone();

        drop(session);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!dropped.load(Ordering::SeqCst), "clone still holds the worker");

        drop(clone);
        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(dropped.load(Ordering::SeqCst));
    }
}
