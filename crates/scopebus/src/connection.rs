// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection to the bus router.
//!
//! A [`Connection`] owns one session at a time. `connect` hands the derived
//! URI and realm to the [`Transport`] and spawns a driver task that waits for
//! the first lifecycle event, bounded by the configured connect timeout:
//!
//! ```text
//! open ──▶ Connected (stale subscriptions dropped) ──▶ Ok(())
//! close(unreachable) / timeout ──▶ Unreachable ──▶ Err(Unreachable)
//! close(other) ──▶ Disconnected ──▶ Err(Closed)
//! ```
//!
//! On timeout a synthetic unreachable close is fed through the same event
//! path before the transport is force-closed, so the attempt always ends as
//! unreachable whatever the transport reports while shutting down. After a successful open the driver
//! keeps watching the transport; a later close drops the session.

use crate::codec::{CodecRegistry, Sample};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult, ConnectError};
use crate::heartbeat;
use crate::informer::Informer;
use crate::listener::Listener;
use crate::remote::RemoteServer;
use crate::session::{CloseReason, Session, SubscriptionId, Transport, TransportEvent};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Last attempt could not reach the router.
    Unreachable,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    uri: Option<String>,
    session: Option<Arc<dyn Session>>,
    was_connected: bool,
    attempt: u64,
}

struct Shared {
    transport: Arc<dyn Transport>,
    config: BridgeConfig,
    codecs: Arc<CodecRegistry>,
    inner: Mutex<Inner>,
}

/// Handle to a bus connection. Cheap to clone.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("Connection")
            .field("state", &inner.state)
            .field("uri", &inner.uri)
            .field("realm", &self.shared.config.realm)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// New connection; schemas are read from `config.schema_root` on disk.
    pub fn new(transport: Arc<dyn Transport>, config: BridgeConfig) -> Self {
        let codecs = Arc::new(CodecRegistry::from_config(&config));
        Self::with_codecs(transport, config, codecs)
    }

    /// New connection sharing an existing codec registry.
    pub fn with_codecs(
        transport: Arc<dyn Transport>,
        config: BridgeConfig,
        codecs: Arc<CodecRegistry>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                config,
                codecs,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Connect and wait for the outcome.
    ///
    /// Without an address the URI is derived from the configured origin.
    pub async fn connect(&self, address: Option<&str>) -> Result<(), ConnectError> {
        let outcome = self.start(address)?;
        outcome.await.unwrap_or(Err(ConnectError::Aborted))
    }

    /// Connect and report the outcome to `on_result`, exactly once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_with<F>(&self, address: Option<&str>, on_result: F)
    where
        F: FnOnce(Result<(), ConnectError>) + Send + 'static,
    {
        match self.start(address) {
            Ok(outcome) => {
                tokio::spawn(async move {
                    on_result(outcome.await.unwrap_or(Err(ConnectError::Aborted)));
                });
            }
            Err(e) => on_result(Err(e)),
        }
    }

    fn start(
        &self,
        address: Option<&str>,
    ) -> Result<oneshot::Receiver<Result<(), ConnectError>>, ConnectError> {
        let config = &self.shared.config;
        let uri = config.transport_uri(address);

        let attempt = {
            let mut inner = self.shared.inner.lock();
            if inner.state == ConnectionState::Connecting {
                return Err(ConnectError::InProgress);
            }
            inner.attempt += 1;
            inner.state = ConnectionState::Connecting;
            inner.uri = Some(uri.clone());
            inner.session = None;
            inner.attempt
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();

        info!("Connecting to {} (realm '{}')", uri, config.realm);
        self.shared.transport.open(&uri, &config.realm, events_tx.clone());

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let mut events = events_rx;
            let result = shared.await_open(attempt, &uri, &events_tx, &mut events).await;
            let opened = result.is_ok();
            if result_tx.send(result).is_err() {
                debug!("Connect result for {} had no receiver", uri);
            }
            if opened {
                drop(events_tx);
                let weak = Arc::downgrade(&shared);
                drop(shared);
                Shared::watch(weak, attempt, uri, events).await;
            }
        });

        Ok(result_rx)
    }

    /// True when a session is present and open.
    pub fn is_connected(&self) -> bool {
        self.shared
            .inner
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.is_open())
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// URI of the latest connect attempt.
    pub fn uri(&self) -> Option<String> {
        self.shared.inner.lock().uri.clone()
    }

    /// Whether any attempt ever reached the router.
    pub fn was_connected(&self) -> bool {
        self.shared.inner.lock().was_connected
    }

    /// The open session, or `NotConnected`.
    pub fn session(&self) -> BridgeResult<Arc<dyn Session>> {
        let inner = self.shared.inner.lock();
        match &inner.session {
            Some(session) if session.is_open() => Ok(session.clone()),
            _ => Err(BridgeError::NotConnected),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn codecs(&self) -> &Arc<CodecRegistry> {
        &self.shared.codecs
    }

    /// Zero value for a type name.
    pub fn default_value(&self, type_name: &str) -> BridgeResult<Sample> {
        self.shared.codecs.default_value(type_name)
    }

    /// Subscribe to `scope` and register interest with the display server.
    pub async fn create_listener<F>(
        &self,
        scope: &str,
        type_name: &str,
        on_message: F,
    ) -> BridgeResult<Listener>
    where
        F: Fn(Sample) + Send + Sync + 'static,
    {
        Listener::subscribe(self, scope, type_name, on_message).await
    }

    /// Informer on `scope`; `on_registered` fires once the registration call
    /// completes.
    pub fn create_informer<F>(
        &self,
        scope: &str,
        type_name: &str,
        on_registered: F,
    ) -> BridgeResult<Arc<Informer>>
    where
        F: FnOnce(BridgeResult<Value>, Arc<Informer>) + Send + 'static,
    {
        Informer::create(self, scope, type_name, on_registered)
    }

    /// Informer on `scope`, returned once registered.
    pub async fn create_informer_registered(
        &self,
        scope: &str,
        type_name: &str,
    ) -> BridgeResult<(Arc<Informer>, Value)> {
        Informer::create_registered(self, scope, type_name).await
    }

    /// Remote server proxy for `scope`.
    pub fn remote_server(&self, scope: &str) -> BridgeResult<RemoteServer> {
        RemoteServer::new(self, scope)
    }

    /// Answer router pings.
    pub async fn create_ping_pong(&self) -> BridgeResult<SubscriptionId> {
        heartbeat::create_ping_pong(self).await
    }

    /// Log every event on a raw bus topic.
    pub async fn show_events(&self, topic: &str) -> BridgeResult<SubscriptionId> {
        heartbeat::show_events(self, topic).await
    }
}

impl Shared {
    async fn await_open(
        &self,
        attempt: u64,
        uri: &str,
        events_tx: &mpsc::UnboundedSender<TransportEvent>,
        events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<(), ConnectError> {
        let timeout = self.config.connect_timeout();
        let timer = tokio::time::sleep(timeout);
        tokio::pin!(timer);
        let mut timed_out = false;

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransportEvent::Opened(session)) if !timed_out => {
                        self.on_open(attempt, uri, session).await;
                        return Ok(());
                    }
                    Some(TransportEvent::Opened(_)) => {
                        debug!("Ignoring session on {} opened after timeout", uri);
                    }
                    Some(TransportEvent::Closed { reason: CloseReason::Unreachable, details }) => {
                        warn!("{} unreachable: {}", uri, details);
                        self.finish(attempt, ConnectionState::Unreachable);
                        return Err(ConnectError::Unreachable {
                            uri: uri.to_string(),
                            timed_out,
                        });
                    }
                    Some(TransportEvent::Closed { reason, details }) if timed_out => {
                        warn!("{} closed after timeout ({}): {}", uri, reason, details);
                        self.finish(attempt, ConnectionState::Unreachable);
                        return Err(ConnectError::Unreachable {
                            uri: uri.to_string(),
                            timed_out,
                        });
                    }
                    Some(TransportEvent::Closed { reason, details }) => {
                        warn!("Connection to {} closed before open ({}): {}", uri, reason, details);
                        self.finish(attempt, ConnectionState::Disconnected);
                        return Err(ConnectError::Closed {
                            reason: reason.to_string(),
                        });
                    }
                    None => {
                        self.finish(attempt, ConnectionState::Disconnected);
                        return Err(ConnectError::Aborted);
                    }
                },
                () = &mut timer, if !timed_out => {
                    timed_out = true;
                    warn!("No session on {} after {:?}, closing transport", uri, timeout);
                    // queued ahead of whatever the transport reports while closing;
                    // the receiver is held by this task, so the send cannot fail
                    let _ = events_tx.send(TransportEvent::Closed {
                        reason: CloseReason::Unreachable,
                        details: format!("no session after {:?}", timeout),
                    });
                    self.transport.close();
                }
            }
        }
    }

    async fn on_open(&self, attempt: u64, uri: &str, session: Arc<dyn Session>) {
        {
            let mut inner = self.inner.lock();
            if inner.attempt != attempt {
                return;
            }
            inner.session = Some(session.clone());
            inner.state = ConnectionState::Connected;
            inner.was_connected = true;
        }
        info!("Connection established: {}", uri);

        let stale = session.subscriptions();
        if !stale.is_empty() {
            debug!("Dropping {} stale subscriptions on {}", stale.len(), uri);
        }
        for id in stale {
            if let Err(e) = session.unsubscribe(id).await {
                warn!("Failed to drop stale subscription {}: {}", id, e);
            }
        }
    }

    fn finish(&self, attempt: u64, state: ConnectionState) {
        let mut inner = self.inner.lock();
        if inner.attempt == attempt {
            inner.state = state;
            inner.session = None;
        }
    }

    async fn watch(
        shared: Weak<Shared>,
        attempt: u64,
        uri: String,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Closed { reason, details } => {
                    warn!("Connection to {} {}: {}", uri, reason, details);
                    if let Some(shared) = shared.upgrade() {
                        shared.finish(attempt, ConnectionState::Disconnected);
                    }
                    return;
                }
                TransportEvent::Opened(_) => debug!("Ignoring repeated open on {}", uri),
            }
        }
        debug!("Transport for {} stopped reporting", uri);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryBus, MemoryTransport, OpenBehavior};
    use std::time::Duration;

    fn connection(behavior: OpenBehavior) -> (Connection, Arc<MemoryTransport>) {
        let transport = MemoryTransport::with_behavior(MemoryBus::new(), behavior);
        let conn = Connection::new(transport.clone(), BridgeConfig::default());
        (conn, transport)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_connect_opens_session() {
        let (conn, transport) = connection(OpenBehavior::Open);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!conn.is_connected());

        conn.connect(Some("localhost:8181")).await.expect("connect");

        assert!(conn.is_connected());
        assert!(conn.was_connected());
        assert_eq!(conn.state(), ConnectionState::Connected);
        assert_eq!(conn.uri().as_deref(), Some("ws://localhost:8181/ws"));
        assert_eq!(
            transport.last_open(),
            Some(("ws://localhost:8181/ws".to_string(), "realm1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_defaults_to_local_origin() {
        let (conn, _) = connection(OpenBehavior::Open);
        conn.connect(None).await.expect("connect");
        assert_eq!(conn.uri().as_deref(), Some("ws://127.0.0.1:8080/ws"));
    }

    #[tokio::test]
    async fn test_open_drops_stale_subscriptions() {
        let (conn, transport) = connection(OpenBehavior::Open);
        let bus = transport.bus().clone();
        let noop: crate::session::EventHandler = Arc::new(|_: &[Value]| {});
        bus.subscribe("left.over", noop.clone()).await.expect("subscribe");
        bus.subscribe("left.over", noop).await.expect("subscribe");

        conn.connect(None).await.expect("connect");
        assert!(bus.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_refused_unreachable() {
        let (conn, _) = connection(OpenBehavior::Refuse(CloseReason::Unreachable));
        let err = conn.connect(None).await.unwrap_err();
        assert_eq!(
            err,
            ConnectError::Unreachable {
                uri: "ws://127.0.0.1:8080/ws".into(),
                timed_out: false,
            }
        );
        assert_eq!(conn.state(), ConnectionState::Unreachable);
        assert!(!conn.is_connected());
        assert!(!conn.was_connected());
    }

    #[tokio::test]
    async fn test_refused_other_reason() {
        let (conn, _) = connection(OpenBehavior::Refuse(CloseReason::Unsupported));
        let err = conn.connect(None).await.unwrap_err();
        assert_eq!(
            err,
            ConnectError::Closed {
                reason: "unsupported".into()
            }
        );
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_forces_close() {
        let (conn, transport) = connection(OpenBehavior::Silent);
        let started = tokio::time::Instant::now();

        let err = conn.connect(None).await.unwrap_err();

        assert!(matches!(err, ConnectError::Unreachable { timed_out: true, .. }));
        assert_eq!(transport.close_count(), 1);
        assert_eq!(conn.state(), ConnectionState::Unreachable);
        assert!(started.elapsed() >= Duration::from_millis(4000));
    }

    /// Never opens; reports a regular close as soon as it is force-closed.
    #[derive(Default)]
    struct ClosingTransport {
        events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
        closes: std::sync::atomic::AtomicUsize,
    }

    impl Transport for ClosingTransport {
        fn open(&self, _uri: &str, _realm: &str, events: mpsc::UnboundedSender<TransportEvent>) {
            *self.events.lock() = Some(events);
        }

        fn close(&self) {
            self.closes.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
            if let Some(tx) = self.events.lock().as_ref() {
                let _ = tx.send(TransportEvent::Closed {
                    reason: CloseReason::Closed,
                    details: "closed by client".into(),
                });
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_unreachable_when_transport_reports_close() {
        let transport = Arc::new(ClosingTransport::default());
        let conn = Connection::new(transport.clone(), BridgeConfig::default());

        let err = conn.connect(None).await.unwrap_err();

        assert_eq!(
            err,
            ConnectError::Unreachable {
                uri: "ws://127.0.0.1:8080/ws".into(),
                timed_out: true,
            }
        );
        assert_eq!(conn.state(), ConnectionState::Unreachable);
        assert_eq!(transport.closes.load(std::sync::atomic::Ordering::Acquire), 1);
        assert!(!conn.was_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_open_after_timeout_is_ignored() {
        let (conn, transport) = connection(OpenBehavior::Silent);
        let (tx, rx) = oneshot::channel();
        conn.connect_with(None, move |r| {
            let _ = tx.send(r);
        });

        tokio::time::sleep(Duration::from_millis(4001)).await;
        transport.complete_open();

        let result = rx.await.expect("callback");
        assert!(matches!(result, Err(ConnectError::Unreachable { .. })));
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn test_callback_fires_once() {
        let (conn, _) = connection(OpenBehavior::Open);
        let (tx, rx) = oneshot::channel();
        conn.connect_with(None, move |r| {
            let _ = tx.send(r);
        });
        assert_eq!(rx.await.expect("callback"), Ok(()));
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_concurrent_connect_rejected() {
        let (conn, _) = connection(OpenBehavior::Silent);
        conn.connect_with(None, |_| {});
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(conn.connect(None).await, Err(ConnectError::InProgress));
    }

    #[tokio::test]
    async fn test_close_after_open_disconnects() {
        let (conn, transport) = connection(OpenBehavior::Open);
        conn.connect(None).await.expect("connect");

        assert!(transport.drop_connection(CloseReason::Lost, "router restarted"));
        settle().await;

        assert!(!conn.is_connected());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(conn.was_connected());
        assert!(matches!(conn.session(), Err(BridgeError::NotConnected)));
    }

    #[tokio::test]
    async fn test_reconnect_after_loss() {
        let (conn, transport) = connection(OpenBehavior::Open);
        conn.connect(None).await.expect("connect");
        transport.drop_connection(CloseReason::Lost, "gone");
        settle().await;

        conn.connect(None).await.expect("reconnect");
        assert!(conn.is_connected());
        assert_eq!(transport.open_count(), 2);
    }
}
