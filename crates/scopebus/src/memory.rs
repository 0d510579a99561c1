// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process bus.
//!
//! [`MemoryBus`] is a [`Session`] that delivers events synchronously to the
//! handlers subscribed on the same bus and dispatches calls to procedures
//! registered in-process. [`MemoryTransport`] opens it under a configurable
//! behaviour. Useful for running components in one process and for tests.

use crate::error::SessionError;
use crate::session::{Args, CloseReason, EventHandler, Session, SubscriptionId, Transport, TransportEvent};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// In-process procedure implementation.
pub type ProcedureHandler = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

struct Subscription {
    topic: String,
    handler: EventHandler,
}

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Subscribe,
    Publish,
    Call,
}

/// In-process session.
pub struct MemoryBus {
    open: AtomicBool,
    next_id: AtomicU64,
    subscriptions: DashMap<u64, Subscription>,
    procedures: DashMap<String, ProcedureHandler>,
    published: Mutex<Vec<(String, Args)>>,
    calls: Mutex<Vec<(String, Args)>>,
    faults: Mutex<VecDeque<(BusOp, String)>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self {
            open: AtomicBool::new(true),
            next_id: AtomicU64::new(1),
            subscriptions: DashMap::new(),
            procedures: DashMap::new(),
            published: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(VecDeque::new()),
        }
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("open", &self.is_open())
            .field("subscriptions", &self.subscriptions.len())
            .field("procedures", &self.procedures.len())
            .finish()
    }
}

impl MemoryBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a procedure, replacing any previous one with that name.
    pub fn register_procedure<F>(&self, name: &str, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.procedures.insert(name.to_string(), Arc::new(handler));
    }

    /// Make the next `op` fail with `reason`. Faults queue up in order.
    pub fn fail_next(&self, op: BusOp, reason: impl Into<String>) {
        self.faults.lock().push_back((op, reason.into()));
    }

    fn take_fault(&self, op: BusOp) -> Option<String> {
        let mut faults = self.faults.lock();
        let pos = faults.iter().position(|(o, _)| *o == op)?;
        faults.remove(pos).map(|(_, reason)| reason)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::Closed)
        }
    }

    /// Mark the session closed; later operations fail with `Closed`.
    pub fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Mark the session open again. Subscriptions are kept.
    pub fn reopen(&self) {
        self.open.store(true, Ordering::Release);
    }

    /// Topics with at least one subscription.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .subscriptions
            .iter()
            .map(|s| s.value().topic.clone())
            .collect();
        topics.sort();
        topics.dedup();
        topics
    }

    /// Number of subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .iter()
            .filter(|s| s.value().topic == topic)
            .count()
    }

    /// Every successful publish so far, in order.
    pub fn published(&self) -> Vec<(String, Args)> {
        self.published.lock().clone()
    }

    /// Arguments of every successful publish on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<Args> {
        self.published
            .lock()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, args)| args.clone())
            .collect()
    }

    /// Every call attempt that reached a procedure lookup, in order.
    pub fn calls(&self) -> Vec<(String, Args)> {
        self.calls.lock().clone()
    }

    /// Deliver an event to subscribers without recording it as published.
    pub fn deliver(&self, topic: &str, args: &[Value]) -> usize {
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .iter()
            .filter(|s| s.value().topic == topic)
            .map(|s| s.value().handler.clone())
            .collect();
        trace!("Delivering event on '{}' to {} handlers", topic, handlers.len());
        for handler in &handlers {
            handler(args);
        }
        handlers.len()
    }
}

#[async_trait]
impl Session for MemoryBus {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn subscribe(
        &self,
        topic: &str,
        handler: EventHandler,
    ) -> Result<SubscriptionId, SessionError> {
        self.ensure_open()?;
        if let Some(reason) = self.take_fault(BusOp::Subscribe) {
            return Err(SessionError::Subscribe {
                topic: topic.to_string(),
                reason,
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.insert(
            id,
            Subscription {
                topic: topic.to_string(),
                handler,
            },
        );
        debug!("Subscription {} on '{}'", id, topic);
        Ok(SubscriptionId(id))
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.subscriptions
            .remove(&id.0)
            .map(|_| ())
            .ok_or(SessionError::NoSuchSubscription(id.0))
    }

    fn subscriptions(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<SubscriptionId> =
            self.subscriptions.iter().map(|s| SubscriptionId(*s.key())).collect();
        ids.sort();
        ids
    }

    async fn publish(&self, topic: &str, args: Args) -> Result<(), SessionError> {
        self.ensure_open()?;
        if let Some(reason) = self.take_fault(BusOp::Publish) {
            return Err(SessionError::Publish {
                topic: topic.to_string(),
                reason,
            });
        }
        self.published.lock().push((topic.to_string(), args.clone()));
        self.deliver(topic, &args);
        Ok(())
    }

    async fn call(&self, procedure: &str, args: Args) -> Result<Value, SessionError> {
        self.ensure_open()?;
        self.calls.lock().push((procedure.to_string(), args.clone()));
        if let Some(reason) = self.take_fault(BusOp::Call) {
            return Err(SessionError::Call {
                procedure: procedure.to_string(),
                reason,
            });
        }
        let handler = self
            .procedures
            .get(procedure)
            .map(|h| h.value().clone())
            .ok_or_else(|| SessionError::NoSuchProcedure(procedure.to_string()))?;
        handler(&args).map_err(|reason| SessionError::Call {
            procedure: procedure.to_string(),
            reason,
        })
    }
}

/// How [`MemoryTransport::open`] behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenBehavior {
    /// Open the bus immediately.
    Open,
    /// Close at once with the given reason.
    Refuse(CloseReason),
    /// Never report anything; the caller's timeout decides.
    Silent,
}

/// Transport handing out a [`MemoryBus`].
pub struct MemoryTransport {
    bus: Arc<MemoryBus>,
    behavior: Mutex<OpenBehavior>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    last_uri: Mutex<Option<(String, String)>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryTransport {
    /// Transport that opens `bus` immediately.
    pub fn new(bus: Arc<MemoryBus>) -> Arc<Self> {
        Self::with_behavior(bus, OpenBehavior::Open)
    }

    pub fn with_behavior(bus: Arc<MemoryBus>, behavior: OpenBehavior) -> Arc<Self> {
        Arc::new(Self {
            bus,
            behavior: Mutex::new(behavior),
            events: Mutex::new(None),
            last_uri: Mutex::new(None),
            opens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: OpenBehavior) {
        *self.behavior.lock() = behavior;
    }

    pub fn bus(&self) -> &Arc<MemoryBus> {
        &self.bus
    }

    /// `(uri, realm)` of the latest open request.
    pub fn last_open(&self) -> Option<(String, String)> {
        self.last_uri.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::Acquire)
    }

    /// Number of forced closes.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }

    fn emit(&self, event: TransportEvent) -> bool {
        match self.events.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Report the bus as open now (after a silent open).
    pub fn complete_open(&self) -> bool {
        self.bus.reopen();
        let session: Arc<dyn Session> = self.bus.clone();
        self.emit(TransportEvent::Opened(session))
    }

    /// Close the bus from the router side.
    pub fn drop_connection(&self, reason: CloseReason, details: &str) -> bool {
        self.bus.close();
        self.emit(TransportEvent::Closed {
            reason,
            details: details.to_string(),
        })
    }
}

impl Transport for MemoryTransport {
    fn open(&self, uri: &str, realm: &str, events: mpsc::UnboundedSender<TransportEvent>) {
        self.opens.fetch_add(1, Ordering::AcqRel);
        *self.last_uri.lock() = Some((uri.to_string(), realm.to_string()));
        *self.events.lock() = Some(events);

        let behavior = self.behavior.lock().clone();
        match behavior {
            OpenBehavior::Open => {
                self.complete_open();
            }
            OpenBehavior::Refuse(reason) => {
                self.emit(TransportEvent::Closed {
                    reason,
                    details: format!("{} refused", uri),
                });
            }
            OpenBehavior::Silent => debug!("Holding open request for {}", uri),
        }
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::AcqRel);
        self.bus.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (EventHandler, Arc<Mutex<Vec<Args>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: EventHandler = Arc::new(move |args: &[Value]| sink.lock().push(args.to_vec()));
        (handler, seen)
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = MemoryBus::new();
        let (handler, seen) = recorder();
        bus.subscribe("a.b", handler).await.expect("subscribe");

        bus.publish("a.b", vec![json!("hello")]).await.expect("publish");
        bus.publish("other", vec![json!("nope")]).await.expect("publish");

        assert_eq!(*seen.lock(), vec![vec![json!("hello")]]);
        assert_eq!(bus.published().len(), 2);
        assert_eq!(bus.published_on("a.b"), vec![vec![json!("hello")]]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = MemoryBus::new();
        let (handler, seen) = recorder();
        let id = bus.subscribe("t", handler).await.expect("subscribe");
        assert_eq!(bus.subscriptions(), vec![id]);

        bus.unsubscribe(id).await.expect("unsubscribe");
        bus.publish("t", vec![json!(1)]).await.expect("publish");
        assert!(seen.lock().is_empty());
        assert_eq!(
            bus.unsubscribe(id).await,
            Err(SessionError::NoSuchSubscription(id.0))
        );
    }

    #[tokio::test]
    async fn test_call_dispatch() {
        let bus = MemoryBus::new();
        bus.register_procedure("math.add", |args| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        });

        let result = bus.call("math.add", vec![json!(2), json!(3)]).await;
        assert_eq!(result, Ok(json!(5)));

        let missing = bus.call("math.sub", vec![]).await;
        assert_eq!(missing, Err(SessionError::NoSuchProcedure("math.sub".into())));
        assert_eq!(bus.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_faults_apply_once_per_op() {
        let bus = MemoryBus::new();
        bus.register_procedure("p", |_| Ok(Value::Null));
        bus.fail_next(BusOp::Call, "boom");
        bus.fail_next(BusOp::Subscribe, "nope");

        let (handler, _) = recorder();
        assert!(matches!(
            bus.subscribe("t", handler.clone()).await,
            Err(SessionError::Subscribe { .. })
        ));
        assert!(bus.subscribe("t", handler).await.is_ok());

        assert!(bus.call("p", vec![]).await.is_err());
        assert!(bus.call("p", vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_bus_rejects_operations() {
        let bus = MemoryBus::new();
        bus.close();
        assert!(!bus.is_open());
        assert_eq!(bus.publish("t", vec![]).await, Err(SessionError::Closed));
        bus.reopen();
        assert!(bus.publish("t", vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_behaviours() {
        let bus = MemoryBus::new();
        let transport = MemoryTransport::new(bus.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.open("ws://x/ws", "realm1", tx);
        assert!(matches!(rx.recv().await, Some(TransportEvent::Opened(_))));
        assert_eq!(
            transport.last_open(),
            Some(("ws://x/ws".to_string(), "realm1".to_string()))
        );

        transport.set_behavior(OpenBehavior::Refuse(CloseReason::Unreachable));
        let (tx, mut rx) = mpsc::unbounded_channel();
        transport.open("ws://y/ws", "realm1", tx);
        assert!(matches!(
            rx.recv().await,
            Some(TransportEvent::Closed {
                reason: CloseReason::Unreachable,
                ..
            })
        ));

        transport.close();
        assert_eq!(transport.close_count(), 1);
        assert!(!bus.is_open());
    }
}
