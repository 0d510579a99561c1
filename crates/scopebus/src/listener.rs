// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Listener - receives typed samples on a scope.

use crate::codec::{Sample, TypeCodec};
use crate::connection::Connection;
use crate::error::{BridgeError, BridgeResult};
use crate::scope;
use crate::session::{EventHandler, Session, SubscriptionId};
use crate::REGISTER_PROCEDURE;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Callback receiving decoded samples.
pub type MessageHandler = Arc<dyn Fn(Sample) + Send + Sync>;

/// An active subscription on a scope.
///
/// # Example
///
/// ```rust,no_run
/// use scopebus::{BridgeConfig, Connection, MemoryBus, MemoryTransport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let connection = Connection::new(MemoryTransport::new(MemoryBus::new()), BridgeConfig::default());
/// connection.connect(None).await?;
///
/// let listener = connection
///     .create_listener("/sensors/laser", "float", |sample| {
///         println!("range: {:?}", sample.to_json());
///     })
///     .await?;
/// listener.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Listener {
    scope: String,
    topic: String,
    codec: TypeCodec,
    /// Session the subscription lives on; it ends with that session.
    session: Weak<dyn Session>,
    subscription: SubscriptionId,
    registration: Value,
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("scope", &self.scope)
            .field("topic", &self.topic)
            .field("type_name", &self.codec.type_name())
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

impl Listener {
    /// Subscribe on the translated topic and register the scope.
    ///
    /// Both requests run concurrently; the listener exists only if both
    /// succeed.
    pub async fn subscribe<F>(
        connection: &Connection,
        scope: &str,
        type_name: &str,
        on_message: F,
    ) -> BridgeResult<Self>
    where
        F: Fn(Sample) + Send + Sync + 'static,
    {
        let session = connection.session()?;
        let codec = connection.codecs().resolve(type_name)?;
        let topic = scope::translate(scope);

        let handler = decoding_handler(topic.clone(), codec.clone(), Arc::new(on_message));
        let register_args = vec![json!(scope), json!(type_name)];

        let (subscribed, registered) = tokio::join!(
            session.subscribe(&topic, handler),
            session.call(REGISTER_PROCEDURE, register_args),
        );

        match (subscribed, registered) {
            (Ok(subscription), Ok(registration)) => {
                info!("Listening on '{}' as {}", topic, type_name);
                Ok(Self {
                    scope: scope.to_string(),
                    topic,
                    codec,
                    session: Arc::downgrade(&session),
                    subscription,
                    registration,
                })
            }
            (Ok(subscription), Err(e)) => {
                warn!("Registration of '{}' failed: {}", scope, e);
                if let Err(unsub) = session.unsubscribe(subscription).await {
                    debug!("Could not drop subscription {}: {}", subscription, unsub);
                }
                Err(e.into())
            }
            (Err(e), registered) => {
                warn!("Subscription to '{}' failed: {}", topic, e);
                if let Err(reg) = registered {
                    debug!("Registration of '{}' also failed: {}", scope, reg);
                }
                Err(e.into())
            }
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Bus topic the listener is subscribed on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn type_name(&self) -> &str {
        self.codec.type_name()
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Acknowledgement returned by the registration call.
    pub fn registration(&self) -> &Value {
        &self.registration
    }

    /// Stop receiving. Nothing is left to release once the session the
    /// listener subscribed on has closed.
    pub async fn close(self) -> BridgeResult<()> {
        let Some(session) = self.session.upgrade().filter(|s| s.is_open()) else {
            debug!("Session of listener on '{}' already closed", self.topic);
            return Ok(());
        };
        session
            .unsubscribe(self.subscription)
            .await
            .map_err(BridgeError::from)?;
        debug!("Listener on '{}' closed", self.topic);
        Ok(())
    }
}

/// Decode the first event argument and hand it on; undecodable events are
/// logged and dropped.
fn decoding_handler(topic: String, codec: TypeCodec, on_message: MessageHandler) -> EventHandler {
    Arc::new(move |args: &[Value]| {
        let Some(raw) = args.first() else {
            warn!("Empty event on '{}'", topic);
            return;
        };
        match codec.decode(raw) {
            Ok(sample) => on_message(sample),
            Err(e) => warn!("Error on scope '{}': {}", topic, e),
        }
    })
}
