// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Informer - publishes typed samples on a scope.

use crate::codec::{Sample, TypeCodec};
use crate::connection::Connection;
use crate::error::BridgeResult;
use crate::scope;
use crate::session::Session;
use crate::REGISTER_PROCEDURE;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the bus.
    Sent,
    /// Swallowed by the echo guard.
    Suppressed,
}

/// Publisher bound to one scope and type.
///
/// The echo guard lets an application that mirrors remote state skip the
/// one publish its own update would otherwise trigger: while set, the next
/// publish is dropped and the guard cleared.
pub struct Informer {
    scope: String,
    topic: String,
    codec: TypeCodec,
    connection: Connection,
    echo_guard: AtomicBool,
    publish_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Informer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Informer")
            .field("scope", &self.scope)
            .field("type_name", &self.codec.type_name())
            .field("echo_guard", &self.echo_guard())
            .finish_non_exhaustive()
    }
}

impl Informer {
    fn new(connection: &Connection, scope: &str, type_name: &str) -> BridgeResult<Arc<Self>> {
        connection.session()?;
        let codec = connection.codecs().resolve(type_name)?;
        Ok(Arc::new(Self {
            scope: scope.to_string(),
            topic: scope::translate(scope),
            codec,
            connection: connection.clone(),
            echo_guard: AtomicBool::new(false),
            publish_lock: tokio::sync::Mutex::new(()),
        }))
    }

    /// Create the informer now and register it in the background.
    ///
    /// Connection and type errors are returned immediately; the registration
    /// outcome is handed to `on_registered` later. Must be called from within
    /// a Tokio runtime.
    pub fn create<F>(
        connection: &Connection,
        scope: &str,
        type_name: &str,
        on_registered: F,
    ) -> BridgeResult<Arc<Self>>
    where
        F: FnOnce(BridgeResult<Value>, Arc<Informer>) + Send + 'static,
    {
        let informer = Self::new(connection, scope, type_name)?;
        let task_informer = informer.clone();
        tokio::spawn(async move {
            let result = task_informer.register().await;
            on_registered(result, task_informer);
        });
        Ok(informer)
    }

    /// Create the informer and wait for its registration.
    pub async fn create_registered(
        connection: &Connection,
        scope: &str,
        type_name: &str,
    ) -> BridgeResult<(Arc<Self>, Value)> {
        let informer = Self::new(connection, scope, type_name)?;
        let ack = informer.register().await?;
        Ok((informer, ack))
    }

    async fn register(&self) -> BridgeResult<Value> {
        let session = self.connection.session()?;
        let args = vec![json!(self.scope), json!(self.codec.type_name())];
        match session.call(REGISTER_PROCEDURE, args).await {
            Ok(ack) => {
                info!("Informer on '{}' registered as {}", self.scope, self.codec.type_name());
                Ok(ack)
            }
            Err(e) => {
                warn!("Registration of informer on '{}' failed: {}", self.scope, e);
                Err(e.into())
            }
        }
    }

    /// Publish a sample on the connection's current session, unless the echo
    /// guard swallows it.
    pub async fn publish(&self, sample: impl Into<Sample>) -> BridgeResult<PublishOutcome> {
        if self.echo_guard.swap(false, Ordering::AcqRel) {
            debug!("Echo guard suppressed publish on '{}'", self.topic);
            return Ok(PublishOutcome::Suppressed);
        }

        let session = self.connection.session()?;
        let payload = self.codec.encode(sample.into())?;
        let _ordered = self.publish_lock.lock().await;
        session.publish(&self.topic, vec![payload]).await?;
        Ok(PublishOutcome::Sent)
    }

    /// Arm or disarm the echo guard.
    pub fn set_echo_guard(&self, on: bool) {
        self.echo_guard.store(on, Ordering::Release);
    }

    pub fn echo_guard(&self) -> bool {
        self.echo_guard.load(Ordering::Acquire)
    }

    /// Zero value for this informer's type.
    pub fn default_value(&self) -> Sample {
        self.codec.default_value()
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn type_name(&self) -> &str {
        self.codec.type_name()
    }
}
