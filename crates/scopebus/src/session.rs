// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus session and transport abstraction.
//!
//! The bridge speaks to the router through two traits:
//!
//! ```text
//! Transport ──open()──▶ TransportEvent::Opened(Arc<dyn Session>)
//!     │                 TransportEvent::Closed { reason, details }
//!     └──close()
//!
//! Session: subscribe / unsubscribe / publish / call
//! ```
//!
//! Arguments are positional JSON values; a call result is a single value.
//! [`crate::memory`] provides an in-process implementation of both.

use crate::error::SessionError;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Positional bus arguments.
pub type Args = Vec<Value>;

/// Callback invoked with the arguments of each event on a subscribed topic.
pub type EventHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Session-assigned subscription handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open session on the router.
#[async_trait]
pub trait Session: Send + Sync {
    /// Whether the session can still carry traffic.
    fn is_open(&self) -> bool;

    /// Subscribe `handler` to `topic`.
    async fn subscribe(
        &self,
        topic: &str,
        handler: EventHandler,
    ) -> Result<SubscriptionId, SessionError>;

    /// Drop a subscription.
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), SessionError>;

    /// Subscriptions currently held by this session.
    fn subscriptions(&self) -> Vec<SubscriptionId>;

    /// Publish an event.
    async fn publish(&self, topic: &str, args: Args) -> Result<(), SessionError>;

    /// Call a remote procedure.
    async fn call(&self, procedure: &str, args: Args) -> Result<Value, SessionError>;
}

/// Why a transport closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Router could not be reached.
    Unreachable,
    /// Established connection was lost.
    Lost,
    /// Closed deliberately by either side.
    Closed,
    /// Router does not speak the protocol.
    Unsupported,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unreachable => "unreachable",
            Self::Lost => "lost",
            Self::Closed => "closed",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

/// Lifecycle events emitted by a transport.
pub enum TransportEvent {
    /// A session is open.
    Opened(Arc<dyn Session>),
    /// The transport closed.
    Closed { reason: CloseReason, details: String },
}

impl fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opened(_) => f.write_str("Opened"),
            Self::Closed { reason, details } => f
                .debug_struct("Closed")
                .field("reason", reason)
                .field("details", details)
                .finish(),
        }
    }
}

/// Connection-level plumbing to the router.
pub trait Transport: Send + Sync {
    /// Start opening a session on `uri` in `realm`. Lifecycle events are sent
    /// on `events`; the call itself must not block.
    fn open(&self, uri: &str, realm: &str, events: mpsc::UnboundedSender<TransportEvent>);

    /// Force the transport closed.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::Unreachable.to_string(), "unreachable");
        assert_eq!(CloseReason::Lost.to_string(), "lost");
    }

    #[test]
    fn test_event_debug() {
        let event = TransportEvent::Closed {
            reason: CloseReason::Closed,
            details: "bye".into(),
        };
        assert_eq!(
            format!("{:?}", event),
            r#"Closed { reason: Closed, details: "bye" }"#
        );
    }
}
