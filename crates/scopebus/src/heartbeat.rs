// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Keep-alive responder and raw event tap.

use crate::connection::Connection;
use crate::error::BridgeResult;
use crate::session::{EventHandler, SubscriptionId};
use crate::{HEARTBEAT_TOPIC, PING, PONG};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// True for a string argument carrying the ping token, either bare
/// (`"ping"`) or inside a longer text such as `"ping 42"`. Non-string
/// arguments never count, and the `"pong"` reply does not match.
fn is_ping(arg: &Value) -> bool {
    arg.as_str().is_some_and(|s| s.contains(PING))
}

/// Subscribe to the heartbeat topic and answer every message whose
/// arguments contain the ping token with a single `["pong"]` publish.
pub async fn create_ping_pong(connection: &Connection) -> BridgeResult<SubscriptionId> {
    let session = connection.session()?;
    let weak = Arc::downgrade(&session);

    let handler: EventHandler = Arc::new(move |args: &[Value]| {
        if !args.iter().any(is_ping) {
            return;
        }
        let Some(session) = weak.upgrade() else {
            debug!("Ping after session closed");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Ping received outside a Tokio runtime, not answering");
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = session.publish(HEARTBEAT_TOPIC, vec![json!(PONG)]).await {
                warn!("Failed to answer ping: {}", e);
            }
        });
    });

    let id = session.subscribe(HEARTBEAT_TOPIC, handler).await?;
    info!("Answering pings on '{}'", HEARTBEAT_TOPIC);
    Ok(id)
}

/// Subscribe to a bus topic as-is and log every event.
pub async fn show_events(connection: &Connection, topic: &str) -> BridgeResult<SubscriptionId> {
    let session = connection.session()?;
    let name = topic.to_string();
    let handler: EventHandler = Arc::new(move |args: &[Value]| {
        let event = Value::Array(args.to_vec());
        info!("Event on '{}': {}", name, event);
    });
    let id = session.subscribe(topic, handler).await?;
    debug!("Showing events on '{}'", topic);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::error::BridgeError;
    use crate::memory::{BusOp, MemoryBus, MemoryTransport};
    use crate::session::Session;

    async fn connected() -> (Connection, Arc<MemoryBus>) {
        let bus = MemoryBus::new();
        let conn = Connection::new(MemoryTransport::new(bus.clone()), BridgeConfig::default());
        conn.connect(None).await.expect("connect");
        (conn, bus)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_ping_gets_pong() {
        let (conn, bus) = connected().await;
        conn.create_ping_pong().await.expect("ping pong");

        bus.publish(HEARTBEAT_TOPIC, vec![json!("ping")]).await.expect("publish");
        settle().await;

        assert_eq!(
            bus.published_on(HEARTBEAT_TOPIC),
            vec![vec![json!("ping")], vec![json!("pong")]]
        );
    }

    #[tokio::test]
    async fn test_other_payloads_ignored() {
        let (conn, bus) = connected().await;
        conn.create_ping_pong().await.expect("ping pong");

        bus.publish(HEARTBEAT_TOPIC, vec![json!("hello")]).await.expect("publish");
        bus.publish(HEARTBEAT_TOPIC, vec![json!({"ping": true})]).await.expect("publish");
        settle().await;

        assert_eq!(bus.published_on(HEARTBEAT_TOPIC).len(), 2);
    }

    #[tokio::test]
    async fn test_ping_anywhere_in_args() {
        let (conn, bus) = connected().await;
        conn.create_ping_pong().await.expect("ping pong");

        bus.publish(HEARTBEAT_TOPIC, vec![json!(1), json!("ping")]).await.expect("publish");
        settle().await;

        assert_eq!(bus.published_on(HEARTBEAT_TOPIC).last(), Some(&vec![json!("pong")]));
    }

    #[tokio::test]
    async fn test_ping_token_inside_text() {
        let (conn, bus) = connected().await;
        conn.create_ping_pong().await.expect("ping pong");

        bus.publish(HEARTBEAT_TOPIC, vec![json!("ping 42")]).await.expect("publish");
        settle().await;

        assert_eq!(
            bus.published_on(HEARTBEAT_TOPIC),
            vec![vec![json!("ping 42")], vec![json!("pong")]]
        );
    }

    #[test]
    fn test_ping_detection() {
        assert!(is_ping(&json!("ping")));
        assert!(is_ping(&json!("keepalive ping")));
        assert!(!is_ping(&json!("pong")));
        assert!(!is_ping(&json!("PING")));
        assert!(!is_ping(&json!({"ping": true})));
        assert!(!is_ping(&json!(["ping"])));
    }

    #[tokio::test]
    async fn test_retry_after_failed_subscribe() {
        let (conn, bus) = connected().await;
        bus.fail_next(BusOp::Subscribe, "not now");
        assert!(matches!(
            conn.create_ping_pong().await,
            Err(BridgeError::Session(_))
        ));
        conn.create_ping_pong().await.expect("retry");
        assert_eq!(bus.subscriber_count(HEARTBEAT_TOPIC), 1);
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let conn = Connection::new(MemoryTransport::new(MemoryBus::new()), BridgeConfig::default());
        assert!(matches!(
            conn.create_ping_pong().await,
            Err(BridgeError::NotConnected)
        ));
        assert!(matches!(
            conn.show_events("any.topic").await,
            Err(BridgeError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_show_events_uses_topic_verbatim() {
        let (conn, bus) = connected().await;
        let id = conn.show_events("/raw/topic").await.expect("show events");
        assert_eq!(bus.subscriber_count("/raw/topic"), 1);
        assert_eq!(bus.subscriptions(), vec![id]);
        bus.publish("/raw/topic", vec![json!("x"), json!({"n": 1})])
            .await
            .expect("publish");
        assert_eq!(bus.published_on("/raw/topic").len(), 1);
    }
}
