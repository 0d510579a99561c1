// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # scopebus - typed scopes over a pub/sub + RPC bus
//!
//! Lets an application exchange typed events and call remote methods over a
//! topic-based publish/subscribe and RPC message bus, addressed by
//! *scope* (`/robot/arm/pose`) and *type name* (`string`, `float`,
//! `rst.geometry.Pose`, ...).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scopebus::{BridgeConfig, Connection, MemoryBus, MemoryTransport, Sample};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Any Transport works; the in-process bus is the simplest one
//! let connection = Connection::new(MemoryTransport::new(MemoryBus::new()), BridgeConfig::default());
//! connection.connect(None).await?;
//!
//! let listener = connection
//!     .create_listener("/chat", "string", |sample: Sample| {
//!         println!("received {:?}", sample.as_str());
//!     })
//!     .await?;
//!
//! let (informer, _ack) = connection.create_informer_registered("/chat", "string").await?;
//! informer.publish("hello").await?;
//!
//! listener.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |   Listener | Informer | RemoteServer | ping/pong | event tap  |
//! +---------------------------------------------------------------+
//! |   Connection (bounded connect, state)  |  CodecRegistry       |
//! |                                         |  primitive / schema  |
//! +---------------------------------------------------------------+
//! |   Session / Transport traits (MemoryBus, or a real router)    |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Connection`] | Owns the session, factory for all entities |
//! | [`Listener`] | Decodes events on a scope and hands them to a callback |
//! | [`Informer`] | Encodes and publishes samples on a scope |
//! | [`RemoteServer`] | Calls named methods of a remote server |
//! | [`CodecRegistry`] | Maps type names to codecs, loading schemas on demand |
//! | [`Sample`] | Raw JSON value or schema-typed [`types::DynamicData`] |
//!
//! ## Display server protocol
//!
//! Listeners and informers announce themselves through
//! [`REGISTER_PROCEDURE`]; remote methods go through [`CALL_PROCEDURE`].
//! Structured payloads travel as a JSON string: `\0` followed by the base64
//! of the binary encoding in [`types::wire`].

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod informer;
pub mod listener;
pub mod memory;
pub mod remote;
pub mod scope;
pub mod session;
pub mod types;

/// Procedure announcing a `(scope, type)` pair to the display server.
pub const REGISTER_PROCEDURE: &str = "service.displayserver.register";

/// Procedure forwarding a remote method call.
pub const CALL_PROCEDURE: &str = "service.displayserver.call";

/// Router keep-alive topic.
pub const HEARTBEAT_TOPIC: &str = "com.wamp.ping";

pub const PING: &str = "ping";
pub const PONG: &str = "pong";

pub use codec::{classify, BusType, CodecRegistry, PrimitiveType, Sample, TypeClass, TypeCodec};
pub use config::{BridgeConfig, ConfigError, Origin};
pub use connection::{Connection, ConnectionState};
pub use error::{BridgeError, BridgeResult, ConnectError, SchemaError, SessionError};
pub use informer::{Informer, PublishOutcome};
pub use listener::{Listener, MessageHandler};
pub use memory::{BusOp, MemoryBus, MemoryTransport, OpenBehavior};
pub use remote::{RemoteMethod, RemoteServer};
pub use session::{
    Args, CloseReason, EventHandler, Session, SubscriptionId, Transport, TransportEvent,
};
