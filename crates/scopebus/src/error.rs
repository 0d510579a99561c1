// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for bridge operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors reported by the underlying bus session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Subscribe request was refused
    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    /// Publish request was refused
    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Remote procedure call failed
    #[error("call to '{procedure}' failed: {reason}")]
    Call { procedure: String, reason: String },

    /// No procedure registered under that name
    #[error("no such procedure: {0}")]
    NoSuchProcedure(String),

    /// Subscription id unknown to the session
    #[error("no such subscription: {0}")]
    NoSuchSubscription(u64),

    /// Session is no longer open
    #[error("session closed")]
    Closed,
}

/// Errors produced while loading or interpreting schema documents.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed schema {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("schema for '{expected}' declares name '{found}'")]
    NameMismatch { expected: String, found: String },

    #[error("field '{field}' of '{type_name}' has unknown type '{field_type}'")]
    UnknownFieldType {
        type_name: String,
        field: String,
        field_type: String,
    },

    #[error("type '{0}' refers to itself")]
    Recursive(String),
}

/// Errors surfaced by the bridge entities.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// An entity was created or used without an open connection
    #[error("not connected")]
    NotConnected,

    /// No schema was found for a structured type in any lookup location
    #[error("schema not found for '{type_name}' (tried {tried:?})")]
    SchemaNotFound {
        type_name: String,
        tried: Vec<PathBuf>,
    },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Value could not be serialized for the declared type
    #[error("encode error for '{type_name}': {message}")]
    Encode { type_name: String, message: String },

    /// Payload could not be deserialized for the declared type
    #[error("decode error for '{type_name}': {message}")]
    Decode { type_name: String, message: String },

    /// Sample kind does not fit the declared type
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Remote server has no method of that name
    #[error("unknown remote method: {0}")]
    UnknownMethod(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl BridgeError {
    pub(crate) fn encode(type_name: &str, message: impl ToString) -> Self {
        Self::Encode {
            type_name: type_name.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn decode(type_name: &str, message: impl ToString) -> Self {
        Self::Decode {
            type_name: type_name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Outcome of a failed connect attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Transport could not reach the router, or the connect timer expired
    #[error("{uri} unreachable{}", .timed_out.then_some(" (timed out)").unwrap_or_default())]
    Unreachable { uri: String, timed_out: bool },

    /// Transport closed before the session opened
    #[error("connection closed before open: {reason}")]
    Closed { reason: String },

    /// Another connect attempt is still running
    #[error("connect already in progress")]
    InProgress,

    /// Connect driver stopped without reporting a result
    #[error("connect attempt aborted")]
    Aborted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreachable_display() {
        let err = ConnectError::Unreachable {
            uri: "ws://127.0.0.1:8080/ws".into(),
            timed_out: true,
        };
        assert_eq!(err.to_string(), "ws://127.0.0.1:8080/ws unreachable (timed out)");

        let err = ConnectError::Unreachable {
            uri: "ws://host/ws".into(),
            timed_out: false,
        };
        assert_eq!(err.to_string(), "ws://host/ws unreachable");
    }

    #[test]
    fn test_session_error_converts() {
        let err: BridgeError = SessionError::NoSuchProcedure("x.y".into()).into();
        assert!(matches!(err, BridgeError::Session(SessionError::NoSuchProcedure(_))));
        assert_eq!(err.to_string(), "no such procedure: x.y");
    }
}
