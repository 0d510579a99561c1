// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Remote server proxy.
//!
//! Methods of a remote server are invoked through the display server's call
//! procedure:
//!
//! ```text
//! service.displayserver.call(scope, method, [payload], input_type, output_type)
//! ```

use crate::codec::{Sample, TypeCodec};
use crate::connection::Connection;
use crate::error::{BridgeError, BridgeResult};
use crate::session::Session;
use crate::CALL_PROCEDURE;
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

/// One callable method of a remote server.
#[derive(Clone)]
pub struct RemoteMethod {
    scope: String,
    name: String,
    input: TypeCodec,
    output: TypeCodec,
    connection: Connection,
}

impl std::fmt::Debug for RemoteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMethod")
            .field("scope", &self.scope)
            .field("name", &self.name)
            .field("input", &self.input.type_name())
            .field("output", &self.output.type_name())
            .finish_non_exhaustive()
    }
}

impl RemoteMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_type(&self) -> &str {
        self.input.type_name()
    }

    pub fn output_type(&self) -> &str {
        self.output.type_name()
    }

    /// Invoke the method on the connection's current session and decode its
    /// result.
    pub async fn call(&self, arg: impl Into<Sample>) -> BridgeResult<Sample> {
        let session = self.connection.session()?;
        let payload = self.input.encode(arg.into())?;
        let args = vec![
            json!(self.scope),
            json!(self.name),
            Value::Array(vec![payload]),
            json!(self.input.type_name()),
            json!(self.output.type_name()),
        ];
        debug!("Calling {}::{}", self.scope, self.name);

        let result = session.call(CALL_PROCEDURE, args).await.map_err(|e| {
            warn!("Call {}::{} failed: {}", self.scope, self.name, e);
            BridgeError::from(e)
        })?;
        self.output.decode(&result)
    }
}

/// Proxy for the methods of a remote server on one scope.
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
/// let mut server = connection.remote_server("/robot/arm")?;
/// server.add_method("moveTo", "float", "bool")?;
/// let reached = server.call("moveTo", 0.5).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RemoteServer {
    scope: String,
    connection: Connection,
    methods: HashMap<String, RemoteMethod>,
}

impl RemoteServer {
    /// Proxy for `scope`. Requires an open connection.
    pub fn new(connection: &Connection, scope: &str) -> BridgeResult<Self> {
        connection.session()?;
        Ok(Self {
            scope: scope.to_string(),
            connection: connection.clone(),
            methods: HashMap::new(),
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Declare a method; both codecs are resolved now. Re-adding a name
    /// replaces the previous declaration.
    pub fn add_method(
        &mut self,
        name: &str,
        input_type: &str,
        output_type: &str,
    ) -> BridgeResult<&RemoteMethod> {
        self.connection.session()?;
        let codecs = self.connection.codecs();
        let method = RemoteMethod {
            scope: self.scope.clone(),
            name: name.to_string(),
            input: codecs.resolve(input_type)?,
            output: codecs.resolve(output_type)?,
            connection: self.connection.clone(),
        };
        debug!("Method {}::{} ({} -> {})", self.scope, name, input_type, output_type);
        let slot = match self.methods.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(method);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(method),
        };
        Ok(slot)
    }

    pub fn method(&self, name: &str) -> Option<&RemoteMethod> {
        self.methods.get(name)
    }

    /// Declared method names.
    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Invoke a declared method.
    pub async fn call(&self, name: &str, arg: impl Into<Sample>) -> BridgeResult<Sample> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| BridgeError::UnknownMethod(name.to_string()))?;
        method.call(arg).await
    }
}
