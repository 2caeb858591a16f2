// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// In-memory collaborator implementations.
//
// Deterministic stand-ins for the relay transport and the tool pool, used
// by the unit and integration suites to observe exactly what the core
// publishes and dispatches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::BridgeError;
use crate::domain::event::{EventKind, RelayEvent};
use crate::domain::relay::{EventFilter, RelayTransport, RequestHandler};
use crate::domain::tool::{ToolCatalog, ToolDescriptor, ToolPool};

/// Ordered trace of cross-collaborator actions, shared between fakes so
/// tests can assert sequencing (e.g. processing published before the
/// backend call).
pub type Trace = Arc<Mutex<Vec<String>>>;

pub fn shared_trace() -> Trace {
    Arc::new(Mutex::new(Vec::new()))
}

/// Relay transport that records published events and serves canned query
/// results.
#[derive(Default)]
pub struct RecordingRelay {
    published: Mutex<Vec<RelayEvent>>,
    query_results: Mutex<Vec<RelayEvent>>,
    subscriptions: Mutex<Vec<(EventKind, Arc<dyn RequestHandler>)>>,
    shut_down: AtomicBool,
    publish_failure: Mutex<Option<String>>,
    trace: Mutex<Option<Trace>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(self, trace: Trace) -> Self {
        *self.trace.lock().unwrap() = Some(trace);
        self
    }

    /// Make every publish fail with the given message.
    pub fn failing_publish(self, message: &str) -> Self {
        *self.publish_failure.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn set_query_results(&self, events: Vec<RelayEvent>) {
        *self.query_results.lock().unwrap() = events;
    }

    pub fn published(&self) -> Vec<RelayEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Deliver an event to every matching live subscription, awaiting each
    /// handler (tests want deterministic completion, not task spawning).
    pub async fn deliver(&self, event: RelayEvent) {
        let handlers: Vec<Arc<dyn RequestHandler>> = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _)| kind.as_u16() == event.kind)
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler.handle(event.clone()).await;
        }
    }

    fn record(&self, entry: String) {
        if let Some(trace) = self.trace.lock().unwrap().as_ref() {
            trace.lock().unwrap().push(entry);
        }
    }
}

#[async_trait]
impl RelayTransport for RecordingRelay {
    async fn publish(&self, event: RelayEvent) -> Result<(), BridgeError> {
        if let Some(message) = self.publish_failure.lock().unwrap().clone() {
            return Err(BridgeError::Transport(message));
        }
        let label = event
            .tag_value("status")
            .map(str::to_string)
            .unwrap_or_else(|| event.kind.to_string());
        self.record(format!("publish:{label}"));
        self.published.lock().unwrap().push(event);
        Ok(())
    }

    async fn query(&self, _filter: EventFilter) -> Result<Vec<RelayEvent>, BridgeError> {
        Ok(self.query_results.lock().unwrap().clone())
    }

    async fn subscribe(
        &self,
        kind: EventKind,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), BridgeError> {
        self.subscriptions.lock().unwrap().push((kind, handler));
        Ok(())
    }

    async fn shutdown(&self) {
        self.subscriptions.lock().unwrap().clear();
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// Tool pool with a fixed catalog and scripted per-tool results.
#[derive(Default)]
pub struct StaticToolPool {
    tools: Vec<ToolDescriptor>,
    results: Mutex<HashMap<String, Result<Value, String>>>,
    calls: Mutex<Vec<(String, Value)>>,
    connected: AtomicBool,
    connect_failure: Option<String>,
    list_failure: Option<String>,
    trace: Mutex<Option<Trace>>,
}

impl StaticToolPool {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    pub fn with_trace(self, trace: Trace) -> Self {
        *self.trace.lock().unwrap() = Some(trace);
        self
    }

    /// Script the outcome of calling the named tool.
    pub fn with_result(self, name: &str, result: Result<Value, String>) -> Self {
        self.results.lock().unwrap().insert(name.to_string(), result);
        self
    }

    pub fn failing_connect(mut self, message: &str) -> Self {
        self.connect_failure = Some(message.to_string());
        self
    }

    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn record(&self, entry: String) {
        if let Some(trace) = self.trace.lock().unwrap().as_ref() {
            trace.lock().unwrap().push(entry);
        }
    }
}

#[async_trait]
impl ToolPool for StaticToolPool {
    async fn connect(&self) -> Result<(), BridgeError> {
        if let Some(message) = &self.connect_failure {
            return Err(BridgeError::Backend(message.clone()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn list_tools(&self) -> Result<ToolCatalog, BridgeError> {
        if let Some(message) = &self.list_failure {
            return Err(BridgeError::Backend(message.clone()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, params: Value) -> Result<Value, BridgeError> {
        self.record(format!("call:{name}"));
        self.calls.lock().unwrap().push((name.to_string(), params));
        match self.results.lock().unwrap().get(name) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(BridgeError::Backend(message.clone())),
            None => Err(BridgeError::Backend(format!("unknown tool: {name}"))),
        }
    }
}
