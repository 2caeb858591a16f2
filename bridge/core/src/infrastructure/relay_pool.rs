// Copyright (c) 2026 dvmcp contributors
// SPDX-License-Identifier: AGPL-3.0

// Websocket relay pool.
//
// One connection per configured relay. Outbound events fan out to every
// relay; inbound events are deduplicated per subscription across relays
// before they reach the caller. Each live-subscription event is dispatched
// on its own task so a slow handler never delays delivery of the next.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::error::BridgeError;
use crate::domain::event::{EventKind, RelayEvent};
use crate::domain::relay::{EventFilter, RelayTransport, RequestHandler};

use async_trait::async_trait;

/// Bound on how long a historical query waits for the last relay's EOSE.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type SharedSink = Arc<tokio::sync::Mutex<WsSink>>;

struct QuerySub {
    tx: mpsc::UnboundedSender<RelayEvent>,
    eose_remaining: usize,
}

/// Subscription registry shared with every per-relay reader task.
#[derive(Default)]
struct Registry {
    queries: Mutex<HashMap<String, QuerySub>>,
    live: Mutex<HashMap<String, Arc<dyn RequestHandler>>>,
    /// `subscription:event` pairs already routed, for cross-relay dedup.
    seen: Mutex<HashSet<String>>,
}

impl Registry {
    /// True the first time a given event id shows up on a subscription.
    fn first_sighting(&self, sub_id: &str, event_id: &str) -> bool {
        self.seen
            .lock()
            .unwrap()
            .insert(format!("{sub_id}:{event_id}"))
    }
}

pub struct RelayPool {
    urls: Vec<String>,
    registry: Arc<Registry>,
    sinks: Mutex<Vec<(String, SharedSink)>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
}

impl RelayPool {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            registry: Arc::new(Registry::default()),
            sinks: Mutex::new(Vec::new()),
            readers: Mutex::new(Vec::new()),
        }
    }

    /// Open a websocket connection to every configured relay. Fails if any
    /// relay is unreachable; startup wants the full pool.
    pub async fn connect(&self) -> Result<(), BridgeError> {
        for url in &self.urls {
            let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
                BridgeError::Transport(format!("failed to connect to {url}: {e}"))
            })?;
            let (sink, source) = stream.split();
            let reader = tokio::spawn(run_reader(
                url.clone(),
                source,
                self.registry.clone(),
            ));
            self.sinks
                .lock()
                .unwrap()
                .push((url.clone(), Arc::new(tokio::sync::Mutex::new(sink))));
            self.readers.lock().unwrap().push(reader);
            debug!(relay = %url, "connected to relay");
        }
        Ok(())
    }

    fn current_sinks(&self) -> Vec<(String, SharedSink)> {
        self.sinks.lock().unwrap().clone()
    }

    /// Send one frame to every relay; returns how many accepted it.
    async fn broadcast(&self, frame: &str) -> usize {
        let mut delivered = 0;
        for (url, sink) in self.current_sinks() {
            let result = sink
                .lock()
                .await
                .send(Message::Text(frame.to_string().into()))
                .await;
            match result {
                Ok(()) => delivered += 1,
                Err(e) => warn!(relay = %url, reason = %e, "failed to send frame"),
            }
        }
        delivered
    }
}

#[async_trait]
impl RelayTransport for RelayPool {
    async fn publish(&self, event: RelayEvent) -> Result<(), BridgeError> {
        let frame = serde_json::to_string(&serde_json::json!(["EVENT", event]))
            .map_err(|e| BridgeError::Transport(format!("failed to encode event: {e}")))?;
        let delivered = self.broadcast(&frame).await;
        if delivered == 0 {
            return Err(BridgeError::Transport(
                "no relay accepted the event".to_string(),
            ));
        }
        debug!(event_id = %event.id, relays = delivered, "published event");
        Ok(())
    }

    async fn query(&self, filter: EventFilter) -> Result<Vec<RelayEvent>, BridgeError> {
        let sub_id = format!("query-{}", Uuid::new_v4());
        let frame = serde_json::to_string(&serde_json::json!(["REQ", sub_id, filter]))
            .map_err(|e| BridgeError::Transport(format!("failed to encode filter: {e}")))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let relay_count = self.current_sinks().len();
        self.registry.queries.lock().unwrap().insert(
            sub_id.clone(),
            QuerySub {
                tx,
                eose_remaining: relay_count,
            },
        );

        let delivered = self.broadcast(&frame).await;
        if delivered == 0 {
            self.registry.queries.lock().unwrap().remove(&sub_id);
            return Err(BridgeError::Transport(
                "no relay accepted the query".to_string(),
            ));
        }
        if delivered < relay_count {
            // Relays that never saw the REQ will never send EOSE.
            let mut queries = self.registry.queries.lock().unwrap();
            if let Some(query) = queries.get_mut(&sub_id) {
                query.eose_remaining -= relay_count - delivered;
                if query.eose_remaining == 0 {
                    queries.remove(&sub_id);
                }
            }
        }

        // The sender side is dropped once every relay reported EOSE; the
        // timeout bounds waiting on relays that never answer.
        let mut events = Vec::new();
        let collect = async {
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
        };
        if tokio::time::timeout(QUERY_TIMEOUT, collect).await.is_err() {
            warn!(subscription = %sub_id, "query timed out waiting for EOSE");
        }

        self.registry.queries.lock().unwrap().remove(&sub_id);
        let close = serde_json::to_string(&serde_json::json!(["CLOSE", sub_id]))
            .map_err(|e| BridgeError::Transport(format!("failed to encode close: {e}")))?;
        self.broadcast(&close).await;
        Ok(events)
    }

    async fn subscribe(
        &self,
        kind: EventKind,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), BridgeError> {
        let sub_id = format!("live-{}", Uuid::new_v4());
        let filter = EventFilter::kind(kind).since(Utc::now().timestamp());
        let frame = serde_json::to_string(&serde_json::json!(["REQ", sub_id, filter]))
            .map_err(|e| BridgeError::Transport(format!("failed to encode filter: {e}")))?;

        self.registry
            .live
            .lock()
            .unwrap()
            .insert(sub_id.clone(), handler);

        if self.broadcast(&frame).await == 0 {
            self.registry.live.lock().unwrap().remove(&sub_id);
            return Err(BridgeError::Transport(
                "no relay accepted the subscription".to_string(),
            ));
        }
        debug!(subscription = %sub_id, kind = %kind, "live subscription open");
        Ok(())
    }

    async fn shutdown(&self) {
        let live_ids: Vec<String> = self.registry.live.lock().unwrap().keys().cloned().collect();
        for sub_id in live_ids {
            if let Ok(close) = serde_json::to_string(&serde_json::json!(["CLOSE", sub_id])) {
                self.broadcast(&close).await;
            }
        }
        self.registry.live.lock().unwrap().clear();
        self.registry.queries.lock().unwrap().clear();

        for (url, sink) in self.sinks.lock().unwrap().drain(..) {
            let sink = sink.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.lock().await.send(Message::Close(None)).await {
                    debug!(relay = %url, reason = %e, "close frame failed");
                }
            });
        }
        for reader in self.readers.lock().unwrap().drain(..) {
            reader.abort();
        }
    }
}

/// Per-relay read loop: parses wire frames and routes events to the
/// matching query or live subscription.
async fn run_reader(url: String, mut source: WsSource, registry: Arc<Registry>) {
    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                warn!(relay = %url, reason = %e, "websocket read error");
                break;
            }
        };
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame: Vec<Value> = match serde_json::from_str(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(relay = %url, reason = %e, "unparseable frame");
                continue;
            }
        };
        match frame.first().and_then(Value::as_str) {
            Some("EVENT") => route_event(&url, &frame, &registry),
            Some("EOSE") => {
                if let Some(sub_id) = frame.get(1).and_then(Value::as_str) {
                    let mut queries = registry.queries.lock().unwrap();
                    if let Some(query) = queries.get_mut(sub_id) {
                        query.eose_remaining = query.eose_remaining.saturating_sub(1);
                        if query.eose_remaining == 0 {
                            // Dropping the sender ends collection.
                            queries.remove(sub_id);
                        }
                    }
                }
            }
            Some("OK") | Some("NOTICE") => {
                debug!(relay = %url, frame = %text.as_str(), "relay notice")
            }
            _ => {}
        }
    }
    debug!(relay = %url, "reader loop ended");
}

fn route_event(url: &str, frame: &[Value], registry: &Arc<Registry>) {
    let (Some(sub_id), Some(raw)) = (frame.get(1).and_then(Value::as_str), frame.get(2)) else {
        return;
    };
    let event: RelayEvent = match serde_json::from_value(raw.clone()) {
        Ok(event) => event,
        Err(e) => {
            debug!(relay = %url, reason = %e, "malformed event payload");
            return;
        }
    };
    if !registry.first_sighting(sub_id, event.id.as_str()) {
        return;
    }

    if let Some(query) = registry.queries.lock().unwrap().get(sub_id) {
        let _ = query.tx.send(event);
        return;
    }
    if let Some(handler) = registry.live.lock().unwrap().get(sub_id).cloned() {
        // Independent task per event: one slow handler must not hold up
        // the read loop.
        tokio::spawn(async move {
            handler.handle(event).await;
        });
    }
}
