//! Multicast of a connection's decoded requests.
//!
//! The hub owns the read pipeline until the first subscriber attaches, then
//! starts it exactly once. Every attached subscriber has its own bounded
//! queue; the pipeline waits for room instead of dropping requests. When the
//! pipeline terminates, or the last subscriber detaches, the hub becomes inert
//! and later subscribers only see the terminal signal.

use crate::error::StreamError;
use linerpc_protocol::TimestampedRequest;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// How a request stream ended.
///
/// Transport read faults and EOF both map to `Completed`. Subscribers cannot
/// tell a peer reset from a clean close; only flood and decode failures are
/// reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Completed,
    Failed(StreamError),
}

/// Starts the pipeline feeding a hub. Called at most once.
pub(crate) type Starter = Box<dyn FnOnce(Arc<MulticastHub>) + Send>;

#[derive(Debug)]
enum Delivery {
    Request(TimestampedRequest),
    Failed(StreamError),
}

enum Phase {
    Idle,
    Running,
    Terminated(Termination),
}

struct Registry {
    phase: Phase,
    subscribers: HashMap<u64, mpsc::Sender<Delivery>>,
    next_id: u64,
}

/// Shared, lazily started, single-shot broadcast of requests.
pub(crate) struct MulticastHub {
    connection_id: String,
    registry: Mutex<Registry>,
    starter: Mutex<Option<Starter>>,
    stop: watch::Sender<bool>,
    capacity: usize,
}

impl MulticastHub {
    pub(crate) fn new(
        connection_id: impl Into<String>,
        starter: Starter,
        stop: watch::Sender<bool>,
        capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            connection_id: connection_id.into(),
            registry: Mutex::new(Registry {
                phase: Phase::Idle,
                subscribers: HashMap::new(),
                next_id: 0,
            }),
            starter: Mutex::new(Some(starter)),
            stop,
            capacity: capacity.max(1),
        })
    }

    /// Attaches a subscriber, starting the pipeline on first use.
    pub(crate) fn subscribe(self: &Arc<Self>) -> Subscription {
        let (subscription, starter) = {
            let mut registry = self.registry.lock();
            if let Phase::Terminated(termination) = &registry.phase {
                return Subscription::terminated(termination.clone());
            }

            let (tx, rx) = mpsc::channel(self.capacity);
            let id = registry.next_id;
            registry.next_id += 1;
            registry.subscribers.insert(id, tx);

            let starter = if matches!(registry.phase, Phase::Idle) {
                registry.phase = Phase::Running;
                self.starter.lock().take()
            } else {
                None
            };

            let subscription = Subscription {
                attachment: Some((id, Arc::clone(self))),
                rx: Some(rx),
                terminal: None,
            };
            (subscription, starter)
        };

        if let Some(start) = starter {
            tracing::debug!("[{}] First subscriber, starting reader", self.connection_id);
            start(Arc::clone(self));
        }
        subscription
    }

    /// Delivers a request to every attached subscriber, in order.
    pub(crate) async fn publish(&self, request: TimestampedRequest) {
        let targets: Vec<mpsc::Sender<Delivery>> =
            self.registry.lock().subscribers.values().cloned().collect();

        for tx in targets {
            // A closed queue means that subscriber is detaching.
            let _ = tx.send(Delivery::Request(request.clone())).await;
        }
    }

    /// Records the pipeline's terminal outcome and releases subscribers.
    ///
    /// No-op if the hub already terminated (e.g. it was cancelled).
    pub(crate) async fn finish(&self, termination: Termination) {
        let targets = {
            let mut registry = self.registry.lock();
            if matches!(registry.phase, Phase::Terminated(_)) {
                return;
            }
            registry.phase = Phase::Terminated(termination.clone());
            std::mem::take(&mut registry.subscribers)
        };

        if let Termination::Failed(err) = termination {
            for tx in targets.into_values() {
                let _ = tx.send(Delivery::Failed(err.clone())).await;
            }
        }
    }

    /// Terminates the hub from outside the pipeline and signals it to stop.
    pub(crate) fn cancel(&self) {
        let pending = {
            let mut registry = self.registry.lock();
            if !matches!(registry.phase, Phase::Terminated(_)) {
                registry.phase = Phase::Terminated(Termination::Completed);
            }
            registry.subscribers.clear();
            self.starter.lock().take()
        };
        // Never started: dropping the starter drops the read half with it.
        drop(pending);
        self.stop.send_replace(true);
    }

    fn detach(&self, id: u64) {
        let mut registry = self.registry.lock();
        if registry.subscribers.remove(&id).is_none() {
            return;
        }
        if registry.subscribers.is_empty() && matches!(registry.phase, Phase::Running) {
            registry.phase = Phase::Terminated(Termination::Completed);
            drop(registry);
            tracing::debug!(
                "[{}] Last subscriber detached, stopping reader",
                self.connection_id
            );
            self.stop.send_replace(true);
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.registry.lock().subscribers.len()
    }

    pub(crate) fn termination(&self) -> Option<Termination> {
        match &self.registry.lock().phase {
            Phase::Terminated(termination) => Some(termination.clone()),
            _ => None,
        }
    }
}

/// A live view of a connection's request stream.
///
/// Dropping the last attached subscription stops the reader and closes the
/// transport.
pub struct Subscription {
    attachment: Option<(u64, Arc<MulticastHub>)>,
    rx: Option<mpsc::Receiver<Delivery>>,
    terminal: Option<StreamError>,
}

impl Subscription {
    fn terminated(termination: Termination) -> Self {
        Self {
            attachment: None,
            rx: None,
            terminal: match termination {
                Termination::Completed => None,
                Termination::Failed(err) => Some(err),
            },
        }
    }

    /// Receives the next request.
    ///
    /// Returns `Some(Err(_))` once if the stream failed, then `None` forever.
    /// A clean end of stream yields `None` directly.
    pub async fn recv(&mut self) -> Option<Result<TimestampedRequest, StreamError>> {
        if let Some(err) = self.terminal.take() {
            return Some(Err(err));
        }

        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Some(Delivery::Request(request)) => Some(Ok(request)),
            Some(Delivery::Failed(err)) => {
                self.rx = None;
                Some(Err(err))
            }
            None => {
                self.rx = None;
                None
            }
        }
    }

    /// Returns false for subscriptions taken after the stream terminated.
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some((id, hub)) = self.attachment.take() {
            hub.detach(id);
        }
    }
}
