use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::core::client::queue::{
    BindingSpec, Broker, ExchangeSpec, HeaderValue, InboundMessage, MessageAcker, OutboundMessage, QueueError,
    QueueSpec, QueueState, Subscription,
};

/// A message sitting in an in-memory queue.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, HeaderValue>,
    pub routing_key: String,
    pub redelivered: bool,
}

#[derive(Default)]
struct QueueEntry {
    spec: Option<QueueSpec>,
    ready: VecDeque<StoredMessage>,
    unacked: HashMap<u64, StoredMessage>,
    consumers: u32,
}

#[derive(Default)]
struct BrokerState {
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueEntry>,
    bindings: Vec<BindingSpec>,
    mutations: Vec<String>,
}

impl BrokerState {
    /// Direct exchange routing: exact routing key match.
    fn route(&mut self, exchange: &str, message: StoredMessage) -> usize {
        let targets: Vec<String> = self
            .bindings
            .iter()
            .filter(|b| b.exchange == exchange && b.routing_key == message.routing_key)
            .map(|b| b.queue.clone())
            .collect();
        for queue in &targets {
            if let Some(entry) = self.queues.get_mut(queue) {
                entry.ready.push_back(message.clone());
            }
        }
        targets.len()
    }
}

/// In-process stand-in for RabbitMQ.
///
/// Reproduces what the dispatcher relies on: exact routing on direct
/// exchanges, `PRECONDITION_FAILED` on conflicting redeclares, mandatory
/// publishes failing when unroutable, and dead-lettering on `reject(false)`.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
    notify: Arc<Notify>,
    fail_next_publish: Arc<AtomicBool>,
    next_tag: Arc<AtomicU64>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Topology changes applied so far, in order. Identical redeclares are not recorded.
    pub fn mutations(&self) -> Vec<String> {
        self.lock().mutations.clone()
    }

    /// Messages ready for delivery in `queue`.
    pub fn messages(&self, queue: &str) -> Vec<StoredMessage> {
        self.lock().queues.get(queue).map(|q| q.ready.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn depth(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map(|q| q.ready.len()).unwrap_or(0)
    }

    pub fn unacked(&self, queue: &str) -> usize {
        self.lock().queues.get(queue).map(|q| q.unacked.len()).unwrap_or(0)
    }

    pub fn queue_spec(&self, queue: &str) -> Option<QueueSpec> {
        self.lock().queues.get(queue).and_then(|q| q.spec.clone())
    }

    /// Makes the next publish fail as if the connection dropped.
    pub fn fail_next_publish(&self) {
        self.fail_next_publish.store(true, Ordering::SeqCst);
    }

    /// Puts a raw message straight into `queue`, bypassing exchanges.
    pub fn inject(&self, queue: &str, body: Vec<u8>, headers: BTreeMap<String, HeaderValue>) {
        let mut state = self.lock();
        if let Some(entry) = state.queues.get_mut(queue) {
            entry.ready.push_back(StoredMessage { body, headers, routing_key: queue.to_string(), redelivered: false });
        }
        drop(state);
        self.notify.notify_waiters();
    }

    fn settle(&self, queue: &str, tag: u64, requeue: Option<bool>) -> Result<(), QueueError> {
        let mut state = self.lock();
        let entry = state.queues.get_mut(queue).ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;
        let mut message =
            entry.unacked.remove(&tag).ok_or_else(|| QueueError::AckError(format!("unknown delivery tag {tag}")))?;

        match requeue {
            None => {}
            Some(true) => {
                message.redelivered = true;
                entry.ready.push_front(message);
            }
            Some(false) => {
                let arguments = entry.spec.as_ref().map(|spec| spec.arguments.clone()).unwrap_or_default();
                if let Some(exchange) = arguments.dead_letter_exchange {
                    message.routing_key = arguments.dead_letter_routing_key.unwrap_or(message.routing_key);
                    message.redelivered = false;
                    message.headers.insert("x-first-death-queue".to_string(), HeaderValue::Text(queue.to_string()));
                    state.route(&exchange, message);
                }
            }
        }
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> Result<(), QueueError> {
        let mut state = self.lock();
        match state.exchanges.get(&exchange.name) {
            Some(existing) if existing == exchange => Ok(()),
            Some(existing) => Err(QueueError::PreconditionFailed {
                entity: exchange.name.clone(),
                message: format!("inequivalent arg 'type' or 'durable', current is {:?}", existing),
            }),
            None => {
                state.exchanges.insert(exchange.name.clone(), exchange.clone());
                state.mutations.push(format!("declare exchange {}", exchange.name));
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, queue: &QueueSpec) -> Result<QueueState, QueueError> {
        let mut state = self.lock();
        let created = !state.queues.contains_key(&queue.name);
        let entry = state.queues.entry(queue.name.clone()).or_default();
        match &entry.spec {
            Some(existing) if existing != queue => {
                return Err(QueueError::PreconditionFailed {
                    entity: queue.name.clone(),
                    message: format!("inequivalent arguments for queue '{}'", queue.name),
                });
            }
            Some(_) => {}
            None => entry.spec = Some(queue.clone()),
        }
        let queue_state = QueueState {
            name: queue.name.clone(),
            message_count: entry.ready.len() as u32,
            consumer_count: entry.consumers,
        };
        if created {
            state.mutations.push(format!("declare queue {}", queue.name));
        }
        Ok(queue_state)
    }

    async fn inspect_queue(&self, name: &str) -> Result<Option<QueueState>, QueueError> {
        Ok(self.lock().queues.get(name).map(|entry| QueueState {
            name: name.to_string(),
            message_count: entry.ready.len() as u32,
            consumer_count: entry.consumers,
        }))
    }

    async fn exchange_exists(&self, name: &str) -> Result<bool, QueueError> {
        Ok(self.lock().exchanges.contains_key(name))
    }

    async fn delete_queue(&self, name: &str) -> Result<u32, QueueError> {
        let mut state = self.lock();
        let entry = state.queues.remove(name).ok_or_else(|| QueueError::QueueNotFound(name.to_string()))?;
        state.bindings.retain(|b| b.queue != name);
        state.mutations.push(format!("delete queue {name}"));
        Ok(entry.ready.len() as u32)
    }

    async fn bind_queue(&self, binding: &BindingSpec) -> Result<(), QueueError> {
        let mut state = self.lock();
        if !state.exchanges.contains_key(&binding.exchange) {
            return Err(QueueError::ExchangeNotFound(binding.exchange.clone()));
        }
        if !state.queues.contains_key(&binding.queue) {
            return Err(QueueError::QueueNotFound(binding.queue.clone()));
        }
        if !state.bindings.contains(binding) {
            state.bindings.push(binding.clone());
            state.mutations.push(format!("bind {} -> {} ({})", binding.exchange, binding.queue, binding.routing_key));
        }
        Ok(())
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), QueueError> {
        if self.fail_next_publish.swap(false, Ordering::SeqCst) {
            return Err(QueueError::ConnectionError("connection reset by peer".to_string()));
        }

        let mut state = self.lock();
        if !state.exchanges.contains_key(&message.exchange) {
            return Err(QueueError::ExchangeNotFound(message.exchange));
        }
        let stored = StoredMessage {
            body: message.body,
            headers: message.headers,
            routing_key: message.routing_key.clone(),
            redelivered: false,
        };
        if state.route(&message.exchange, stored) == 0 {
            return Err(QueueError::Unroutable { exchange: message.exchange, routing_key: message.routing_key });
        }
        drop(state);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>, QueueError> {
        let mut state = self.lock();
        let entry = state.queues.get_mut(queue).ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;
        entry.consumers += 1;
        Ok(Box::new(InMemorySubscription { broker: self.clone(), queue: queue.to_string() }))
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

pub struct InMemorySubscription {
    broker: InMemoryBroker,
    queue: String,
}

impl InMemorySubscription {
    fn try_take(&self) -> Result<Option<InboundMessage>, QueueError> {
        let mut state = self.broker.lock();
        let entry =
            state.queues.get_mut(&self.queue).ok_or_else(|| QueueError::QueueNotFound(self.queue.clone()))?;
        let Some(message) = entry.ready.pop_front() else { return Ok(None) };

        let tag = self.broker.next_tag.fetch_add(1, Ordering::SeqCst);
        entry.unacked.insert(tag, message.clone());
        Ok(Some(InboundMessage {
            body: message.body,
            headers: message.headers,
            routing_key: message.routing_key,
            redelivered: message.redelivered,
            acker: Box::new(InMemoryAcker { broker: self.broker.clone(), queue: self.queue.clone(), tag }),
        }))
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next_message(&mut self, wait: Duration) -> Result<Option<InboundMessage>, QueueError> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let notified = self.broker.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_take()? {
                return Ok(Some(message));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        if let Some(entry) = self.broker.lock().queues.get_mut(&self.queue) {
            entry.consumers = entry.consumers.saturating_sub(1);
        }
    }
}

struct InMemoryAcker {
    broker: InMemoryBroker,
    queue: String,
    tag: u64,
}

#[async_trait]
impl MessageAcker for InMemoryAcker {
    async fn ack(&self) -> Result<(), QueueError> {
        self.broker.settle(&self.queue, self.tag, None)
    }

    async fn reject(&self, requeue: bool) -> Result<(), QueueError> {
        self.broker.settle(&self.queue, self.tag, Some(requeue))
    }
}
