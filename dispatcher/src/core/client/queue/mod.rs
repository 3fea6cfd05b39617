pub mod error;
pub mod rabbitmq;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
pub use error::QueueError;

use crate::types::queue::RETRY_COUNT_HEADER;

pub const ARG_DEAD_LETTER_EXCHANGE: &str = "x-dead-letter-exchange";
pub const ARG_DEAD_LETTER_ROUTING_KEY: &str = "x-dead-letter-routing-key";
pub const ARG_MAX_RETRIES: &str = "x-max-retries";
pub const ARG_MESSAGE_TTL: &str = "x-message-ttl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ExchangeType {
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeSpec {
    pub name: String,
    pub kind: ExchangeType,
    pub durable: bool,
}

/// Declared arguments of a queue. Unset fields are not sent to the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueArguments {
    pub dead_letter_exchange: Option<String>,
    pub dead_letter_routing_key: Option<String>,
    /// Advisory only: the broker stores it, workers enforce it.
    pub max_retries: Option<u32>,
    pub message_ttl_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    Text(String),
    Int(i64),
}

impl QueueArguments {
    pub fn entries(&self) -> Vec<(&'static str, ArgumentValue)> {
        let mut entries = Vec::new();
        if let Some(exchange) = &self.dead_letter_exchange {
            entries.push((ARG_DEAD_LETTER_EXCHANGE, ArgumentValue::Text(exchange.clone())));
        }
        if let Some(routing_key) = &self.dead_letter_routing_key {
            entries.push((ARG_DEAD_LETTER_ROUTING_KEY, ArgumentValue::Text(routing_key.clone())));
        }
        if let Some(max_retries) = self.max_retries {
            entries.push((ARG_MAX_RETRIES, ArgumentValue::Int(i64::from(max_retries))));
        }
        if let Some(ttl) = self.message_ttl_ms {
            entries.push((ARG_MESSAGE_TTL, ArgumentValue::Int(ttl.min(i64::MAX as u64) as i64)));
        }
        entries
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub arguments: QueueArguments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingSpec {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
}

/// What a passive declare reports about an existing queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    pub name: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, HeaderValue>,
    /// delivery mode 2
    pub persistent: bool,
}

impl OutboundMessage {
    pub fn persistent(exchange: impl Into<String>, routing_key: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body,
            headers: BTreeMap::new(),
            persistent: true,
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.headers.insert(RETRY_COUNT_HEADER.to_string(), HeaderValue::Int(i64::from(retry_count)));
        self
    }
}

/// Settles a delivery with the broker.
#[async_trait]
pub trait MessageAcker: Send + Sync {
    async fn ack(&self) -> Result<(), QueueError>;
    /// With `requeue = false` the broker dead-letters the message if the queue
    /// has a dead-letter exchange configured.
    async fn reject(&self, requeue: bool) -> Result<(), QueueError>;
}

pub struct InboundMessage {
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, HeaderValue>,
    pub routing_key: String,
    pub redelivered: bool,
    pub acker: Box<dyn MessageAcker>,
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("routing_key", &self.routing_key)
            .field("headers", &self.headers)
            .field("redelivered", &self.redelivered)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl InboundMessage {
    /// Retries already spent on this message. Missing or garbled headers count as zero.
    pub fn retry_count(&self) -> u32 {
        match self.headers.get(RETRY_COUNT_HEADER) {
            Some(HeaderValue::Int(n)) => u32::try_from(*n).unwrap_or(if *n < 0 { 0 } else { u32::MAX }),
            Some(HeaderValue::Text(s)) => s.trim().parse().unwrap_or(0),
            None => 0,
        }
    }

    pub async fn ack(&self) -> Result<(), QueueError> {
        self.acker.ack().await
    }

    pub async fn reject(&self, requeue: bool) -> Result<(), QueueError> {
        self.acker.reject(requeue).await
    }
}

/// A consumer attached to one queue, receiving one unacknowledged message at a time.
#[async_trait]
pub trait Subscription: Send {
    /// Waits up to `wait` for the next delivery.
    async fn next_message(&mut self, wait: Duration) -> Result<Option<InboundMessage>, QueueError>;
}

/// Trait defining the broker operations the dispatcher needs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broker: Send + Sync {
    /// Declares an exchange. Redeclaring an identical exchange is a no-op; a
    /// conflicting one fails with [`QueueError::PreconditionFailed`].
    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> Result<(), QueueError>;

    /// Declares a queue. Same idempotency rules as exchanges.
    async fn declare_queue(&self, queue: &QueueSpec) -> Result<QueueState, QueueError>;

    /// Passive declare. `None` if the queue does not exist.
    async fn inspect_queue(&self, name: &str) -> Result<Option<QueueState>, QueueError>;

    /// Passive declare of an exchange.
    async fn exchange_exists(&self, name: &str) -> Result<bool, QueueError>;

    /// Deletes a queue and returns how many messages it held.
    async fn delete_queue(&self, name: &str) -> Result<u32, QueueError>;

    async fn bind_queue(&self, binding: &BindingSpec) -> Result<(), QueueError>;

    /// Publishes and waits for the broker's confirm. Unroutable messages are an error.
    async fn publish(&self, message: OutboundMessage) -> Result<(), QueueError>;

    async fn subscribe(&self, queue: &str) -> Result<Box<dyn Subscription>, QueueError>;

    async fn health_check(&self) -> Result<(), QueueError>;
}
