use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker refused a declare because the entity exists with other arguments.
    #[error("Precondition failed for {entity}: {message}")]
    PreconditionFailed { entity: String, message: String },

    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    #[error("Exchange not found: {0}")]
    ExchangeNotFound(String),

    #[error("Message to exchange {exchange} with routing key {routing_key} was not routed to any queue")]
    Unroutable { exchange: String, routing_key: String },

    #[error("Broker did not confirm publish to {exchange} with routing key {routing_key}")]
    PublishNotConfirmed { exchange: String, routing_key: String },

    #[error("Failed to acknowledge message: {0}")]
    AckError(String),

    #[error("Broker connection error: {0}")]
    ConnectionError(String),

    #[error("AMQP error: {0}")]
    AmqpError(#[from] lapin::Error),
}
