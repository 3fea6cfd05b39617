use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::cli::SetupCmd;
use crate::core::client::queue::rabbitmq::RabbitMqBroker;
use crate::core::client::queue::QueueError;
use crate::types::params::QueueParams;
use crate::DispatcherResult;

pub mod reconcile;
pub mod topology;

pub use reconcile::{ReconcileReport, RepairPolicy, TopologyManager};
pub use topology::TopologySpec;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Invalid topology: {0}")]
    InvalidSpec(String),

    #[error("Exchange {exchange} exists with a different configuration: {reason}")]
    ExchangeConflict { exchange: String, reason: String },

    /// A queue exists with other arguments and repair is not allowed.
    #[error("Queue {queue} exists with different arguments ({reason}); rerun setup with --allow-repair")]
    Drift { queue: String, reason: String },

    #[error("Queue {queue} needs to be recreated but holds {message_count} messages; drain it or pass --allow-purge-non-empty")]
    UnsafeRepair { queue: String, message_count: u32 },

    #[error("Missing {entity}; run `dispatcher setup` first")]
    Missing { entity: String },

    #[error("Broker error: {0}")]
    Broker(#[from] QueueError),
}

/// Setup function that declares the broker topology
pub async fn setup(setup_cmd: &SetupCmd) -> DispatcherResult<ReconcileReport> {
    let queue_params = QueueParams::try_from(setup_cmd.queue_args.clone())?;
    let policy = RepairPolicy::from(setup_cmd);
    debug!("Queue Params: {:?}", queue_params);
    debug!("Repair policy: {:?}", policy);

    info!("Setting up broker topology for dispatcher...");
    let broker = Arc::new(RabbitMqBroker::connect(&queue_params.amqp_uri).await?);
    let report = TopologyManager::new(broker).reconcile(&queue_params.topology(), policy).await?;

    for (queue, dropped) in &report.repaired {
        info!(queue, dropped, "Queue recreated");
    }
    if report.is_noop() {
        info!("Broker already matched the declared topology");
    }
    Ok(report)
}
