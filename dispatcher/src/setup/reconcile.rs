use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cli::SetupCmd;
use crate::core::client::queue::{Broker, ExchangeSpec, QueueError, QueueSpec};
use crate::setup::topology::TopologySpec;
use crate::setup::TopologyError;

/// What reconcile may do to a queue whose arguments no longer match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairPolicy {
    /// Delete and recreate drifted queues that are empty.
    pub allow_repair: bool,
    /// Also delete drifted queues that still hold messages.
    pub allow_purge_non_empty: bool,
}

impl RepairPolicy {
    pub fn repair_empty() -> Self {
        Self { allow_repair: true, allow_purge_non_empty: false }
    }
}

impl From<&SetupCmd> for RepairPolicy {
    fn from(cmd: &SetupCmd) -> Self {
        Self { allow_repair: cmd.allow_repair, allow_purge_non_empty: cmd.allow_repair && cmd.allow_purge_non_empty }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    /// Deleted and recreated, with the number of messages dropped
    pub repaired: Vec<(String, u32)>,
    pub unchanged: Vec<String>,
}

impl ReconcileReport {
    /// True when the broker already matched the declared topology.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.repaired.is_empty()
    }
}

/// Converges a broker to a [`TopologySpec`].
pub struct TopologyManager {
    broker: Arc<dyn Broker>,
}

impl TopologyManager {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Declares exchanges, then per family the DLQ and its binding before the
    /// main queue that dead-letters into it, then the main binding.
    ///
    /// Conflicting exchanges are an error. Conflicting queues are handled per `policy`.
    pub async fn reconcile(&self, spec: &TopologySpec, policy: RepairPolicy) -> Result<ReconcileReport, TopologyError> {
        spec.validate()?;
        let mut report = ReconcileReport::default();

        for exchange in spec.exchanges() {
            self.declare_exchange(exchange).await?;
            debug!(exchange = %exchange.name, "Exchange declared");
        }

        for family in &spec.families {
            self.ensure_queue(&family.dlq, policy, &mut report).await?;
            self.broker.bind_queue(&family.dlq_binding).await?;

            self.ensure_queue(&family.queue, policy, &mut report).await?;
            self.broker.bind_queue(&family.binding).await?;
            info!(family = %family.family, queue = %family.queue.name, dlq = %family.dlq.name, "Queues ready");
        }

        info!(
            created = report.created.len(),
            repaired = report.repaired.len(),
            unchanged = report.unchanged.len(),
            "Topology reconciled"
        );
        Ok(report)
    }

    async fn declare_exchange(&self, exchange: &ExchangeSpec) -> Result<(), TopologyError> {
        self.broker.declare_exchange(exchange).await.map_err(|e| match e {
            QueueError::PreconditionFailed { message, .. } => {
                TopologyError::ExchangeConflict { exchange: exchange.name.clone(), reason: message }
            }
            other => other.into(),
        })
    }

    async fn ensure_queue(
        &self,
        queue: &QueueSpec,
        policy: RepairPolicy,
        report: &mut ReconcileReport,
    ) -> Result<(), TopologyError> {
        let existed = self.broker.inspect_queue(&queue.name).await?.is_some();

        let reason = match self.broker.declare_queue(queue).await {
            Ok(_) if existed => {
                report.unchanged.push(queue.name.clone());
                return Ok(());
            }
            Ok(_) => {
                info!(queue = %queue.name, "Queue created");
                report.created.push(queue.name.clone());
                return Ok(());
            }
            Err(QueueError::PreconditionFailed { message, .. }) => message,
            Err(e) => return Err(e.into()),
        };

        // Arguments drifted. Look at what is inside before touching it.
        let message_count = self.broker.inspect_queue(&queue.name).await?.map(|state| state.message_count).unwrap_or(0);
        if !policy.allow_repair {
            return Err(TopologyError::Drift { queue: queue.name.clone(), reason });
        }
        if message_count > 0 && !policy.allow_purge_non_empty {
            return Err(TopologyError::UnsafeRepair { queue: queue.name.clone(), message_count });
        }

        warn!(queue = %queue.name, message_count, %reason, "Queue arguments drifted, deleting and recreating it");
        let dropped = self.broker.delete_queue(&queue.name).await?;
        self.broker.declare_queue(queue).await?;
        report.repaired.push((queue.name.clone(), dropped));
        Ok(())
    }

    /// Checks that everything in `spec` exists with the declared arguments,
    /// without creating exchanges or queues.
    ///
    /// Drift is detected by redeclaring each exchange and queue: an identical
    /// declare is a no-op, a differing one is refused by the broker. Bindings
    /// cannot be inspected over AMQP, so they are re-asserted; binding is
    /// idempotent.
    pub async fn verify(&self, spec: &TopologySpec) -> Result<(), TopologyError> {
        spec.validate()?;

        for exchange in spec.exchanges() {
            if !self.broker.exchange_exists(&exchange.name).await? {
                return Err(TopologyError::Missing { entity: format!("exchange {}", exchange.name) });
            }
            self.declare_exchange(exchange).await?;
        }

        for family in &spec.families {
            for queue in [&family.dlq, &family.queue] {
                if self.broker.inspect_queue(&queue.name).await?.is_none() {
                    return Err(TopologyError::Missing { entity: format!("queue {}", queue.name) });
                }
                match self.broker.declare_queue(queue).await {
                    Ok(_) => {}
                    Err(QueueError::PreconditionFailed { message, .. }) => {
                        return Err(TopologyError::Drift { queue: queue.name.clone(), reason: message });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            self.broker.bind_queue(&family.dlq_binding).await?;
            self.broker.bind_queue(&family.binding).await?;
        }

        info!(namespace = %spec.namespace, families = spec.families.len(), "Topology verified");
        Ok(())
    }
}
