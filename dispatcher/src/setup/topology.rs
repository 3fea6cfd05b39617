use std::collections::HashSet;

use crate::core::client::queue::{BindingSpec, ExchangeSpec, ExchangeType, QueueArguments, QueueSpec};
use crate::setup::TopologyError;
use crate::types::JobFamily;

/// Exchanges, queues and bindings serving one job family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyTopology {
    pub family: JobFamily,
    pub dlq: QueueSpec,
    pub dlq_binding: BindingSpec,
    pub queue: QueueSpec,
    pub binding: BindingSpec,
}

impl FamilyTopology {
    /// Retry ceiling carried on the main queue.
    pub fn max_retries(&self) -> Option<u32> {
        self.queue.arguments.max_retries
    }
}

/// Declarative description of everything the broker must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologySpec {
    pub namespace: String,
    pub main_exchange: ExchangeSpec,
    pub dlq_exchange: ExchangeSpec,
    pub families: Vec<FamilyTopology>,
}

impl TopologySpec {
    /// Standard layout: `<namespace>.main` and `<namespace>.dlq` direct exchanges,
    /// and per family a `<family>-processing` queue dead-lettering into
    /// `<family>-processing-dlq`.
    pub fn for_namespace(namespace: &str, families: &[JobFamily], max_retries: u32, dlq_message_ttl_ms: u64) -> Self {
        let main_exchange = ExchangeSpec { name: format!("{namespace}.main"), kind: ExchangeType::Direct, durable: true };
        let dlq_exchange = ExchangeSpec { name: format!("{namespace}.dlq"), kind: ExchangeType::Direct, durable: true };

        let families = families
            .iter()
            .map(|family| {
                let dlq_name = family.dlq_name();
                let queue_name = family.queue_name();
                FamilyTopology {
                    family: *family,
                    dlq: QueueSpec {
                        name: dlq_name.clone(),
                        durable: true,
                        arguments: QueueArguments { message_ttl_ms: Some(dlq_message_ttl_ms), ..Default::default() },
                    },
                    dlq_binding: BindingSpec {
                        exchange: dlq_exchange.name.clone(),
                        queue: dlq_name.clone(),
                        routing_key: dlq_name.clone(),
                    },
                    queue: QueueSpec {
                        name: queue_name.clone(),
                        durable: true,
                        arguments: QueueArguments {
                            dead_letter_exchange: Some(dlq_exchange.name.clone()),
                            dead_letter_routing_key: Some(dlq_name),
                            max_retries: Some(max_retries),
                            message_ttl_ms: None,
                        },
                    },
                    binding: BindingSpec {
                        exchange: main_exchange.name.clone(),
                        queue: queue_name,
                        routing_key: family.routing_key(),
                    },
                }
            })
            .collect();

        Self { namespace: namespace.to_string(), main_exchange, dlq_exchange, families }
    }

    pub fn exchanges(&self) -> [&ExchangeSpec; 2] {
        [&self.main_exchange, &self.dlq_exchange]
    }

    pub fn family(&self, family: JobFamily) -> Option<&FamilyTopology> {
        self.families.iter().find(|f| f.family == family)
    }

    /// Checks the dead-letter wiring before anything is sent to the broker.
    ///
    /// A main queue whose dead-letter routing key is not its DLQ's name, or a
    /// DLQ not bound under that key, silently drops dead letters.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let invalid = |reason: String| Err(TopologyError::InvalidSpec(reason));

        if self.main_exchange.name == self.dlq_exchange.name {
            return invalid(format!("main and dead-letter exchange are both {}", self.main_exchange.name));
        }

        let mut names = HashSet::new();
        for family in &self.families {
            for queue in [&family.dlq, &family.queue] {
                if !names.insert(queue.name.as_str()) {
                    return invalid(format!("queue {} is declared twice", queue.name));
                }
            }

            let args = &family.queue.arguments;
            if args.dead_letter_exchange.as_deref() != Some(self.dlq_exchange.name.as_str()) {
                return invalid(format!(
                    "queue {} dead-letters to {:?} instead of {}",
                    family.queue.name, args.dead_letter_exchange, self.dlq_exchange.name
                ));
            }
            if args.dead_letter_routing_key.as_deref() != Some(family.dlq.name.as_str()) {
                return invalid(format!(
                    "queue {} dead-letters with routing key {:?} instead of its DLQ name {}",
                    family.queue.name, args.dead_letter_routing_key, family.dlq.name
                ));
            }
            if !matches!(args.max_retries, Some(n) if n > 0) {
                return invalid(format!("queue {} needs a positive retry ceiling", family.queue.name));
            }

            let dlq_binding = &family.dlq_binding;
            if dlq_binding.exchange != self.dlq_exchange.name
                || dlq_binding.queue != family.dlq.name
                || dlq_binding.routing_key != family.dlq.name
            {
                return invalid(format!(
                    "DLQ {} must be bound to {} under its own name",
                    family.dlq.name, self.dlq_exchange.name
                ));
            }

            if family.binding.exchange != self.main_exchange.name || family.binding.queue != family.queue.name {
                return invalid(format!("queue {} must be bound to {}", family.queue.name, self.main_exchange.name));
            }
        }
        Ok(())
    }
}
