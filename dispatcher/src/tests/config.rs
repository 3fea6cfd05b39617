use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::core::client::database::memory::InMemoryJobRepository;
use crate::core::client::{ComputeEngine, JobRepository};
use crate::core::config::Config;
use crate::server::{setup_server, ServerHandle};
use crate::setup::{RepairPolicy, TopologyManager, TopologySpec};
use crate::tests::common::{InMemoryBroker, ScriptedEngine};
use crate::types::params::{ServerParams, WorkerParams};
use crate::types::JobFamily;

pub const TEST_NAMESPACE: &str = "test";
pub const DLQ_TTL_MS: u64 = 1_209_600_000;

/// Builds a [`Config`] wired to in-process collaborators.
pub struct TestConfigBuilder {
    families: Vec<JobFamily>,
    max_retries: u32,
    declare_topology: bool,
    broker: InMemoryBroker,
    database: Option<Arc<dyn JobRepository>>,
    compute: Option<Arc<dyn ComputeEngine>>,
    compute_timeout: Duration,
    concurrency: usize,
    api_server: bool,
}

pub struct TestConfigBuilderReturns {
    pub config: Arc<Config>,
    pub broker: InMemoryBroker,
    /// Set unless a custom repository was configured
    pub database: Option<Arc<InMemoryJobRepository>>,
    pub api_server_address: Option<SocketAddr>,
    pub server_handle: Option<ServerHandle>,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            families: vec![JobFamily::Spot, JobFamily::Solver],
            max_retries: 3,
            declare_topology: true,
            broker: InMemoryBroker::new(),
            database: None,
            compute: None,
            compute_timeout: Duration::from_secs(5),
            concurrency: 1,
            api_server: false,
        }
    }

    pub fn configure_families(mut self, families: &[JobFamily]) -> Self {
        self.families = families.to_vec();
        self
    }

    pub fn configure_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Leaves the broker empty instead of reconciling the topology.
    pub fn without_topology(mut self) -> Self {
        self.declare_topology = false;
        self
    }

    pub fn configure_broker(mut self, broker: InMemoryBroker) -> Self {
        self.broker = broker;
        self
    }

    pub fn configure_database(mut self, database: Arc<dyn JobRepository>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn configure_compute(mut self, compute: Arc<dyn ComputeEngine>) -> Self {
        self.compute = Some(compute);
        self
    }

    pub fn configure_compute_timeout(mut self, timeout: Duration) -> Self {
        self.compute_timeout = timeout;
        self
    }

    pub fn configure_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn configure_api_server(mut self) -> Self {
        self.api_server = true;
        self
    }

    pub fn topology(&self) -> TopologySpec {
        TopologySpec::for_namespace(TEST_NAMESPACE, &self.families, self.max_retries, DLQ_TTL_MS)
    }

    pub async fn build(self) -> TestConfigBuilderReturns {
        let topology = self.topology();
        if self.declare_topology {
            TopologyManager::new(Arc::new(self.broker.clone()))
                .reconcile(&topology, RepairPolicy::default())
                .await
                .expect("topology reconciles on an empty broker");
        }

        let (database, memory): (Arc<dyn JobRepository>, Option<Arc<InMemoryJobRepository>>) = match self.database {
            Some(database) => (database, None),
            None => {
                let memory = Arc::new(InMemoryJobRepository::new());
                (memory.clone(), Some(memory))
            }
        };
        let compute = self.compute.unwrap_or_else(|| Arc::new(ScriptedEngine::new()));

        let server_params = ServerParams {
            host: "127.0.0.1".to_string(),
            port: 0,
            enabled: self.api_server,
            recent_window: Duration::from_secs(24 * 60 * 60),
            recent_limit: 50,
            active_limit: 100,
        };
        let worker_params = WorkerParams {
            enabled: true,
            concurrency: self.concurrency,
            compute_timeout: self.compute_timeout,
            receive_wait: Duration::from_millis(50),
        };

        let config = Arc::new(Config::new(
            topology,
            server_params,
            worker_params,
            Arc::new(self.broker.clone()),
            database,
            compute,
        ));

        let (api_server_address, server_handle) = if self.api_server {
            let (address, handle) =
                setup_server(config.clone(), Arc::new(Notify::new())).await.expect("API server starts");
            (Some(address), Some(handle))
        } else {
            (None, None)
        };

        TestConfigBuilderReturns { config, broker: self.broker, database: memory, api_server_address, server_handle }
    }
}
