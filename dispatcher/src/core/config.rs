use std::sync::Arc;

use tracing::info;

use crate::cli::RunCmd;
use crate::core::client::compute::http::HttpComputeEngine;
use crate::core::client::database::memory::InMemoryJobRepository;
use crate::core::client::database::mongodb::MongoJobRepository;
use crate::core::client::queue::rabbitmq::RabbitMqBroker;
use crate::core::client::{Broker, ComputeEngine, JobRepository};
use crate::setup::topology::{FamilyTopology, TopologySpec};
use crate::types::params::{ComputeParams, DatabaseParams, QueueParams, ServerParams, WorkerParams};
use crate::types::JobFamily;
use crate::DispatcherResult;

/// Everything a running dispatcher shares between the REST server and the workers.
pub struct Config {
    /// Declared broker layout, also the source of retry ceilings
    topology: TopologySpec,
    server_params: ServerParams,
    worker_params: WorkerParams,
    /// Broker client
    broker: Arc<dyn Broker>,
    /// Job record store
    database: Arc<dyn JobRepository>,
    /// Compute engine client
    compute: Arc<dyn ComputeEngine>,
}

impl Config {
    pub fn new(
        topology: TopologySpec,
        server_params: ServerParams,
        worker_params: WorkerParams,
        broker: Arc<dyn Broker>,
        database: Arc<dyn JobRepository>,
        compute: Arc<dyn ComputeEngine>,
    ) -> Self {
        Self { topology, server_params, worker_params, broker, database, compute }
    }

    /// Builds the clients named by the run command and connects them.
    pub async fn setup(run_cmd: &RunCmd) -> DispatcherResult<Self> {
        let queue_params = QueueParams::try_from(run_cmd.queue_args.clone())?;
        let database_params = DatabaseParams::try_from(run_cmd.database_args.clone())?;
        let compute_params = ComputeParams::try_from(run_cmd.compute_args.clone())?;
        let server_params = ServerParams::from(run_cmd.server_args.clone());
        let worker_params = WorkerParams::from(run_cmd);

        let broker = Self::build_broker(&queue_params).await?;
        let database = Self::build_database(&database_params).await?;
        let compute: Arc<dyn ComputeEngine> = Arc::new(HttpComputeEngine::new(&compute_params)?);

        Ok(Self::new(queue_params.topology(), server_params, worker_params, broker, database, compute))
    }

    async fn build_broker(params: &QueueParams) -> DispatcherResult<Arc<dyn Broker>> {
        Ok(Arc::new(RabbitMqBroker::connect(&params.amqp_uri).await?))
    }

    async fn build_database(params: &DatabaseParams) -> DispatcherResult<Arc<dyn JobRepository>> {
        let database: Arc<dyn JobRepository> = match params {
            DatabaseParams::MongoDb(mongo) => {
                info!(database = %mongo.database_name, "Using MongoDB job store");
                Arc::new(MongoJobRepository::new(mongo).await?)
            }
            DatabaseParams::Memory => {
                info!("Using in-memory job store, records are lost on restart");
                Arc::new(InMemoryJobRepository::new())
            }
        };
        Ok(database)
    }

    pub fn topology(&self) -> &TopologySpec {
        &self.topology
    }

    /// Topology of `family` if this dispatcher serves it.
    pub fn family(&self, family: JobFamily) -> Option<&FamilyTopology> {
        self.topology.family(family)
    }

    pub fn server_config(&self) -> &ServerParams {
        &self.server_params
    }

    pub fn worker_config(&self) -> &WorkerParams {
        &self.worker_params
    }

    pub fn broker(&self) -> &dyn Broker {
        self.broker.as_ref()
    }

    pub fn broker_handle(&self) -> Arc<dyn Broker> {
        self.broker.clone()
    }

    pub fn database(&self) -> &dyn JobRepository {
        self.database.as_ref()
    }

    pub fn compute(&self) -> &dyn ComputeEngine {
        self.compute.as_ref()
    }
}
