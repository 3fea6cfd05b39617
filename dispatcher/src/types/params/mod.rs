pub mod compute;
pub mod database;
pub mod queue;
pub mod server;
pub mod watch;
pub mod worker;

pub use compute::ComputeParams;
pub use database::{DatabaseParams, MongoDbParams};
pub use queue::QueueParams;
pub use server::ServerParams;
pub use watch::WatchParams;
pub use worker::WorkerParams;
