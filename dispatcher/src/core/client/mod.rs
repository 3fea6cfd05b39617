pub mod compute;
pub mod database;
pub mod queue;

pub use compute::ComputeEngine;
pub use database::JobRepository;
pub use queue::Broker;
