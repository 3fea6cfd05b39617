pub mod cli;
pub mod core;
pub mod error;
pub mod server;
pub mod setup;
pub mod types;
pub mod utils;
pub mod worker;

#[cfg(test)]
pub mod tests;

pub use error::{DispatcherError, DispatcherResult};
