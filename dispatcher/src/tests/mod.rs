pub mod common;
pub mod config;

mod producer;
