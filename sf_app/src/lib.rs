//! # sf_app
//!
//! Wiring for the `sf_fetch` binary: arguments, configuration, logging,
//! shutdown and the retry rounds around a batch.

pub mod backoff;
pub mod cli;
pub mod config_loader;
pub mod output;
pub mod rounds;
pub mod shutdown_handler;
pub mod tracing_setup;
