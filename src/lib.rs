//! Shared library behind the `signal_engine` and `verifier` binaries: the
//! decision-and-verification core, usable independently of either
//! process's I/O shell.

pub mod budget;
pub mod config;
pub mod engine;
pub mod features;
pub mod gates;
pub mod market_data;
pub mod models;
pub mod notifier;
pub mod notify_events;
pub mod quality;
pub mod regime;
pub mod store;
pub mod strategy;
pub mod tracker;
