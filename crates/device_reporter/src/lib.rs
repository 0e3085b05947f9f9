//! device_reporter
//!
//! Ingests tab-separated device definition files dropped into a watched
//! directory, persists their devices and writes one report per unit.
//!
//! The core is [`pipeline`]: four long-lived stages joined by bounded
//! channels and stopped by a shared cancellation token. The stages reach
//! storage only through the traits in [`store`], and reports only through
//! [`report::ArtifactGenerator`].

pub mod app;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod store;

pub use error::PipelineError;
pub use pipeline::{ChannelConfig, ParseFailure, ParseOutcome, Pipeline};
