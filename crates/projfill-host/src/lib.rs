//! Orchestrates search, fill, name checks and submission, and exposes them
//! over HTTP.

pub mod api;
pub mod pipeline;

pub use api::{router, serve};
pub use pipeline::{Pipeline, PipelineError};
