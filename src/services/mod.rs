//! Collaborators and process-wide services.

pub mod provider;
pub mod time_source;
pub mod tracing_setup;
