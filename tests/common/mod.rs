// Shared helpers for integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod tracing;
