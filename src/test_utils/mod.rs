//! Test utilities for HTTP-level and use-case testing.
//!
//! This module provides:
//! - An in-memory payment processor that records calls and emulates idempotency keys
//! - Fixtures for webhook payloads and throwaway static directories
//! - A builder for `AppState` wired to the in-memory processor

mod processor_mocks;

pub use app_state_builder::*;
pub use fixtures::*;
pub use processor_mocks::*;
