//! Shared test utilities for recompletion integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring an on-disk plugin database to an in-memory host
//! - `CourseConfigBuilder` for writing course configurations fluently

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
