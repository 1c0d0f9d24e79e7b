//! Shared test utilities for shotflow integration tests.
//!
//! This module provides:
//! - Scripted fakes for the provider, charging and storage collaborators
//! - `TestHarness` wiring them into an `Orchestrator` over in-memory SQLite

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::{HarnessBuilder, TestHarness};
