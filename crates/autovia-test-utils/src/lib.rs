// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Autovia integration tests.
//!
//! Provides a scriptable mock transport, a store wrapper with scripted
//! failures, and a full-stack test harness.

pub mod flaky_store;
pub mod harness;
pub mod mock_transport;

pub use flaky_store::FlakyStore;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_transport::MockTransport;
