// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound request queue for the Autovia service layer.
//!
//! A single in-process priority queue that paces network calls against a
//! rate-limited backend. Callers get one awaitable result per logical
//! request; concurrent identical requests share one execution.
//!
//! See [`RequestQueue`] for the contract and [`http::ApiClient`] for the
//! JSON-over-HTTP actions the marketplace services wrap with it.

pub mod backoff;
pub mod http;
pub mod queue;
pub mod task;

pub use http::ApiClient;
pub use queue::RequestQueue;
pub use task::{EnqueueOptions, TaskPhase};
