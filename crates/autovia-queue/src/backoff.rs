// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exponential backoff schedule for retried queue tasks.

use std::time::Duration;

/// Delay before retrying a task that has already failed `attempt + 1` times.
///
/// `base * 2^attempt`, saturating, and never more than `cap`.
pub fn backoff_delay(base: Duration, attempt: u32, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(31));
    base.saturating_mul(factor).min(cap)
}
