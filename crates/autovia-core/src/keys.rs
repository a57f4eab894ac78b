// SPDX-FileCopyrightText: 2026 Autovia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup-key normalization for email-derived identifiers.
//!
//! Conversation and presence keys are derived from customer email addresses.
//! Both storage backends must agree on the key for a given address, so the
//! normalization is applied on every read and write path and is idempotent:
//! `normalize_key(normalize_key(s)) == normalize_key(s)`.

/// Normalize a raw identity (typically an email address) into a stable lookup key.
///
/// Trims surrounding whitespace, lowercases, and substitutes every character
/// outside `[a-z0-9_-]` with `_`.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
