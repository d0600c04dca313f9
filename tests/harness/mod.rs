// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the account rate limiter.
//!
//! Provides a counter store that records every call and request builders
//! for driving the router.

pub mod generators;
pub mod store;
