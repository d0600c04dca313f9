// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Credential attack simulations against a limiter.

use crate::harness::generators;
use account_rate_limiter::limiter::{Decision, RateLimiter, RequestInfo};
use account_rate_limiter::store::CounterStore;
use axum::http::Method;
use std::collections::HashMap;
use std::time::Duration;

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of POST attempts
    pub total_attempts: usize,
    /// Number of unique client addresses, used round-robin
    pub unique_ips: usize,
    /// Pause between attempts
    pub interval: Duration,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_attempts: 100,
            unique_ips: 1,
            interval: Duration::ZERO,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Password guessing from a single address.
    pub fn single_ip_brute_force() -> Self {
        Self {
            total_attempts: 200,
            unique_ips: 1,
            ..Default::default()
        }
    }

    /// Credential stuffing spread over many addresses.
    pub fn distributed_stuffing() -> Self {
        Self {
            total_attempts: 500,
            unique_ips: 100,
            ..Default::default()
        }
    }

    /// One address spreading `limit` attempts evenly over each window.
    pub fn slow_drip(period: Duration, limit: u32) -> Self {
        Self {
            total_attempts: 50,
            unique_ips: 1,
            interval: period / limit,
        }
    }
}

/// Outcome tally of an attack run.
#[derive(Debug, Clone, Default)]
pub struct AttackReport {
    pub allowed: usize,
    pub limited: usize,
    pub allowed_per_ip: HashMap<String, usize>,
}

impl AttackReport {
    pub fn total(&self) -> usize {
        self.allowed + self.limited
    }

    /// Share of attempts that were rejected (0.0-1.0).
    pub fn block_rate(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.limited as f64 / self.total() as f64
        }
    }

    pub fn max_allowed_per_ip(&self) -> usize {
        self.allowed_per_ip.values().copied().max().unwrap_or(0)
    }
}

/// Replay `config` against `limiter`, sleeping on tokio's clock between attempts.
pub async fn run_attack<S: CounterStore>(
    limiter: &RateLimiter<S>,
    config: &AttackConfig,
    path: &str,
) -> AttackReport {
    let ips = generators::generate_ips(config.unique_ips);
    let mut report = AttackReport::default();

    for i in 0..config.total_attempts {
        let origin = ips[i % ips.len()].to_string();
        let request = RequestInfo::new(Method::POST, origin.clone(), path);

        match limiter.check_and_record(&request).await.unwrap() {
            Decision::Allowed => {
                report.allowed += 1;
                *report.allowed_per_ip.entry(origin).or_insert(0) += 1;
            }
            Decision::Limited(_) => report.limited += 1,
        }

        if !config.interval.is_zero() {
            tokio::time::sleep(config.interval).await;
        }
    }

    report
}
