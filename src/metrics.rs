// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for limiter decisions and account activity.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Outcome label for a POST attempt decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allowed,
    Limited,
}

impl Outcome {
    fn as_label(self) -> &'static str {
        match self {
            Self::Allowed => "allowed",
            Self::Limited => "limited",
        }
    }
}

/// Metric handles registered on a private registry. Clones share counters.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    decisions: IntCounterVec,
    registrations: IntCounter,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let decisions = IntCounterVec::new(
            Opts::new(
                "rate_limit_decisions_total",
                "POST attempts seen by the rate limiter, by endpoint key and outcome",
            ),
            &["key", "outcome"],
        )?;
        registry.register(Box::new(decisions.clone()))?;

        let registrations = IntCounter::new(
            "accounts_registered_total",
            "Accounts created through the registration endpoint",
        )?;
        registry.register(Box::new(registrations.clone()))?;

        Ok(Self {
            registry,
            decisions,
            registrations,
        })
    }

    pub fn record_decision(&self, key: &str, outcome: Outcome) {
        self.decisions
            .with_label_values(&[key, outcome.as_label()])
            .inc();
    }

    pub fn record_registration(&self) {
        self.registrations.inc();
    }

    /// Current count for a `(key, outcome)` pair.
    pub fn decisions(&self, key: &str, outcome: Outcome) -> u64 {
        self.decisions
            .with_label_values(&[key, outcome.as_label()])
            .get()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
