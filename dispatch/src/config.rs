// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Dispatch core configuration.
//!

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Default number of reply fan-in workers.
const DEFAULT_REPLY_POOL_SIZE: usize = 20;

/// Default operation timeout applied by `ask_with_default_timeout`.
const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for the dispatch core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Size of the reply fan-in pool.
    pub reply_pool_size: usize,
    /// Default operation timeout for caller-side ask waits.
    pub ask_timeout: Duration,
}

impl DispatchConfig {
    /// Replaces the reply pool size.
    pub fn with_reply_pool_size(mut self, size: usize) -> Self {
        self.reply_pool_size = size;
        self
    }

    /// Replaces the default ask timeout.
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            reply_pool_size: DEFAULT_REPLY_POOL_SIZE,
            ask_timeout: DEFAULT_ASK_TIMEOUT,
        }
    }
}
