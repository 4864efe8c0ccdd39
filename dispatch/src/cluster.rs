// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Cluster collaborators
//!
//! Interfaces this core consumes from the surrounding runtime. Membership
//! is read live on every routing call and never cached here; resolution is
//! total, yielding the nonexistent-target dispatcher for unknown
//! identifiers rather than failing.
//!

use crate::{Dispatch, NodeId, Payload, ProcessId, ProcessName};

use async_trait::async_trait;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Live cluster membership: node identity to the roles that node
/// advertises. Consumed as a sorted map so discovery order is
/// deterministic for a fixed membership.
#[async_trait]
pub trait Membership: Send + Sync {
    /// Reads the current membership view.
    async fn members(&self) -> BTreeMap<NodeId, BTreeSet<ProcessName>>;
}

/// Resolves an identifier to a dispatch capability.
///
/// Implementations own caching and the local/remote distinction; this core
/// supplies the role and nonexistent variants. `caller` identifies who is
/// resolving, and is carried into the nonexistent variant for diagnostics.
#[async_trait]
pub trait Resolver<P: Payload>: Send + Sync {
    /// Resolves `pid` on behalf of `caller`. Total: unknown identifiers
    /// yield a [`crate::NullDispatch`].
    async fn resolve(
        &self,
        pid: &ProcessId,
        caller: &ProcessId,
    ) -> Arc<dyn Dispatch<P>>;
}
