// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Courier dispatch core
//!
//! Addressing, dispatch routing and request/reply correlation for a
//! clustered actor runtime. Every unit of computation is a process
//! identified by a hierarchical path; processes communicate exclusively
//! by asynchronous messages; and one dispatch abstraction lets a sender
//! address a local process, a process on a remote node, or a *role* (a
//! logical pool of equivalent workers spread across the cluster) without
//! knowing which it holds.
//!
//! ## What lives here
//!
//! - **Addressing**: [`ProcessId`] and [`ProcessName`], validated
//!   hierarchical identifiers, including the reserved role form.
//! - **Message taxonomy**: the closed four-category [`Message`] set with
//!   its `(MessageType, Tag)` routing key, plus the correlated
//!   [`ActorRequest`]/[`ActorResponse`] pair.
//! - **Dispatch**: the [`Dispatch`] capability trait with its local and
//!   nonexistent variants; remote resolution is the host's concern.
//! - **Role routing**: [`RoleRouter`] with the four [`RouteStrategy`]
//!   selection strategies over live cluster membership.
//! - **Ask/reply**: the [`Correlator`] engine and its [`ReplyPool`],
//!   layering request/response over the one-way transport.
//! - **Supervision policy**: declarative [`Decider`] rules selecting a
//!   [`Directive`] per fault; execution stays with the host runtime.
//!
//! The mailbox engine, cluster store and process registry are consumed
//! through the [`Inbox`], [`Membership`] and [`Resolver`] traits and are
//! implemented by the surrounding runtime.
//!

// Private modules containing the implementation
mod cluster;
mod config;
mod correlation;
mod dispatch;
mod error;
mod message;
mod path;
mod router;
mod supervision;

//
// Addressing
//

/// Hierarchical process identifier, including the reserved role form.
pub use path::ProcessId;

/// A single validated path segment.
pub use path::ProcessName;

/// Node identities are path segments.
pub use path::NodeId;

//
// Message taxonomy
//

/// Marker trait for opaque application payloads.
pub use message::Payload;

/// A routable message: one of the four closed categories.
pub use message::Message;

/// The four message categories.
pub use message::MessageType;

/// Fine-grained discriminator, partitioned by category.
pub use message::Tag;

/// Category bodies.
pub use message::{ActorSystemMessage, SystemMessage, UserControlMessage};

/// Correlated request/response pair carried by the ask protocol.
pub use message::{ActorRequest, ActorResponse};

//
// Dispatch abstraction
//

/// Capability contract every resolved dispatcher implements.
pub use dispatch::Dispatch;

/// Dispatcher over an in-process inbox.
pub use dispatch::LocalDispatch;

/// Dispatcher for a target that resolved to nothing.
pub use dispatch::NullDispatch;

/// Hook surface the mailbox engine exposes per process.
pub use dispatch::Inbox;

/// Sentinel inbox depth meaning "unknown / not applicable".
pub use dispatch::INBOX_COUNT_UNKNOWN;

//
// Cluster collaborators
//

/// Live cluster membership provider.
pub use cluster::Membership;

/// Identifier resolution, supplied by the host runtime.
pub use cluster::Resolver;

//
// Role routing
//

/// Dispatcher for a role, resolving its worker set on every call.
pub use router::RoleRouter;

/// Worker selection strategy for a role.
pub use router::RouteStrategy;

/// Shared, injectable round-robin cursor registry.
pub use router::RoundRobinCursors;

//
// Ask/reply correlation
//

/// Factory for the correlation engine.
pub use correlation::Correlator;

/// Clonable caller-side ask handle.
pub use correlation::CorrelatorRef;

/// The loop owning all correlation state.
pub use correlation::CorrelatorRunner;

/// Fixed-size reply fan-in pool and its workers.
pub use correlation::{ReplyMember, ReplyPool};

//
// Supervision policy
//

/// Failure-handling outcome selected for a faulting child.
pub use supervision::Directive;

/// Ordered fault-kind rules, first match wins.
pub use supervision::Decider;

/// Decider plus scope and rolling retry budget.
pub use supervision::SupervisorStrategy;

/// Which children a directive applies to.
pub use supervision::SupervisorScope;

//
// Errors and configuration
//

/// Error type for the dispatch core.
pub use error::Error;

/// Closed fault classification for directive selection.
pub use error::ErrorKind;

/// Tunables: reply pool size, default ask timeout.
pub use config::DispatchConfig;
