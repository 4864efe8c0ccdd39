// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use crate::{ProcessId, ProcessName};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the dispatch core.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// Dispatch to a process that resolves to no live process and no
    /// persisted registration. Carries the unresolved target and the
    /// identity of the caller that attempted the resolution.
    #[error("Process {path} does not exist (requested by {caller}).")]
    AddressNotFound {
        /// The unresolved target.
        path: ProcessId,
        /// The caller that attempted the dispatch.
        caller: ProcessId,
    },
    /// A role resolved to zero workers. Treated identically to
    /// `AddressNotFound` by callers.
    #[error("Role '{0}' has no workers on any cluster member.")]
    EmptyRole(ProcessName),
    /// A path segment failed validation while parsing an address.
    #[error("Invalid path segment: '{0}'.")]
    InvalidSegment(String),
    /// An error occurred while handing a message to an inbox.
    #[error("An error occurred while sending a message: {0}.")]
    Send(String),
    /// A caller-side ask wait gave up before the response arrived.
    #[error("Ask to {destination} timed out.")]
    AskTimeout {
        /// The destination that never answered in time.
        destination: ProcessId,
    },
    /// A component that owns a message loop is no longer running.
    #[error("{0} is closed.")]
    Closed(String),
}

impl Error {
    /// Classifies this error for supervision directive selection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AddressNotFound { .. } => ErrorKind::AddressNotFound,
            Error::EmptyRole(_) => ErrorKind::EmptyRole,
            Error::InvalidSegment(_) => ErrorKind::InvalidSegment,
            Error::Send(_) => ErrorKind::Send,
            Error::AskTimeout { .. } => ErrorKind::AskTimeout,
            Error::Closed(_) => ErrorKind::Closed,
        }
    }
}

/// Closed fault classification. Supervision rules match on these kinds
/// rather than inspecting error payloads, so the rule set stays total and
/// data-driven.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ErrorKind {
    /// A dispatch target could not be resolved.
    AddressNotFound,
    /// A role had no workers.
    EmptyRole,
    /// An address failed to parse.
    InvalidSegment,
    /// A message hand-off failed.
    Send,
    /// An ask wait timed out.
    AskTimeout,
    /// A message loop was already shut down.
    Closed,
}
