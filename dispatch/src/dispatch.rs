// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Dispatch abstraction
//!
//! The `dispatch` module provides the capability contract every concrete
//! dispatcher implements. A dispatcher is a cheap, per-call resolved handle
//! to a target process: local, remote, a role router, or the nonexistent
//! variant. Callers address all of them through the same interface without
//! knowing which they hold.
//!

use crate::{Error, Message, Payload, ProcessId, ProcessName, Tag};

use async_trait::async_trait;

use tracing::debug;

use std::collections::BTreeMap;
use std::sync::Arc;

/// Sentinel inbox depth meaning "unknown / not applicable". Least-busy
/// routing discards workers reporting it; broadcast aggregation counts it
/// as zero.
pub const INBOX_COUNT_UNKNOWN: i64 = -1;

/// Capability contract for dispatching to one resolved target.
///
/// Sends never block on the target's processing, only on the synchronous
/// hand-off to its inbox. `ask` is still one-way: it tags the message as a
/// request so the inbox may prioritize it, but waiting for the correlated
/// response is the correlation engine's job.
#[async_trait]
pub trait Dispatch<P: Payload>: Send + Sync {
    /// The identifier this dispatcher resolves to.
    fn path(&self) -> &ProcessId;

    /// Enqueues a one-way message on the target's inbox.
    async fn tell(
        &self,
        message: Message<P>,
        sender: &ProcessId,
        tag: Tag,
    ) -> Result<(), Error>;

    /// Enqueues a one-way message tagged as a request, so the target's
    /// inbox may treat it with request priority.
    async fn ask(
        &self,
        message: Message<P>,
        sender: &ProcessId,
    ) -> Result<(), Error>;

    /// Fans the message out to all current subscribers of the target's
    /// publish stream.
    async fn publish(&self, message: Message<P>) -> Result<(), Error>;

    /// Snapshot of the target's children, child name to identifier.
    async fn children(
        &self,
    ) -> Result<BTreeMap<ProcessName, ProcessId>, Error>;

    /// Current queued-message count, or [`INBOX_COUNT_UNKNOWN`] when the
    /// target does not track one.
    async fn inbox_count(&self) -> Result<i64, Error>;

    /// Subscribes `watcher` to a termination notification for the target.
    async fn watch(&self, watcher: &ProcessId) -> Result<(), Error>;

    /// Removes `watcher`'s termination subscription. Idempotent: never
    /// fails because the target is already gone.
    async fn unwatch(&self, watcher: &ProcessId) -> Result<(), Error>;

    /// Terminates the target abruptly. Fire-and-forget and idempotent.
    async fn kill(&self) -> Result<(), Error>;

    /// Terminates the target gracefully, draining queued work first.
    /// Fire-and-forget and idempotent.
    async fn shutdown(&self) -> Result<(), Error>;
}

/// Hook surface the mailbox execution engine exposes for one process.
///
/// This is the out-of-scope collaborator behind [`LocalDispatch`]: an
/// implementation accepts any message plus `(sender, tag)` metadata and
/// never synchronously rejects beyond transport-level backpressure.
#[async_trait]
pub trait Inbox<P: Payload>: Send + Sync {
    /// Hands a message off to the process's queue.
    async fn deliver(
        &self,
        message: Message<P>,
        sender: &ProcessId,
        tag: Tag,
    ) -> Result<(), Error>;

    /// Fans a message out to the process's publish subscribers.
    async fn publish(&self, message: Message<P>) -> Result<(), Error>;

    /// Snapshot of the process's children.
    async fn children(&self) -> BTreeMap<ProcessName, ProcessId>;

    /// Queued-message count, or [`INBOX_COUNT_UNKNOWN`] when untracked.
    async fn depth(&self) -> i64;

    /// Registers a termination watcher.
    async fn watch(&self, watcher: &ProcessId) -> Result<(), Error>;

    /// Removes a termination watcher.
    async fn unwatch(&self, watcher: &ProcessId) -> Result<(), Error>;

    /// Stops the process abruptly.
    async fn kill(&self) -> Result<(), Error>;

    /// Stops the process after draining queued work.
    async fn shutdown(&self) -> Result<(), Error>;
}

/// Dispatcher for a target that resolved to an in-process inbox.
pub struct LocalDispatch<P: Payload> {
    /// The resolved target.
    path: ProcessId,
    /// The mailbox engine's hook surface for the target.
    inbox: Arc<dyn Inbox<P>>,
}

impl<P: Payload> LocalDispatch<P> {
    /// Creates a dispatcher over the target's inbox.
    pub fn new(path: ProcessId, inbox: Arc<dyn Inbox<P>>) -> Self {
        Self { path, inbox }
    }
}

#[async_trait]
impl<P: Payload> Dispatch<P> for LocalDispatch<P> {
    fn path(&self) -> &ProcessId {
        &self.path
    }

    async fn tell(
        &self,
        message: Message<P>,
        sender: &ProcessId,
        tag: Tag,
    ) -> Result<(), Error> {
        debug!("Telling {:?} to {}.", tag, self.path);
        self.inbox.deliver(message, sender, tag).await
    }

    async fn ask(
        &self,
        message: Message<P>,
        sender: &ProcessId,
    ) -> Result<(), Error> {
        debug!("Asking {} with request priority.", self.path);
        self.inbox.deliver(message, sender, Tag::UserAsk).await
    }

    async fn publish(&self, message: Message<P>) -> Result<(), Error> {
        self.inbox.publish(message).await
    }

    async fn children(
        &self,
    ) -> Result<BTreeMap<ProcessName, ProcessId>, Error> {
        Ok(self.inbox.children().await)
    }

    async fn inbox_count(&self) -> Result<i64, Error> {
        Ok(self.inbox.depth().await)
    }

    async fn watch(&self, watcher: &ProcessId) -> Result<(), Error> {
        self.inbox.watch(watcher).await
    }

    async fn unwatch(&self, watcher: &ProcessId) -> Result<(), Error> {
        self.inbox.unwatch(watcher).await
    }

    async fn kill(&self) -> Result<(), Error> {
        self.inbox.kill().await
    }

    async fn shutdown(&self) -> Result<(), Error> {
        self.inbox.shutdown().await
    }
}

/// Dispatcher for a target that resolved to nothing.
///
/// Every operation fails with `Error::AddressNotFound` naming the
/// unresolved identifier and the caller that asked for it, except the
/// idempotent teardown operations (`kill`, `shutdown`, `unwatch`), which
/// succeed silently: tearing down a process that is already gone is not a
/// failure.
pub struct NullDispatch {
    /// The identifier that failed to resolve.
    path: ProcessId,
    /// The caller that attempted the resolution.
    caller: ProcessId,
}

impl NullDispatch {
    /// Creates the nonexistent-target dispatcher.
    pub fn new(path: ProcessId, caller: ProcessId) -> Self {
        Self { path, caller }
    }

    fn missing(&self) -> Error {
        Error::AddressNotFound {
            path: self.path.clone(),
            caller: self.caller.clone(),
        }
    }
}

#[async_trait]
impl<P: Payload> Dispatch<P> for NullDispatch {
    fn path(&self) -> &ProcessId {
        &self.path
    }

    async fn tell(
        &self,
        _message: Message<P>,
        _sender: &ProcessId,
        _tag: Tag,
    ) -> Result<(), Error> {
        Err(self.missing())
    }

    async fn ask(
        &self,
        _message: Message<P>,
        _sender: &ProcessId,
    ) -> Result<(), Error> {
        Err(self.missing())
    }

    async fn publish(&self, _message: Message<P>) -> Result<(), Error> {
        Err(self.missing())
    }

    async fn children(
        &self,
    ) -> Result<BTreeMap<ProcessName, ProcessId>, Error> {
        Err(self.missing())
    }

    async fn inbox_count(&self) -> Result<i64, Error> {
        Err(self.missing())
    }

    async fn watch(&self, _watcher: &ProcessId) -> Result<(), Error> {
        Err(self.missing())
    }

    async fn unwatch(&self, _watcher: &ProcessId) -> Result<(), Error> {
        debug!("Unwatch on nonexistent {}, nothing to do.", self.path);
        Ok(())
    }

    async fn kill(&self) -> Result<(), Error> {
        debug!("Kill on nonexistent {}, nothing to do.", self.path);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), Error> {
        debug!("Shutdown on nonexistent {}, nothing to do.", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestPayload(u32);

    impl Payload for TestPayload {}

    fn null_dispatch() -> NullDispatch {
        NullDispatch::new(
            ProcessId::parse("/node/missing").unwrap(),
            ProcessId::parse("/user/caller").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_null_dispatch_fails_naming_target() {
        let dispatch = null_dispatch();
        let sender = ProcessId::parse("/user/caller").unwrap();
        let result = Dispatch::<TestPayload>::tell(
            &dispatch,
            Message::user(TestPayload(1)),
            &sender,
            Tag::UserMessage,
        )
        .await;
        match result {
            Err(Error::AddressNotFound { path, caller }) => {
                assert_eq!(path.to_string(), "/node/missing");
                assert_eq!(caller, sender);
            }
            other => panic!("expected AddressNotFound, got {:?}", other),
        }
        assert!(Dispatch::<TestPayload>::inbox_count(&dispatch)
            .await
            .is_err());
        assert!(Dispatch::<TestPayload>::children(&dispatch).await.is_err());
    }

    #[tokio::test]
    async fn test_null_dispatch_teardown_is_silent() {
        let dispatch = null_dispatch();
        let watcher = ProcessId::parse("/user/watcher").unwrap();
        assert!(Dispatch::<TestPayload>::kill(&dispatch).await.is_ok());
        assert!(Dispatch::<TestPayload>::shutdown(&dispatch).await.is_ok());
        assert!(Dispatch::<TestPayload>::unwatch(&dispatch, &watcher)
            .await
            .is_ok());
        assert!(Dispatch::<TestPayload>::watch(&dispatch, &watcher)
            .await
            .is_err());
    }
}
