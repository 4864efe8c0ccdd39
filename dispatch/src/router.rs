// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Role routers
//!
//! A role addresses a logical pool of equivalent workers, one per cluster
//! node that advertises the role. The router re-reads live membership on
//! every call, maps each advertising node to a concrete dispatcher at
//! `/<node>/<leaf>`, and applies its routing strategy to the discovered
//! workers. Nothing is cached between calls: membership changes take
//! effect on the very next dispatch.
//!

use crate::{
    Dispatch, Error, Membership, Message, Payload, ProcessId, ProcessName,
    Resolver, Tag, INBOX_COUNT_UNKNOWN,
};

use async_trait::async_trait;
use futures::future::join_all;
use rand::Rng;
use serde::{Deserialize, Serialize};

use tracing::debug;

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Worker selection strategy for a role. The set is closed: consumers
/// match exhaustively on it.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum RouteStrategy {
    /// Every operation fans out to all discovered workers; reads fold
    /// the per-worker results into one value.
    Broadcast,
    /// Picks the worker reporting the smallest inbox depth, first in
    /// discovery order on ties. Workers reporting the unknown sentinel
    /// are ignored.
    LeastBusy,
    /// Picks a uniformly random worker, re-drawn on every call.
    Random,
    /// Cycles through the workers via a shared per-`{role, leaf}` cursor.
    RoundRobin,
}

/// Cursor key: one cursor per `{role, leaf}` pair.
type CursorKey = (ProcessName, ProcessId);

/// Shared round-robin cursor registry.
///
/// An owned object injected into every router rather than global state.
/// The lock covers only the cursor read-increment-write; dispatch calls
/// made with the returned index run outside it, so concurrent sends
/// through one role are never serialized here.
///
/// The modulo uses the worker count observed by the current call. When
/// membership changes between calls the effective cycle can skip or
/// repeat a worker; that is accepted, documented behavior.
#[derive(Default)]
pub struct RoundRobinCursors {
    cursors: Mutex<HashMap<CursorKey, usize>>,
}

impl RoundRobinCursors {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the cursor for `{role, leaf}` and returns the index to
    /// use against `worker_count` workers. `worker_count` must be
    /// non-zero; callers check for an empty selection first.
    pub fn next(
        &self,
        role: &ProcessName,
        leaf: &ProcessId,
        worker_count: usize,
    ) -> usize {
        let mut cursors = self.lock();
        let cursor =
            cursors.entry((role.clone(), leaf.clone())).or_insert(0);
        let index = *cursor % worker_count;
        *cursor = (index + 1) % worker_count;
        index
    }

    /// Current cursor position for `{role, leaf}`, if any call has
    /// advanced it yet.
    pub fn position(
        &self,
        role: &ProcessName,
        leaf: &ProcessId,
    ) -> Option<usize> {
        self.lock().get(&(role.clone(), leaf.clone())).copied()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CursorKey, usize>> {
        match self.cursors.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Outcome of applying a strategy to the discovered workers.
enum Selection {
    /// Fan out to every worker.
    All,
    /// Dispatch to the worker at this index.
    One(usize),
}

/// Dispatcher for a role: resolves the worker set on every call and
/// routes according to its [`RouteStrategy`].
pub struct RoleRouter<P: Payload> {
    /// The reserved role identifier this router answers for.
    path: ProcessId,
    /// The role being routed.
    role: ProcessName,
    /// Identifier suffix of each worker beneath its node.
    leaf: ProcessId,
    /// Worker selection strategy.
    strategy: RouteStrategy,
    /// Live membership, read per call.
    membership: Arc<dyn Membership>,
    /// Resolves worker identifiers to dispatchers.
    resolver: Arc<dyn Resolver<P>>,
    /// Shared round-robin cursor registry.
    cursors: Arc<RoundRobinCursors>,
}

impl<P: Payload> RoleRouter<P> {
    /// Creates a router for `role` with workers at `/<node>/<leaf>`.
    pub fn new(
        role: ProcessName,
        leaf: ProcessId,
        strategy: RouteStrategy,
        membership: Arc<dyn Membership>,
        resolver: Arc<dyn Resolver<P>>,
        cursors: Arc<RoundRobinCursors>,
    ) -> Self {
        let path = ProcessId::role_id(&role);
        Self {
            path,
            role,
            leaf,
            strategy,
            membership,
            resolver,
            cursors,
        }
    }

    /// Resolves the current worker set: every node advertising the role,
    /// in node-name order, mapped to a dispatcher at `/<node>/<leaf>`.
    async fn discover(&self) -> Vec<Arc<dyn Dispatch<P>>> {
        let members = self.membership.members().await;
        let mut targets = Vec::new();
        for (node, roles) in members {
            if !roles.contains(&self.role) {
                continue;
            }
            targets.push(ProcessId::from(node).append(&self.leaf));
        }
        join_all(
            targets
                .iter()
                .map(|target| self.resolver.resolve(target, &self.path)),
        )
        .await
    }

    /// Applies the strategy to a non-empty worker set.
    async fn route(
        &self,
        workers: &[Arc<dyn Dispatch<P>>],
    ) -> Result<Selection, Error> {
        match self.strategy {
            RouteStrategy::Broadcast => Ok(Selection::All),
            RouteStrategy::LeastBusy => {
                let counts =
                    join_all(workers.iter().map(|w| w.inbox_count())).await;
                let mut best: Option<(usize, i64)> = None;
                for (index, count) in counts.into_iter().enumerate() {
                    let count = match count {
                        Ok(count) if count != INBOX_COUNT_UNKNOWN => count,
                        _ => continue,
                    };
                    // strict `<` keeps the first worker reaching the
                    // minimum, so ties break in discovery order
                    if best.map_or(true, |(_, min)| count < min) {
                        best = Some((index, count));
                    }
                }
                match best {
                    Some((index, _)) => Ok(Selection::One(index)),
                    None => Err(Error::EmptyRole(self.role.clone())),
                }
            }
            RouteStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..workers.len());
                Ok(Selection::One(index))
            }
            RouteStrategy::RoundRobin => {
                let index =
                    self.cursors.next(&self.role, &self.leaf, workers.len());
                Ok(Selection::One(index))
            }
        }
    }

    /// Logs per-worker failures of a best-effort fan-out.
    fn absorb_fanout(
        &self,
        workers: &[Arc<dyn Dispatch<P>>],
        results: Vec<Result<(), Error>>,
    ) {
        for (worker, result) in workers.iter().zip(results) {
            if let Err(error) = result {
                debug!(
                    "Best-effort fan-out for role '{}' to {} failed: {}",
                    self.role,
                    worker.path(),
                    error
                );
            }
        }
    }
}

#[async_trait]
impl<P: Payload> Dispatch<P> for RoleRouter<P> {
    fn path(&self) -> &ProcessId {
        &self.path
    }

    async fn tell(
        &self,
        message: Message<P>,
        sender: &ProcessId,
        tag: Tag,
    ) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            return Err(Error::EmptyRole(self.role.clone()));
        }
        match self.route(&workers).await? {
            Selection::All => {
                let results = join_all(
                    workers
                        .iter()
                        .map(|w| w.tell(message.clone(), sender, tag)),
                )
                .await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Selection::One(index) => {
                workers[index].tell(message, sender, tag).await
            }
        }
    }

    async fn ask(
        &self,
        message: Message<P>,
        sender: &ProcessId,
    ) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            return Err(Error::EmptyRole(self.role.clone()));
        }
        match self.route(&workers).await? {
            Selection::All => {
                let results = join_all(
                    workers.iter().map(|w| w.ask(message.clone(), sender)),
                )
                .await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Selection::One(index) => workers[index].ask(message, sender).await,
        }
    }

    async fn publish(&self, message: Message<P>) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            return Err(Error::EmptyRole(self.role.clone()));
        }
        match self.route(&workers).await? {
            Selection::All => {
                let results = join_all(
                    workers.iter().map(|w| w.publish(message.clone())),
                )
                .await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Selection::One(index) => workers[index].publish(message).await,
        }
    }

    async fn children(
        &self,
    ) -> Result<BTreeMap<ProcessName, ProcessId>, Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            return Err(Error::EmptyRole(self.role.clone()));
        }
        match self.route(&workers).await? {
            Selection::All => {
                let snapshots =
                    join_all(workers.iter().map(|w| w.children())).await;
                let mut union = BTreeMap::new();
                for snapshot in snapshots {
                    match snapshot {
                        // extend overrides on name collision, so later
                        // workers win
                        Ok(children) => union.extend(children),
                        Err(error) => {
                            debug!(
                                "Skipping children of unreachable worker \
                                 for role '{}': {}",
                                self.role, error
                            );
                        }
                    }
                }
                Ok(union)
            }
            Selection::One(index) => workers[index].children().await,
        }
    }

    async fn inbox_count(&self) -> Result<i64, Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            return Err(Error::EmptyRole(self.role.clone()));
        }
        match self.route(&workers).await? {
            Selection::All => {
                let counts =
                    join_all(workers.iter().map(|w| w.inbox_count())).await;
                let total = counts
                    .into_iter()
                    .map(|count| match count {
                        Ok(count) if count != INBOX_COUNT_UNKNOWN => count,
                        _ => 0,
                    })
                    .sum();
                Ok(total)
            }
            Selection::One(index) => workers[index].inbox_count().await,
        }
    }

    async fn watch(&self, watcher: &ProcessId) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            return Err(Error::EmptyRole(self.role.clone()));
        }
        match self.route(&workers).await? {
            Selection::All => {
                let results =
                    join_all(workers.iter().map(|w| w.watch(watcher))).await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Selection::One(index) => workers[index].watch(watcher).await,
        }
    }

    async fn unwatch(&self, watcher: &ProcessId) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            debug!("Unwatch on empty role '{}', nothing to do.", self.role);
            return Ok(());
        }
        match self.route(&workers).await {
            Err(_) => Ok(()),
            Ok(Selection::All) => {
                let results =
                    join_all(workers.iter().map(|w| w.unwatch(watcher)))
                        .await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Ok(Selection::One(index)) => {
                workers[index].unwatch(watcher).await
            }
        }
    }

    async fn kill(&self) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            debug!("Kill on empty role '{}', nothing to do.", self.role);
            return Ok(());
        }
        match self.route(&workers).await {
            Err(_) => Ok(()),
            Ok(Selection::All) => {
                let results =
                    join_all(workers.iter().map(|w| w.kill())).await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Ok(Selection::One(index)) => workers[index].kill().await,
        }
    }

    async fn shutdown(&self) -> Result<(), Error> {
        let workers = self.discover().await;
        if workers.is_empty() {
            debug!("Shutdown on empty role '{}', nothing to do.", self.role);
            return Ok(());
        }
        match self.route(&workers).await {
            Err(_) => Ok(()),
            Ok(Selection::All) => {
                let results =
                    join_all(workers.iter().map(|w| w.shutdown())).await;
                self.absorb_fanout(&workers, results);
                Ok(())
            }
            Ok(Selection::One(index)) => workers[index].shutdown().await,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::NullDispatch;

    use std::collections::BTreeSet;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone, Debug, PartialEq)]
    struct TestPayload(u32);

    impl Payload for TestPayload {}

    struct StaticMembership(
        BTreeMap<ProcessName, BTreeSet<ProcessName>>,
    );

    #[async_trait]
    impl Membership for StaticMembership {
        async fn members(
            &self,
        ) -> BTreeMap<ProcessName, BTreeSet<ProcessName>> {
            self.0.clone()
        }
    }

    struct StubWorker {
        path: ProcessId,
        depth: i64,
        fail_sends: bool,
        children: BTreeMap<ProcessName, ProcessId>,
        log: Arc<StdMutex<Vec<String>>>,
    }

    impl StubWorker {
        fn record(&self, operation: &str) {
            let mut log = self.log.lock().unwrap();
            log.push(format!(
                "{}:{}",
                operation,
                self.path.head().unwrap()
            ));
        }
    }

    #[async_trait]
    impl Dispatch<TestPayload> for StubWorker {
        fn path(&self) -> &ProcessId {
            &self.path
        }

        async fn tell(
            &self,
            _message: Message<TestPayload>,
            _sender: &ProcessId,
            _tag: Tag,
        ) -> Result<(), Error> {
            if self.fail_sends {
                return Err(Error::Send("stub failure".to_owned()));
            }
            self.record("tell");
            Ok(())
        }

        async fn ask(
            &self,
            _message: Message<TestPayload>,
            _sender: &ProcessId,
        ) -> Result<(), Error> {
            self.record("ask");
            Ok(())
        }

        async fn publish(
            &self,
            _message: Message<TestPayload>,
        ) -> Result<(), Error> {
            self.record("publish");
            Ok(())
        }

        async fn children(
            &self,
        ) -> Result<BTreeMap<ProcessName, ProcessId>, Error> {
            Ok(self.children.clone())
        }

        async fn inbox_count(&self) -> Result<i64, Error> {
            Ok(self.depth)
        }

        async fn watch(&self, _watcher: &ProcessId) -> Result<(), Error> {
            self.record("watch");
            Ok(())
        }

        async fn unwatch(&self, _watcher: &ProcessId) -> Result<(), Error> {
            self.record("unwatch");
            Ok(())
        }

        async fn kill(&self) -> Result<(), Error> {
            self.record("kill");
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), Error> {
            self.record("shutdown");
            Ok(())
        }
    }

    struct StubResolver {
        workers: HashMap<ProcessId, Arc<StubWorker>>,
    }

    #[async_trait]
    impl Resolver<TestPayload> for StubResolver {
        async fn resolve(
            &self,
            pid: &ProcessId,
            caller: &ProcessId,
        ) -> Arc<dyn Dispatch<TestPayload>> {
            match self.workers.get(pid) {
                Some(worker) => worker.clone(),
                None => Arc::new(NullDispatch::new(
                    pid.clone(),
                    caller.clone(),
                )),
            }
        }
    }

    struct Fixture {
        router: RoleRouter<TestPayload>,
        log: Arc<StdMutex<Vec<String>>>,
        sender: ProcessId,
    }

    /// Builds a router over workers `/node-<x>/workers` with the given
    /// per-node inbox depths. Node names sort in declaration order.
    fn fixture(strategy: RouteStrategy, depths: &[i64]) -> Fixture {
        fixture_with(strategy, depths, &[])
    }

    fn fixture_with(
        strategy: RouteStrategy,
        depths: &[i64],
        failing: &[usize],
    ) -> Fixture {
        let role = ProcessName::parse("workers").unwrap();
        let leaf =
            ProcessId::from(ProcessName::parse("workers").unwrap());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let mut members = BTreeMap::new();
        let mut workers = HashMap::new();
        for (index, depth) in depths.iter().enumerate() {
            let node =
                ProcessName::parse(&format!("node-{}", index)).unwrap();
            let mut roles = BTreeSet::new();
            roles.insert(role.clone());
            members.insert(node.clone(), roles);

            let path = ProcessId::from(node).append(&leaf);
            workers.insert(
                path.clone(),
                Arc::new(StubWorker {
                    path,
                    depth: *depth,
                    fail_sends: failing.contains(&index),
                    children: BTreeMap::new(),
                    log: log.clone(),
                }),
            );
        }

        let router = RoleRouter::new(
            role,
            leaf,
            strategy,
            Arc::new(StaticMembership(members)),
            Arc::new(StubResolver { workers }),
            Arc::new(RoundRobinCursors::new()),
        );
        Fixture {
            router,
            log,
            sender: ProcessId::parse("/user/sender").unwrap(),
        }
    }

    fn entries(log: &Arc<StdMutex<Vec<String>>>) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_round_robin_cycles_in_discovery_order() {
        let fx = fixture(RouteStrategy::RoundRobin, &[0, 0, 0]);
        for _ in 0..7 {
            fx.router
                .tell(
                    Message::user(TestPayload(1)),
                    &fx.sender,
                    Tag::UserMessage,
                )
                .await
                .unwrap();
        }
        let expected = [
            "node-0", "node-1", "node-2", "node-0", "node-1", "node-2",
            "node-0",
        ];
        let told: Vec<String> = expected
            .iter()
            .map(|node| format!("tell:{}", node))
            .collect();
        assert_eq!(entries(&fx.log), told);
    }

    #[tokio::test]
    async fn test_least_busy_picks_first_minimum_ignoring_sentinel() {
        let fx = fixture(RouteStrategy::LeastBusy, &[5, 2, -1, 2]);
        fx.router
            .tell(Message::user(TestPayload(1)), &fx.sender, Tag::UserMessage)
            .await
            .unwrap();
        assert_eq!(entries(&fx.log), vec!["tell:node-1"]);
    }

    #[tokio::test]
    async fn test_least_busy_without_usable_counts_fails() {
        let fx = fixture(RouteStrategy::LeastBusy, &[-1, -1]);
        let result = fx
            .router
            .tell(Message::user(TestPayload(1)), &fx.sender, Tag::UserMessage)
            .await;
        assert!(matches!(result, Err(Error::EmptyRole(_))));
    }

    #[tokio::test]
    async fn test_random_always_hits_a_discovered_worker() {
        let fx = fixture(RouteStrategy::Random, &[0, 0, 0]);
        for _ in 0..50 {
            fx.router
                .tell(
                    Message::user(TestPayload(1)),
                    &fx.sender,
                    Tag::UserMessage,
                )
                .await
                .unwrap();
        }
        let log = entries(&fx.log);
        assert_eq!(log.len(), 50);
        assert!(log.iter().all(|entry| {
            entry == "tell:node-0"
                || entry == "tell:node-1"
                || entry == "tell:node-2"
        }));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_worker_best_effort() {
        let fx = fixture_with(RouteStrategy::Broadcast, &[0, 0, 0], &[1]);
        fx.router
            .tell(Message::user(TestPayload(1)), &fx.sender, Tag::UserMessage)
            .await
            .unwrap();
        // node-1 fails its send; the fan-out still succeeds and reaches
        // the other two
        let mut log = entries(&fx.log);
        log.sort();
        assert_eq!(log, vec!["tell:node-0", "tell:node-2"]);
    }

    #[tokio::test]
    async fn test_broadcast_inbox_count_sums_with_sentinel_as_zero() {
        let fx = fixture(RouteStrategy::Broadcast, &[3, -1, 4]);
        assert_eq!(fx.router.inbox_count().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_broadcast_children_union_later_worker_wins() {
        let role = ProcessName::parse("workers").unwrap();
        let leaf =
            ProcessId::from(ProcessName::parse("workers").unwrap());
        let log = Arc::new(StdMutex::new(Vec::new()));
        let shared = ProcessName::parse("task").unwrap();

        let mut members = BTreeMap::new();
        let mut workers = HashMap::new();
        for index in 0..2 {
            let node =
                ProcessName::parse(&format!("node-{}", index)).unwrap();
            let mut roles = BTreeSet::new();
            roles.insert(role.clone());
            members.insert(node.clone(), roles);

            let path = ProcessId::from(node).append(&leaf);
            let mut children = BTreeMap::new();
            children.insert(
                shared.clone(),
                path.clone() / shared.clone(),
            );
            children.insert(
                ProcessName::parse(&format!("only-{}", index)).unwrap(),
                path.clone() / ProcessName::parse("x").unwrap(),
            );
            workers.insert(
                path.clone(),
                Arc::new(StubWorker {
                    path,
                    depth: 0,
                    fail_sends: false,
                    children,
                    log: log.clone(),
                }),
            );
        }

        let router = RoleRouter::new(
            role,
            leaf,
            RouteStrategy::Broadcast,
            Arc::new(StaticMembership(members)),
            Arc::new(StubResolver { workers }),
            Arc::new(RoundRobinCursors::new()),
        );

        let union = router.children().await.unwrap();
        assert_eq!(union.len(), 3);
        // the colliding name resolves to the later worker's child
        assert!(union[&shared].to_string().starts_with("/node-1"));
    }

    #[tokio::test]
    async fn test_empty_role_fails_like_missing_target() {
        let fx = fixture(RouteStrategy::RoundRobin, &[]);
        let result = fx
            .router
            .tell(Message::user(TestPayload(1)), &fx.sender, Tag::UserMessage)
            .await;
        match result {
            Err(Error::EmptyRole(role)) => {
                assert_eq!(role.as_str(), "workers")
            }
            other => panic!("expected EmptyRole, got {:?}", other),
        }
        assert!(fx.router.children().await.is_err());
        // idempotent teardown stays silent
        assert!(fx.router.kill().await.is_ok());
        assert!(fx.router.shutdown().await.is_ok());
        assert!(fx.router.unwatch(&fx.sender).await.is_ok());
    }

    #[test]
    fn test_cursor_reuses_position_across_membership_changes() {
        let cursors = RoundRobinCursors::new();
        let role = ProcessName::parse("workers").unwrap();
        let leaf = ProcessId::parse("/workers").unwrap();

        assert_eq!(cursors.next(&role, &leaf, 3), 0);
        assert_eq!(cursors.next(&role, &leaf, 3), 1);
        // membership shrank between calls: the stored cursor is reused
        // against the new count, which may skip or repeat a worker
        assert_eq!(cursors.next(&role, &leaf, 2), 0);
        assert_eq!(cursors.next(&role, &leaf, 2), 1);
        assert_eq!(cursors.position(&role, &leaf), Some(0));
    }

    #[test]
    fn test_cursor_keys_are_independent() {
        let cursors = RoundRobinCursors::new();
        let role_a = ProcessName::parse("ingest").unwrap();
        let role_b = ProcessName::parse("digest").unwrap();
        let leaf = ProcessId::parse("/workers").unwrap();

        assert_eq!(cursors.next(&role_a, &leaf, 4), 0);
        assert_eq!(cursors.next(&role_a, &leaf, 4), 1);
        assert_eq!(cursors.next(&role_b, &leaf, 4), 0);
        assert_eq!(cursors.position(&role_a, &leaf), Some(2));
        assert_eq!(cursors.position(&role_b, &leaf), Some(1));
    }
}
