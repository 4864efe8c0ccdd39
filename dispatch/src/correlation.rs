// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Ask/reply correlation engine
//!
//! The transport only supports one-way sends. This module layers
//! request/response semantics on top of it: a single correlator loop owns
//! the request-id counter and the table of outstanding asks, and a fixed
//! pool of reply workers fans concurrent responses back into that loop.
//!
//! Registration and completion both execute inside the same sequential
//! loop, so there is no race between "register id N" and "complete id N"
//! even though the request travels over asynchronous transport. That
//! ownership argument is the correctness core of the whole component: the
//! pending table is owned by one task and is never touched from callers.
//!

use crate::{
    ActorRequest, ActorResponse, Dispatch, DispatchConfig, Error, Message,
    Payload, ProcessId, ProcessName, Resolver,
};

use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use tracing::debug;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Address of the correlator loop; responses are replied to here.
const CORRELATOR_PATH: &str = "/system/ask";

/// Address prefix of the reply fan-in workers.
const REPLY_PATH: &str = "/system/reply";

/// Instruction consumed by the correlator loop.
enum Correlate<P: Payload> {
    /// Register a new ask and send the correlated request.
    Ask {
        payload: P,
        destination: ProcessId,
        completion: oneshot::Sender<Result<P, Error>>,
    },
    /// Complete (or absorb) an incoming response.
    Response(ActorResponse<P>),
}

/// Factory for the correlation engine.
pub struct Correlator {}

impl Correlator {
    /// Creates the engine: a clonable ask handle, the reply fan-in pool
    /// and the runner owning all correlation state.
    ///
    /// The runner must be driven in its own task (`runner.run().await`);
    /// the reply pool spawns its forwarding workers immediately, so this
    /// must be called inside a tokio runtime. Cancelling `token` stops
    /// the loop and fails every still-pending ask with `Error::Closed`.
    pub fn create<P: Payload>(
        resolver: Arc<dyn Resolver<P>>,
        config: &DispatchConfig,
        token: CancellationToken,
    ) -> Result<
        (CorrelatorRef<P>, ReplyPool<P>, CorrelatorRunner<P>),
        Error,
    > {
        let path = ProcessId::parse(CORRELATOR_PATH)?;
        let (instruction_sender, instruction_receiver) =
            mpsc::unbounded_channel();
        let reference = CorrelatorRef {
            path: path.clone(),
            instructions: instruction_sender.clone(),
        };
        let pool = ReplyPool::create(
            instruction_sender,
            config.reply_pool_size.max(1),
            token.clone(),
        )?;
        let runner = CorrelatorRunner {
            path,
            resolver,
            instructions: instruction_receiver,
            next_id: 0,
            pending: HashMap::new(),
            token,
        };
        Ok((reference, pool, runner))
    }
}

/// Caller-side handle for asks.
pub struct CorrelatorRef<P: Payload> {
    /// The correlator's own address, used as request sender and reply-to.
    path: ProcessId,
    /// Instruction channel into the correlator loop.
    instructions: mpsc::UnboundedSender<Correlate<P>>,
}

impl<P: Payload> CorrelatorRef<P> {
    /// The correlator's address.
    pub fn path(&self) -> &ProcessId {
        &self.path
    }

    /// Sends `payload` to `destination` as a correlated request and waits
    /// for the response payload.
    ///
    /// The wait is an asynchronous completion, not a thread block, and it
    /// has no built-in timeout. Dropping the returned future abandons
    /// only the caller-side wait; the pending entry stays registered and
    /// is absorbed as an orphan if the response arrives later.
    ///
    /// # Errors
    ///
    /// Fails with the dispatch error if the request could not be sent
    /// (for example `AddressNotFound`), or `Error::Closed` if the engine
    /// shut down before answering.
    ///
    pub async fn ask(
        &self,
        payload: P,
        destination: ProcessId,
    ) -> Result<P, Error> {
        let (completion, wait) = oneshot::channel();
        self.instructions
            .send(Correlate::Ask {
                payload,
                destination,
                completion,
            })
            .map_err(|_| Error::Closed("Correlator".to_owned()))?;
        match wait.await {
            Ok(result) => result,
            Err(_) => Err(Error::Closed("Correlator".to_owned())),
        }
    }

    /// Like [`ask`](CorrelatorRef::ask), but gives up after `timeout`.
    ///
    /// The timeout is purely caller-local: it cancels the wait and leaves
    /// the pending entry to be discarded as an orphan when the late
    /// response arrives. The correlator's bookkeeping is not touched.
    pub async fn ask_with_timeout(
        &self,
        payload: P,
        destination: ProcessId,
        timeout: Duration,
    ) -> Result<P, Error> {
        match tokio::time::timeout(
            timeout,
            self.ask(payload, destination.clone()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    "Ask to {} abandoned after {:?}, leaving entry to \
                     orphan collection.",
                    destination, timeout
                );
                Err(Error::AskTimeout { destination })
            }
        }
    }
}

impl<P: Payload> Clone for CorrelatorRef<P> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            instructions: self.instructions.clone(),
        }
    }
}

/// The correlator loop. Exclusively owns the request-id counter and the
/// pending-ask table; all mutation happens inside [`run`](Self::run).
pub struct CorrelatorRunner<P: Payload> {
    path: ProcessId,
    resolver: Arc<dyn Resolver<P>>,
    instructions: mpsc::UnboundedReceiver<Correlate<P>>,
    next_id: u64,
    pending: HashMap<u64, oneshot::Sender<Result<P, Error>>>,
    token: CancellationToken,
}

impl<P: Payload> CorrelatorRunner<P> {
    /// Drives the correlation loop until cancellation or until every
    /// handle is dropped.
    pub async fn run(&mut self) {
        debug!("Running ask correlation loop...");
        loop {
            tokio::select! {
                _ = self.token.cancelled() => {
                    debug!("Stopping ask correlation loop...");
                    self.instructions.close();
                    for (_, completion) in self.pending.drain() {
                        let _ = completion
                            .send(Err(Error::Closed("Correlator".to_owned())));
                    }
                    break;
                }
                instruction = self.instructions.recv() => {
                    match instruction {
                        Some(Correlate::Ask {
                            payload,
                            destination,
                            completion,
                        }) => {
                            self.register(payload, destination, completion)
                                .await;
                        }
                        Some(Correlate::Response(response)) => {
                            self.complete(response);
                        }
                        None => break,
                    }
                }
            }
        }
    }

    /// Registers the next ask and sends the correlated request one-way.
    async fn register(
        &mut self,
        payload: P,
        destination: ProcessId,
        completion: oneshot::Sender<Result<P, Error>>,
    ) {
        self.next_id += 1;
        let request_id = self.next_id;
        let request = ActorRequest {
            request_id,
            payload,
            destination: destination.clone(),
            reply_to: self.path.clone(),
        };
        self.pending.insert(request_id, completion);
        let target = self.resolver.resolve(&destination, &self.path).await;
        if let Err(error) =
            target.ask(Message::user_ask(request), &self.path).await
        {
            // the hand-off failed synchronously, so the dispatch error
            // propagates to the waiting caller instead of a response
            if let Some(completion) = self.pending.remove(&request_id) {
                let _ = completion.send(Err(error));
            }
        }
    }

    /// Completes the pending ask, or absorbs the response as an orphan.
    fn complete(&mut self, response: ActorResponse<P>) {
        match self.pending.remove(&response.request_id) {
            Some(completion) => {
                if completion.send(Ok(response.payload)).is_err() {
                    debug!(
                        "Caller abandoned ask {} before its response \
                         arrived.",
                        response.request_id
                    );
                }
            }
            None => {
                // single-shot completion: duplicates for a consumed id
                // land here and are indistinguishable from orphans
                debug!(
                    "Dropping orphan response for unknown ask {}.",
                    response.request_id
                );
            }
        }
    }
}

/// One reply fan-in worker. Independently addressable; forwards every
/// response it receives, unchanged, to the correlator loop.
pub struct ReplyMember<P: Payload> {
    path: ProcessId,
    responses: mpsc::UnboundedSender<ActorResponse<P>>,
}

impl<P: Payload> ReplyMember<P> {
    /// The worker's address.
    pub fn path(&self) -> &ProcessId {
        &self.path
    }

    /// Hands a response to this worker for fan-in.
    pub fn accept(&self, response: ActorResponse<P>) -> Result<(), Error> {
        self.responses
            .send(response)
            .map_err(|_| Error::Closed("ReplyPool".to_owned()))
    }
}

impl<P: Payload> Clone for ReplyMember<P> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            responses: self.responses.clone(),
        }
    }
}

/// Fixed-size pool of reply workers at `/system/reply/<index>`.
///
/// The pool exists to parallelize delivery of many concurrent replies
/// without funneling all of them through one mailbox. Member selection is
/// stateless and uniform, independent of the request id: correctness only
/// needs every response to eventually reach the correlator loop, not any
/// particular worker.
pub struct ReplyPool<P: Payload> {
    members: Vec<ReplyMember<P>>,
}

impl<P: Payload> ReplyPool<P> {
    fn create(
        instructions: mpsc::UnboundedSender<Correlate<P>>,
        size: usize,
        token: CancellationToken,
    ) -> Result<Self, Error> {
        let base = ProcessId::parse(REPLY_PATH)?;
        let mut members = Vec::with_capacity(size);
        for index in 0..size {
            let path =
                base.clone() / ProcessName::parse(&index.to_string())?;
            let (sender, mut receiver) =
                mpsc::unbounded_channel::<ActorResponse<P>>();
            let forward = instructions.clone();
            let member_token = token.clone();
            let member_path = path.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = member_token.cancelled() => break,
                        response = receiver.recv() => {
                            match response {
                                Some(response) => {
                                    if forward
                                        .send(Correlate::Response(response))
                                        .is_err()
                                    {
                                        debug!(
                                            "Correlator gone, stopping \
                                             reply worker {}.",
                                            member_path
                                        );
                                        break;
                                    }
                                }
                                None => break,
                            }
                        }
                    }
                }
            });
            members.push(ReplyMember {
                path,
                responses: sender,
            });
        }
        Ok(Self { members })
    }

    /// Number of workers in the pool.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the pool has no workers. Never the case for pools built
    /// by [`Correlator::create`].
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// All workers, for registration with a resolver.
    pub fn members(&self) -> &[ReplyMember<P>] {
        &self.members
    }

    /// Picks a worker uniformly at random.
    pub fn member(&self) -> &ReplyMember<P> {
        let index = rand::thread_rng().gen_range(0..self.members.len());
        &self.members[index]
    }

    /// Routes a response through a randomly chosen worker.
    pub fn reply(&self, response: ActorResponse<P>) -> Result<(), Error> {
        self.member().accept(response)
    }
}
