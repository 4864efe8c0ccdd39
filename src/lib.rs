

//! Core library for the Courier framework.
//! Provides the addressing, dispatch-routing and request/reply-correlation
//! core of a clustered actor runtime. The mailbox engine, cluster store and
//! process registry are supplied by the host through the collaborator traits
//! re-exported here.

pub use dispatch::{
    ActorRequest, ActorResponse, ActorSystemMessage, Correlator,
    CorrelatorRef, CorrelatorRunner, Decider, Directive, Dispatch,
    DispatchConfig, Error as DispatchError, ErrorKind, Inbox,
    LocalDispatch, Membership, Message, MessageType, NodeId, NullDispatch,
    Payload, ProcessId, ProcessName, ReplyMember, ReplyPool, Resolver,
    RoleRouter, RoundRobinCursors, RouteStrategy, SupervisorScope,
    SupervisorStrategy, SystemMessage, Tag, UserControlMessage,
    INBOX_COUNT_UNKNOWN,
};
