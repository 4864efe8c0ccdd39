// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Message taxonomy
//!
//! The `message` module provides the closed set of message categories the
//! runtime routes on. Every message carries a [`MessageType`] (its
//! category) and a [`Tag`] (the finer discriminator within the category),
//! fixed at construction. The `(MessageType, Tag)` pair is the routing key
//! transport and inbox processing branch on; tags are partitioned by
//! category, and the partition is enforced by construction because each
//! category variant carries its own body enum.
//!

use crate::{Error, ProcessId};

use serde::{Deserialize, Serialize};

use std::fmt::{self, Formatter};

/// Marker trait for opaque application payloads carried by user messages
/// and ask/reply envelopes.
pub trait Payload: Clone + Send + Sync + 'static {}

/// The four message categories.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum MessageType {
    /// Application payload.
    User,
    /// Internal lifecycle traffic.
    System,
    /// Shutdown and the ask/reply protocol.
    UserControl,
    /// Runtime-level queries and commands.
    ActorSystem,
}

/// Fine-grained message discriminator. Each tag belongs to exactly one
/// [`MessageType`]; see [`Tag::message_type`].
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum Tag {
    /// Plain application payload (`User`).
    UserMessage,
    /// Restart the target process (`System`).
    Restart,
    /// Link a child to the target (`System`).
    Link,
    /// Unlink a child from the target (`System`).
    Unlink,
    /// A supervised child faulted (`System`).
    ChildFault,
    /// Internal correlated request (`System`).
    SystemAsk,
    /// Graceful stop request (`UserControl`).
    Shutdown,
    /// Correlated user request (`UserControl`).
    UserAsk,
    /// Correlated user response (`UserControl`).
    UserReply,
    /// Plain user envelope (`UserControl`).
    UserEnvelope,
    /// Snapshot the target's children (`ActorSystem`).
    GetChildren,
    /// Terminate the target process (`ActorSystem`).
    ShutdownProcess,
}

impl Tag {
    /// Returns the category this tag is partitioned under.
    pub fn message_type(&self) -> MessageType {
        match self {
            Tag::UserMessage => MessageType::User,
            Tag::Restart
            | Tag::Link
            | Tag::Unlink
            | Tag::ChildFault
            | Tag::SystemAsk => MessageType::System,
            Tag::Shutdown
            | Tag::UserAsk
            | Tag::UserReply
            | Tag::UserEnvelope => MessageType::UserControl,
            Tag::GetChildren | Tag::ShutdownProcess => {
                MessageType::ActorSystem
            }
        }
    }
}

/// A correlated request. Both halves of the ask protocol travel as
/// `UserControl` messages over the one-way transport; the correlation
/// engine matches them by `request_id`.
#[derive(Clone)]
pub struct ActorRequest<P: Payload> {
    /// Locally unique, monotonically increasing id scoped to one
    /// correlation engine instance.
    pub request_id: u64,
    /// The application payload.
    pub payload: P,
    /// Where the request is going.
    pub destination: ProcessId,
    /// Where the response must be sent back.
    pub reply_to: ProcessId,
}

impl<P: Payload> ActorRequest<P> {
    /// Builds the response correlated with this request.
    pub fn response(&self, payload: P) -> ActorResponse<P> {
        ActorResponse {
            request_id: self.request_id,
            payload,
        }
    }
}

/// The correlated response to an [`ActorRequest`]. Exactly one response is
/// expected per outstanding request; a response with an unknown id is an
/// orphan and is absorbed by the correlation engine.
#[derive(Clone)]
pub struct ActorResponse<P: Payload> {
    /// The id of the request being answered.
    pub request_id: u64,
    /// The result payload.
    pub payload: P,
}

/// Body of a `System` message.
#[derive(Clone)]
pub enum SystemMessage<P: Payload> {
    /// Restart the target.
    Restart,
    /// Link the given child to the target.
    Link(ProcessId),
    /// Unlink the given child from the target.
    Unlink(ProcessId),
    /// A supervised child faulted with the given error.
    ChildFault(Error),
    /// Internal correlated request.
    Ask(ActorRequest<P>),
}

/// Body of a `UserControl` message.
#[derive(Clone)]
pub enum UserControlMessage<P: Payload> {
    /// Drain outstanding work, then stop.
    Shutdown,
    /// Correlated user request.
    Ask(ActorRequest<P>),
    /// Correlated user response.
    Reply(ActorResponse<P>),
    /// Plain user envelope.
    Envelope(P),
}

/// Body of an `ActorSystem` message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorSystemMessage {
    /// Snapshot the target's children.
    GetChildren,
    /// Terminate the target.
    ShutdownProcess,
}

/// A routable message: one of the four categories with its body. The
/// category set is closed; adding a message kind means adding a tag inside
/// an existing category body, never registering a new category at runtime.
#[derive(Clone)]
pub enum Message<P: Payload> {
    /// Application payload.
    User(P),
    /// Internal lifecycle traffic.
    System(SystemMessage<P>),
    /// Shutdown and the ask/reply protocol.
    UserControl(UserControlMessage<P>),
    /// Runtime-level queries and commands.
    ActorSystem(ActorSystemMessage),
}

impl<P: Payload> Message<P> {
    /// Wraps an application payload.
    pub fn user(payload: P) -> Self {
        Message::User(payload)
    }

    /// Builds a restart instruction.
    pub fn restart() -> Self {
        Message::System(SystemMessage::Restart)
    }

    /// Builds a child link instruction.
    pub fn link(child: ProcessId) -> Self {
        Message::System(SystemMessage::Link(child))
    }

    /// Builds a child unlink instruction.
    pub fn unlink(child: ProcessId) -> Self {
        Message::System(SystemMessage::Unlink(child))
    }

    /// Builds a child fault notification.
    pub fn child_fault(error: Error) -> Self {
        Message::System(SystemMessage::ChildFault(error))
    }

    /// Wraps an internal correlated request.
    pub fn system_ask(request: ActorRequest<P>) -> Self {
        Message::System(SystemMessage::Ask(request))
    }

    /// Builds a graceful stop request.
    pub fn shutdown() -> Self {
        Message::UserControl(UserControlMessage::Shutdown)
    }

    /// Wraps a correlated user request.
    pub fn user_ask(request: ActorRequest<P>) -> Self {
        Message::UserControl(UserControlMessage::Ask(request))
    }

    /// Wraps a correlated user response.
    pub fn user_reply(response: ActorResponse<P>) -> Self {
        Message::UserControl(UserControlMessage::Reply(response))
    }

    /// Wraps a plain user envelope.
    pub fn envelope(payload: P) -> Self {
        Message::UserControl(UserControlMessage::Envelope(payload))
    }

    /// Builds a children snapshot query.
    pub fn get_children() -> Self {
        Message::ActorSystem(ActorSystemMessage::GetChildren)
    }

    /// Builds a process termination command.
    pub fn shutdown_process() -> Self {
        Message::ActorSystem(ActorSystemMessage::ShutdownProcess)
    }

    /// Returns this message's category.
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::User(_) => MessageType::User,
            Message::System(_) => MessageType::System,
            Message::UserControl(_) => MessageType::UserControl,
            Message::ActorSystem(_) => MessageType::ActorSystem,
        }
    }

    /// Returns this message's tag. The tag always falls in the partition
    /// of [`message_type`](Message::message_type).
    pub fn tag(&self) -> Tag {
        match self {
            Message::User(_) => Tag::UserMessage,
            Message::System(body) => match body {
                SystemMessage::Restart => Tag::Restart,
                SystemMessage::Link(_) => Tag::Link,
                SystemMessage::Unlink(_) => Tag::Unlink,
                SystemMessage::ChildFault(_) => Tag::ChildFault,
                SystemMessage::Ask(_) => Tag::SystemAsk,
            },
            Message::UserControl(body) => match body {
                UserControlMessage::Shutdown => Tag::Shutdown,
                UserControlMessage::Ask(_) => Tag::UserAsk,
                UserControlMessage::Reply(_) => Tag::UserReply,
                UserControlMessage::Envelope(_) => Tag::UserEnvelope,
            },
            Message::ActorSystem(body) => match body {
                ActorSystemMessage::GetChildren => Tag::GetChildren,
                ActorSystemMessage::ShutdownProcess => Tag::ShutdownProcess,
            },
        }
    }
}

/// Payloads are opaque, so debug output shows the routing key only.
impl<P: Payload> fmt::Debug for Message<P> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Message({:?}/{:?})", self.message_type(), self.tag())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestPayload(u32);

    impl Payload for TestPayload {}

    const ALL_TAGS: [Tag; 12] = [
        Tag::UserMessage,
        Tag::Restart,
        Tag::Link,
        Tag::Unlink,
        Tag::ChildFault,
        Tag::SystemAsk,
        Tag::Shutdown,
        Tag::UserAsk,
        Tag::UserReply,
        Tag::UserEnvelope,
        Tag::GetChildren,
        Tag::ShutdownProcess,
    ];

    #[test]
    fn tags_partition_by_category() {
        let expected = [
            (MessageType::User, 1),
            (MessageType::System, 5),
            (MessageType::UserControl, 4),
            (MessageType::ActorSystem, 2),
        ];
        for (message_type, count) in expected {
            let partition = ALL_TAGS
                .iter()
                .filter(|tag| tag.message_type() == message_type)
                .count();
            assert_eq!(partition, count, "partition of {:?}", message_type);
        }
    }

    #[test]
    fn message_tag_stays_in_its_partition() {
        let child = ProcessId::parse("/user/child").unwrap();
        let request = ActorRequest {
            request_id: 7,
            payload: TestPayload(1),
            destination: ProcessId::parse("/node/worker").unwrap(),
            reply_to: ProcessId::parse("/system/ask").unwrap(),
        };
        let messages: Vec<Message<TestPayload>> = vec![
            Message::user(TestPayload(0)),
            Message::restart(),
            Message::link(child.clone()),
            Message::unlink(child),
            Message::child_fault(Error::Send("boom".to_owned())),
            Message::system_ask(request.clone()),
            Message::shutdown(),
            Message::user_ask(request.clone()),
            Message::user_reply(request.response(TestPayload(2))),
            Message::envelope(TestPayload(3)),
            Message::get_children(),
            Message::shutdown_process(),
        ];
        for message in messages {
            assert_eq!(message.tag().message_type(), message.message_type());
        }
    }

    #[test]
    fn response_carries_request_id() {
        let request = ActorRequest {
            request_id: 42,
            payload: TestPayload(1),
            destination: ProcessId::parse("/node/worker").unwrap(),
            reply_to: ProcessId::parse("/system/ask").unwrap(),
        };
        let response = request.response(TestPayload(9));
        assert_eq!(response.request_id, 42);
        assert_eq!(response.payload, TestPayload(9));
    }
}
