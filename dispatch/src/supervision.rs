//! Supervision directive policy
//!

use crate::{Error, ErrorKind, ProcessId};

use serde::{Deserialize, Serialize};

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Failure-handling outcome selected for a faulting child. Execution of
/// the directive belongs to the supervision engine; this module only
/// selects one.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum Directive {
    /// Keep the child running and drop the failing message.
    Resume,
    /// Restart the child.
    Restart,
    /// Stop the child.
    Stop,
    /// Hand the fault to the next supervisor up.
    Escalate,
}

/// Ordered fault-kind to directive rules, first match wins.
///
/// A rule matches when the fault's [`ErrorKind`] equals the declared kind.
/// An unmatched fault under a partial rule set yields no directive; the
/// supervision engine owns the total fallback, this policy never guesses
/// one. Use [`otherwise`](Decider::otherwise) to make a decider total.
#[derive(Clone, Debug, Default)]
pub struct Decider {
    rules: Vec<(ErrorKind, Directive)>,
    fallback: Option<Directive>,
}

impl Decider {
    /// Creates an empty decider that never yields a directive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule: faults of `kind` select `directive`. Rules are
    /// consulted in the order they were appended.
    pub fn when(mut self, kind: ErrorKind, directive: Directive) -> Self {
        self.rules.push((kind, directive));
        self
    }

    /// Sets the fallback directive yielded when no rule matches.
    pub fn otherwise(mut self, directive: Directive) -> Self {
        self.fallback = Some(directive);
        self
    }

    /// Selects the directive for a fault, if any rule covers it.
    pub fn decide(&self, error: &Error) -> Option<Directive> {
        self.rules
            .iter()
            .find(|(kind, _)| *kind == error.kind())
            .map(|(_, directive)| *directive)
            .or(self.fallback)
    }
}

/// Which children a selected directive applies to.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize,
)]
pub enum SupervisorScope {
    /// Only the faulting child.
    OneForOne,
    /// Every sibling, the faulting child included.
    AllForOne,
}

/// Aggregate supervision policy: a decider plus a retry budget over a
/// rolling time window.
///
/// Each `Restart` selection consumes one unit of the budget. Once more
/// than `max_retries` restarts fall inside the `within` window, selection
/// converts to `Escalate` instead of retrying again; restarts older than
/// the window no longer count.
#[derive(Clone, Debug)]
pub struct SupervisorStrategy {
    scope: SupervisorScope,
    decider: Decider,
    max_retries: usize,
    within: Duration,
    restarts: VecDeque<Instant>,
}

impl SupervisorStrategy {
    /// Creates a policy applying directives to the faulting child only.
    pub fn one_for_one(
        decider: Decider,
        max_retries: usize,
        within: Duration,
    ) -> Self {
        Self::new(SupervisorScope::OneForOne, decider, max_retries, within)
    }

    /// Creates a policy applying directives to all siblings.
    pub fn all_for_one(
        decider: Decider,
        max_retries: usize,
        within: Duration,
    ) -> Self {
        Self::new(SupervisorScope::AllForOne, decider, max_retries, within)
    }

    fn new(
        scope: SupervisorScope,
        decider: Decider,
        max_retries: usize,
        within: Duration,
    ) -> Self {
        Self {
            scope,
            decider,
            max_retries,
            within,
            restarts: VecDeque::new(),
        }
    }

    /// The configured scope.
    pub fn scope(&self) -> SupervisorScope {
        self.scope
    }

    /// Selects the directive for a fault, charging restarts against the
    /// rolling retry budget.
    pub fn decide(&mut self, error: &Error) -> Option<Directive> {
        let directive = self.decider.decide(error)?;
        if directive != Directive::Restart {
            return Some(directive);
        }
        let now = Instant::now();
        while let Some(oldest) = self.restarts.front() {
            if now.duration_since(*oldest) > self.within {
                self.restarts.pop_front();
            } else {
                break;
            }
        }
        if self.restarts.len() >= self.max_retries {
            return Some(Directive::Escalate);
        }
        self.restarts.push_back(now);
        Some(Directive::Restart)
    }

    /// The children a directive selected for `faulting` applies to,
    /// given the supervisor's current children.
    pub fn affected(
        &self,
        faulting: &ProcessId,
        children: &[ProcessId],
    ) -> Vec<ProcessId> {
        match self.scope {
            SupervisorScope::OneForOne => vec![faulting.clone()],
            SupervisorScope::AllForOne => children.to_vec(),
        }
    }
}
