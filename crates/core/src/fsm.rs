//! Table-driven state machines.
//!
//! Each machine declares its legal transitions as a static table of
//! [`Rule`]s, so the full transition set can be audited (and tested) in one
//! place. Applying a transition is pure: it returns the target state and
//! leaves side effects to the caller.

use std::fmt;

use thiserror::Error;

/// A single row of a transition table.
pub struct Rule<M: StateMachine> {
    /// The transition this rule describes.
    pub transition: M::Transition,
    /// States the transition may start from.
    pub from: &'static [M::State],
    /// State the subject ends up in.
    pub to: M::State,
    /// Optional precondition over the subject's fields.
    pub guard: Option<fn(&M::Subject) -> Result<(), String>>,
}

/// A finite state machine over some subject (a contract, a payment).
pub trait StateMachine: Sized + 'static {
    /// The state enum.
    type State: Copy + Eq + fmt::Display + 'static;
    /// The transition enum.
    type Transition: Copy + Eq + fmt::Display + 'static;
    /// The entity whose status this machine governs.
    type Subject;

    /// Entity name used in error messages.
    const ENTITY: &'static str;

    /// The transition table.
    fn rules() -> &'static [Rule<Self>];

    /// Reads the current state from the subject.
    fn state_of(subject: &Self::Subject) -> Self::State;

    /// Looks up the rule for a transition.
    fn rule(transition: Self::Transition) -> Option<&'static Rule<Self>> {
        Self::rules().iter().find(|r| r.transition == transition)
    }

    /// Returns true if `transition` is legal from `state` (ignoring guards).
    fn can_transition(state: Self::State, transition: Self::Transition) -> bool {
        Self::rule(transition).is_some_and(|r| r.from.contains(&state))
    }

    /// Lists the transitions legal from `state` (ignoring guards).
    fn available(state: Self::State) -> Vec<Self::Transition> {
        Self::rules()
            .iter()
            .filter(|r| r.from.contains(&state))
            .map(|r| r.transition)
            .collect()
    }

    /// Validates `transition` against the subject and returns the target state.
    ///
    /// Validation precedes mutation: the subject is never modified here.
    fn apply(
        subject: &Self::Subject,
        transition: Self::Transition,
    ) -> Result<Self::State, TransitionError> {
        let current = Self::state_of(subject);
        let Some(rule) = Self::rule(transition) else {
            return Err(TransitionError::Illegal {
                entity: Self::ENTITY,
                from: current.to_string(),
                transition: transition.to_string(),
                allowed: String::new(),
            });
        };

        if !rule.from.contains(&current) {
            return Err(TransitionError::Illegal {
                entity: Self::ENTITY,
                from: current.to_string(),
                transition: transition.to_string(),
                allowed: rule
                    .from
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }

        if let Some(guard) = rule.guard {
            guard(subject).map_err(|reason| TransitionError::GuardFailed {
                entity: Self::ENTITY,
                transition: transition.to_string(),
                reason,
            })?;
        }

        Ok(rule.to)
    }
}

/// A transition was requested that the machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The subject is not in a state the transition may start from.
    #[error("Cannot {transition} {entity} in status {from} (allowed from: {allowed})")]
    Illegal {
        /// The entity kind ("contract", "payment").
        entity: &'static str,
        /// The current state.
        from: String,
        /// The requested transition.
        transition: String,
        /// Comma-separated states the transition is allowed from.
        allowed: String,
    },

    /// The state allows the transition but a precondition on the subject failed.
    #[error("Cannot {transition} {entity}: {reason}")]
    GuardFailed {
        /// The entity kind.
        entity: &'static str,
        /// The requested transition.
        transition: String,
        /// Why the guard rejected the subject.
        reason: String,
    },
}

impl TransitionError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Illegal { .. } => "INVALID_TRANSITION",
            Self::GuardFailed { .. } => "TRANSITION_PRECONDITION_FAILED",
        }
    }
}
