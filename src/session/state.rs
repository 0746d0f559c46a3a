//! Session state machine.

/// Lifecycle state of a remote shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Bridge spawned, sentinel prompt not yet installed.
    #[default]
    Created,
    /// Sentinel prompt installed; the shell is waiting for a command.
    Ready,
    /// A command exchange is in flight.
    Busy,
    /// Channels released; the session cannot be reused.
    Closed,
}

impl SessionState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Created -> Ready
    /// - Ready -> Busy
    /// - Busy -> Ready
    /// - Created | Ready | Busy -> Closed
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (*self, target),
            (Created, Ready)
                | (Ready, Busy)
                | (Busy, Ready)
                | (Created, Closed)
                | (Ready, Closed)
                | (Busy, Closed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: SessionState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::AdbPtyError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }

    /// Check if the session can accept a command.
    pub fn can_execute(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}
