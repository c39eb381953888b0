//! One-way state machines
//!
//! [`AuthState`] tracks the authentication lifecycle of the access
//! controller and [`WatcherState`] the polling lifecycle of a watcher.
//! Both have a terminal state that no transition may leave.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// AuthState
// ============================================================================

/// Authentication lifecycle of the access controller
///
/// ```text
/// Unauthenticated ──→ SigningIn ──→ Authenticated
///        ↑  │              │  │            │
///        │  └──(restored)──┼──┼──→─────────┘
///        └─────────────────┘  │    (refresh failed)
///                             ↓
///                     PermanentlyDenied (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AuthState {
    /// No session; the next operation restores or signs in
    #[default]
    Unauthenticated,
    /// The interactive consent step is in progress
    SigningIn,
    /// A usable session exists
    Authenticated,
    /// The user declined or the provider refused consent; terminal
    PermanentlyDenied,
}

impl AuthState {
    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::Unauthenticated => "Unauthenticated",
            AuthState::SigningIn => "SigningIn",
            AuthState::Authenticated => "Authenticated",
            AuthState::PermanentlyDenied => "PermanentlyDenied",
        }
    }

    /// Returns true for the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::PermanentlyDenied)
    }

    /// Checks if a transition to the target state is valid
    pub fn can_transition_to(&self, target: AuthState) -> bool {
        matches!(
            (self, target),
            (AuthState::Unauthenticated, AuthState::SigningIn)
                | (AuthState::Unauthenticated, AuthState::Authenticated)
                | (AuthState::SigningIn, AuthState::Authenticated)
                | (AuthState::SigningIn, AuthState::Unauthenticated)
                | (AuthState::SigningIn, AuthState::PermanentlyDenied)
                | (AuthState::Authenticated, AuthState::Unauthenticated)
        )
    }

    /// Moves to `target`, rejecting transitions the lifecycle does not allow
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidState`] for a disallowed transition,
    /// including any attempt to leave `PermanentlyDenied`
    pub fn transition_to(&mut self, target: AuthState) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl Display for AuthState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// WatcherState
// ============================================================================

/// Polling lifecycle of a change watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WatcherState {
    /// Not polling
    #[default]
    Idle,
    /// The scheduler is armed
    Scheduled,
    /// Access was revoked; polling is disabled for good
    Locked,
}

impl WatcherState {
    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            WatcherState::Idle => "Idle",
            WatcherState::Scheduled => "Scheduled",
            WatcherState::Locked => "Locked",
        }
    }

    /// Checks if a transition to the target state is valid
    pub fn can_transition_to(&self, target: WatcherState) -> bool {
        !matches!(self, WatcherState::Locked) && *self != target
    }

    /// Moves to `target`
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidState`] when leaving `Locked` or when
    /// the target equals the current state
    pub fn transition_to(&mut self, target: WatcherState) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl Display for WatcherState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_AUTH: [AuthState; 4] = [
        AuthState::Unauthenticated,
        AuthState::SigningIn,
        AuthState::Authenticated,
        AuthState::PermanentlyDenied,
    ];

    #[test]
    fn test_auth_default_is_unauthenticated() {
        assert_eq!(AuthState::default(), AuthState::Unauthenticated);
    }

    #[test]
    fn test_auth_sign_in_path() {
        let mut state = AuthState::Unauthenticated;
        state.transition_to(AuthState::SigningIn).unwrap();
        state.transition_to(AuthState::Authenticated).unwrap();
        assert_eq!(state, AuthState::Authenticated);
    }

    #[test]
    fn test_auth_restore_skips_signing_in() {
        let mut state = AuthState::Unauthenticated;
        assert!(state.transition_to(AuthState::Authenticated).is_ok());
    }

    #[test]
    fn test_auth_denied_is_terminal() {
        let mut state = AuthState::SigningIn;
        state.transition_to(AuthState::PermanentlyDenied).unwrap();
        assert!(state.is_terminal());

        for target in ALL_AUTH {
            assert!(!state.can_transition_to(target));
            let err = state.transition_to(target).unwrap_err();
            assert!(matches!(err, DomainError::InvalidState { .. }));
        }
        assert_eq!(state, AuthState::PermanentlyDenied);
    }

    #[test]
    fn test_auth_denial_only_from_signing_in() {
        assert!(!AuthState::Unauthenticated.can_transition_to(AuthState::PermanentlyDenied));
        assert!(!AuthState::Authenticated.can_transition_to(AuthState::PermanentlyDenied));
        assert!(AuthState::SigningIn.can_transition_to(AuthState::PermanentlyDenied));
    }

    #[test]
    fn test_auth_invalid_transition_message() {
        let mut state = AuthState::Authenticated;
        let err = state.transition_to(AuthState::SigningIn).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state transition from Authenticated to SigningIn"
        );
    }

    #[test]
    fn test_watcher_start_stop_cycle() {
        let mut state = WatcherState::Idle;
        state.transition_to(WatcherState::Scheduled).unwrap();
        state.transition_to(WatcherState::Idle).unwrap();
        assert_eq!(state, WatcherState::Idle);
    }

    #[test]
    fn test_watcher_lock_from_any_state() {
        for from in [WatcherState::Idle, WatcherState::Scheduled] {
            let mut state = from;
            state.transition_to(WatcherState::Locked).unwrap();
            assert_eq!(state, WatcherState::Locked);
        }
    }

    #[test]
    fn test_watcher_locked_is_terminal() {
        let mut state = WatcherState::Locked;
        assert!(state.transition_to(WatcherState::Scheduled).is_err());
        assert!(state.transition_to(WatcherState::Idle).is_err());
        assert_eq!(state, WatcherState::Locked);
    }
}
