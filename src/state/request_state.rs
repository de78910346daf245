/// Request state definitions for the failover state machine
///
/// This module defines all states a request context can be in, and which
/// transitions between them are legal.
use std::fmt;

/// Represents the current state of a request context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    // ===== Active States =====
    /// Context created, not yet dispatched
    Pending,

    /// Request handed to the fetcher, awaiting an outcome
    InFlight,

    /// Fetch failed; the same URL will be re-dispatched after the retry delay
    Retrying,

    /// Retries exhausted; the next alternative link will be dispatched
    AdvancingAlternative,

    // ===== Terminal States =====
    /// Page fetched with a 2xx status
    Succeeded,

    /// Retries and alternatives exhausted
    TerminallyFailed,
}

impl RequestState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::TerminallyFailed)
    }

    /// Returns true if the context may be dispatched from this state
    pub fn is_dispatchable(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Retrying | Self::AdvancingAlternative
        )
    }

    /// Returns true if moving from `self` to `next` is a legal transition
    ///
    /// ```text
    /// Pending ──► InFlight ──► Succeeded
    ///               │  ▲
    ///               │  └──── Retrying / AdvancingAlternative
    ///               ├──► Retrying
    ///               ├──► AdvancingAlternative
    ///               └──► TerminallyFailed
    /// ```
    pub fn can_transition_to(&self, next: RequestState) -> bool {
        match self {
            Self::Pending | Self::Retrying | Self::AdvancingAlternative => {
                next == Self::InFlight
            }
            Self::InFlight => matches!(
                next,
                Self::Succeeded
                    | Self::Retrying
                    | Self::AdvancingAlternative
                    | Self::TerminallyFailed
            ),
            Self::Succeeded | Self::TerminallyFailed => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Retrying => "retrying",
            Self::AdvancingAlternative => "advancing_alternative",
            Self::Succeeded => "succeeded",
            Self::TerminallyFailed => "terminally_failed",
        }
    }

    /// Returns all possible request states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Pending,
            Self::InFlight,
            Self::Retrying,
            Self::AdvancingAlternative,
            Self::Succeeded,
            Self::TerminallyFailed,
        ]
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!RequestState::Pending.is_terminal());
        assert!(!RequestState::InFlight.is_terminal());
        assert!(!RequestState::Retrying.is_terminal());
        assert!(!RequestState::AdvancingAlternative.is_terminal());

        assert!(RequestState::Succeeded.is_terminal());
        assert!(RequestState::TerminallyFailed.is_terminal());
    }

    #[test]
    fn test_dispatchable_states_only_lead_to_in_flight() {
        for state in RequestState::all_states() {
            if state.is_dispatchable() {
                for next in RequestState::all_states() {
                    assert_eq!(
                        state.can_transition_to(next),
                        next == RequestState::InFlight,
                        "{} -> {}",
                        state,
                        next
                    );
                }
            }
        }
    }

    #[test]
    fn test_in_flight_outcomes() {
        let from = RequestState::InFlight;
        assert!(from.can_transition_to(RequestState::Succeeded));
        assert!(from.can_transition_to(RequestState::Retrying));
        assert!(from.can_transition_to(RequestState::AdvancingAlternative));
        assert!(from.can_transition_to(RequestState::TerminallyFailed));
        assert!(!from.can_transition_to(RequestState::Pending));
        assert!(!from.can_transition_to(RequestState::InFlight));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [RequestState::Succeeded, RequestState::TerminallyFailed] {
            for next in RequestState::all_states() {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(RequestState::InFlight.to_string(), "in_flight");
        assert_eq!(
            RequestState::AdvancingAlternative.to_string(),
            "advancing_alternative"
        );
    }

    #[test]
    fn test_all_states_unique_strings() {
        let states = RequestState::all_states();
        let mut names: Vec<_> = states.iter().map(|s| s.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), states.len());
    }
}
