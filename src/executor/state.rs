//! Execution state machine
//!
//! ```text
//! Idle -> FingerprintComputed -> CacheConsulted -> CacheSatisfied -> Completed
//!                 |                     |                |
//!                 +-----------> NetworkPending <---------+ (CacheThenNetwork)
//!                                       |
//!                            Completed | Failed | CacheConsulted (fallback)
//! ```
//!
//! Transitions are driven explicitly by the executor and logged at TRACE
//! with the execution's request id.

use std::time::Instant;

use uuid::Uuid;

use crate::observability::{log_event_with_fields, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Idle,
    FingerprintComputed,
    CacheConsulted,
    CacheSatisfied,
    NetworkPending,
    Completed,
    Failed,
}

impl ExecutionState {
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FingerprintComputed => "fingerprint_computed",
            Self::CacheConsulted => "cache_consulted",
            Self::CacheSatisfied => "cache_satisfied",
            Self::NetworkPending => "network_pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Allowed transitions.
    ///
    /// `Idle -> Failed` covers specs rejected by validation at trigger time.
    pub fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Idle, FingerprintComputed)
                | (Idle, Failed)
                | (FingerprintComputed, CacheConsulted)
                | (FingerprintComputed, NetworkPending)
                | (CacheConsulted, CacheSatisfied)
                | (CacheConsulted, NetworkPending)
                | (CacheConsulted, Failed)
                | (CacheSatisfied, Completed)
                | (CacheSatisfied, NetworkPending)
                | (NetworkPending, Completed)
                | (NetworkPending, Failed)
                | (NetworkPending, CacheConsulted)
        )
    }
}

/// State and history of one execution
#[derive(Debug)]
pub struct ExecutionTrace {
    request_id: Uuid,
    state: ExecutionState,
    history: Vec<ExecutionState>,
    started: Instant,
}

impl ExecutionTrace {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            state: ExecutionState::Idle,
            history: vec![ExecutionState::Idle],
            started: Instant::now(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Every state visited, starting with `Idle`
    pub fn history(&self) -> &[ExecutionState] {
        &self.history
    }

    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    /// Moves to `next`.
    ///
    /// The executor only drives allowed transitions; an illegal one is a bug
    /// and trips a debug assertion.
    pub fn advance(&mut self, next: ExecutionState) {
        let allowed = self.state.can_transition_to(next);
        debug_assert!(
            allowed,
            "illegal execution transition {} -> {}",
            self.state.state_name(),
            next.state_name()
        );

        let request_id = self.request_id.to_string();
        log_event_with_fields(
            Event::QueryState,
            &[
                ("from", self.state.state_name()),
                ("request_id", &request_id),
                ("to", next.state_name()),
            ],
        );

        self.state = next;
        self.history.push(next);
    }
}

impl Default for ExecutionTrace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionState::*;

    #[test]
    fn test_cache_satisfied_path() {
        let mut trace = ExecutionTrace::new();
        for next in [FingerprintComputed, CacheConsulted, CacheSatisfied, Completed] {
            trace.advance(next);
        }
        assert_eq!(trace.state(), Completed);
        assert_eq!(trace.history().len(), 5);
        assert!(trace.state().is_terminal());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for next in [Idle, FingerprintComputed, CacheConsulted, NetworkPending, Completed] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_cache_then_network_path_allowed() {
        assert!(CacheSatisfied.can_transition_to(NetworkPending));
        assert!(NetworkPending.can_transition_to(CacheConsulted));
        assert!(!Idle.can_transition_to(NetworkPending));
    }

    #[test]
    fn test_request_ids_unique() {
        assert_ne!(ExecutionTrace::new().request_id(), ExecutionTrace::new().request_id());
    }

    #[test]
    #[should_panic(expected = "illegal execution transition")]
    #[cfg(debug_assertions)]
    fn test_illegal_transition_asserts() {
        let mut trace = ExecutionTrace::new();
        trace.advance(Completed);
    }
}
