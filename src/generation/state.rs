//! Attempt state machine
//!
//! ```text
//! Idle → Authorizing → CostComputed → CreditChecked → Generating
//!                                                        ↓
//!                        Terminal ← Recorded ← {Succeeded | Failed}
//! ```
//!
//! The gates (`Authorizing`, `CostComputed`, `CreditChecked`) may jump
//! straight to `Terminal`; nothing was charged yet. Once `Generating` is
//! entered the attempt always passes through `Recorded`.

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Authorizing,
    CostComputed,
    CreditChecked,
    Generating,
    Succeeded,
    Failed,
    Recorded,
    Terminal,
}

impl AttemptState {
    pub fn can_advance_to(self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Idle, Authorizing)
                | (Authorizing, CostComputed)
                | (CostComputed, CreditChecked)
                | (CreditChecked, Generating)
                | (Generating, Succeeded)
                | (Generating, Failed)
                | (Succeeded, Recorded)
                | (Failed, Recorded)
                | (Recorded, Terminal)
                | (Authorizing, Terminal)
                | (CostComputed, Terminal)
                | (CreditChecked, Terminal)
        )
    }

    /// Whether the attempt has reached the paid call
    pub fn is_billable(self) -> bool {
        matches!(
            self,
            AttemptState::Generating
                | AttemptState::Succeeded
                | AttemptState::Failed
                | AttemptState::Recorded
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptState::Idle => "idle",
            AttemptState::Authorizing => "authorizing",
            AttemptState::CostComputed => "cost_computed",
            AttemptState::CreditChecked => "credit_checked",
            AttemptState::Generating => "generating",
            AttemptState::Succeeded => "succeeded",
            AttemptState::Failed => "failed",
            AttemptState::Recorded => "recorded",
            AttemptState::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for AttemptState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one attempt's position in the state machine
#[derive(Debug)]
pub struct Attempt {
    id: String,
    state: AttemptState,
}

impl Attempt {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            state: AttemptState::Idle,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> AttemptState {
        self.state
    }

    pub fn advance(&mut self, next: AttemptState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid attempt transition {} -> {}",
            self.state,
            next
        );
        debug!(attempt = %self.id, "{} -> {}", self.state, next);
        self.state = next;
    }
}

impl Default for Attempt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            AttemptState::Idle,
            AttemptState::Authorizing,
            AttemptState::CostComputed,
            AttemptState::CreditChecked,
            AttemptState::Generating,
            AttemptState::Succeeded,
            AttemptState::Recorded,
            AttemptState::Terminal,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_advance_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_generation_cannot_skip_recording() {
        assert!(!AttemptState::Generating.can_advance_to(AttemptState::Terminal));
        assert!(!AttemptState::Failed.can_advance_to(AttemptState::Terminal));
        assert!(AttemptState::Failed.can_advance_to(AttemptState::Recorded));
    }

    #[test]
    fn test_gates_may_terminate_early() {
        assert!(AttemptState::Authorizing.can_advance_to(AttemptState::Terminal));
        assert!(AttemptState::CreditChecked.can_advance_to(AttemptState::Terminal));
        assert!(!AttemptState::Idle.can_advance_to(AttemptState::Generating));
    }

    #[test]
    fn test_billable_states() {
        assert!(!AttemptState::CreditChecked.is_billable());
        assert!(AttemptState::Generating.is_billable());
        assert!(AttemptState::Recorded.is_billable());
    }

    #[test]
    fn test_attempt_tracks_state() {
        let mut attempt = Attempt::new();
        assert_eq!(attempt.state(), AttemptState::Idle);
        attempt.advance(AttemptState::Authorizing);
        assert_eq!(attempt.state(), AttemptState::Authorizing);
        assert!(!attempt.id().is_empty());
    }
}
