use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::combat::state::PlayerAction;

/// How long to wait on a still-draining replay before unlocking input anyway.
/// Fail-open: a lost completion signal must not leave the player stuck.
pub const FORCE_UNLOCK_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CycleError {
    #[error("no action request is outstanding")]
    NoPendingRequest,
    #[error("an action was already submitted for this turn")]
    AlreadySubmitted,
    #[error("a switch to a usable Pokemon is required")]
    SwitchRequired,
    #[error("input is locked until the battle resolves")]
    InputLocked,
}

/// The server's outstanding solicitation, minus the snapshots (those go
/// straight into the session).
#[derive(Debug, Clone, Copy)]
pub struct PendingRequest {
    pub turn_number: u32,
    pub can_switch: bool,
    pub must_switch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingChoice,
    Submitted,
    /// A run was sent; everything stays locked until the server answers.
    RunLocked,
}

/// Gates when exactly one committed action may leave per action request.
#[derive(Debug)]
pub struct ActionCycle {
    phase: Phase,
    pending: Option<PendingRequest>,
    /// Request that arrived while the replay was still draining.
    deferred: Option<PendingRequest>,
    unlock_deadline: Option<Instant>,
}

impl Default for ActionCycle {
    fn default() -> Self {
        ActionCycle {
            phase: Phase::Idle,
            pending: None,
            deferred: None,
            unlock_deadline: None,
        }
    }
}

impl ActionCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn awaiting_choice(&self) -> bool {
        self.phase == Phase::AwaitingChoice
    }

    pub fn pending(&self) -> Option<PendingRequest> {
        self.pending.filter(|_| self.phase == Phase::AwaitingChoice)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.unlock_deadline
    }

    /// A new request arrived. Unlocks immediately when the replay is idle;
    /// otherwise defers until drain completion, with a fail-open deadline.
    /// A second request supersedes the first. Returns the request when input
    /// unlocked now.
    pub fn on_request(&mut self, request: PendingRequest, draining: bool, now: Instant) -> Option<PendingRequest> {
        if draining {
            self.deferred = Some(request);
            self.unlock_deadline = Some(now + FORCE_UNLOCK_DELAY);
            None
        } else {
            self.unlock(request)
        }
    }

    /// The replay queue emptied. Promotes a deferred request, or just closes
    /// the submitted turn.
    pub fn on_drain_complete(&mut self) -> Option<PendingRequest> {
        self.unlock_deadline = None;
        match self.deferred.take() {
            Some(request) => self.unlock(request),
            None => {
                if self.phase == Phase::Submitted {
                    self.phase = Phase::Idle;
                }
                None
            }
        }
    }

    /// Fail-open force unlock once the deadline passes, even mid-drain.
    pub fn on_deadline(&mut self, now: Instant) -> Option<PendingRequest> {
        match self.unlock_deadline {
            Some(deadline) if now >= deadline => {}
            _ => return None,
        }
        self.unlock_deadline = None;
        self.deferred.take().and_then(|request| self.unlock(request))
    }

    fn unlock(&mut self, request: PendingRequest) -> Option<PendingRequest> {
        // A fresh request also re-enables input after a run
        self.phase = Phase::AwaitingChoice;
        self.pending = Some(request);
        self.unlock_deadline = None;
        Some(request)
    }

    /// Commits exactly one action for the outstanding request. Local
    /// rejections never reach the transport.
    pub fn submit(&mut self, action: &PlayerAction) -> Result<u32, CycleError> {
        match self.phase {
            Phase::AwaitingChoice => {}
            Phase::Submitted => return Err(CycleError::AlreadySubmitted),
            Phase::RunLocked => return Err(CycleError::InputLocked),
            Phase::Idle => return Err(CycleError::NoPendingRequest),
        }
        let request = self.pending.ok_or(CycleError::NoPendingRequest)?;
        if request.must_switch && !matches!(action, PlayerAction::SwitchPokemon { .. }) {
            return Err(CycleError::SwitchRequired);
        }
        self.phase = if matches!(action, PlayerAction::Run) {
            Phase::RunLocked
        } else {
            Phase::Submitted
        };
        Ok(request.turn_number)
    }

    /// Session teardown.
    pub fn reset(&mut self) {
        *self = ActionCycle::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(turn: u32, must_switch: bool) -> PendingRequest {
        PendingRequest {
            turn_number: turn,
            can_switch: true,
            must_switch,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn one_action_per_request() {
        let mut cycle = ActionCycle::new();
        cycle.on_request(request(3, false), false, Instant::now());

        assert_eq!(cycle.submit(&PlayerAction::UseMove { move_index: 0 }), Ok(3));
        assert_eq!(
            cycle.submit(&PlayerAction::UseMove { move_index: 1 }),
            Err(CycleError::AlreadySubmitted)
        );

        // The next request re-arms
        cycle.on_request(request(4, false), false, Instant::now());
        assert_eq!(cycle.submit(&PlayerAction::UseMove { move_index: 0 }), Ok(4));
    }

    #[tokio::test(start_paused = true)]
    async fn must_switch_rejects_everything_else() {
        let mut cycle = ActionCycle::new();
        cycle.on_request(request(5, true), false, Instant::now());

        assert_eq!(
            cycle.submit(&PlayerAction::UseMove { move_index: 0 }),
            Err(CycleError::SwitchRequired)
        );
        assert_eq!(cycle.submit(&PlayerAction::Run), Err(CycleError::SwitchRequired));
        assert_eq!(cycle.submit(&PlayerAction::SwitchPokemon { team_index: 1 }), Ok(5));
    }

    #[tokio::test(start_paused = true)]
    async fn request_mid_drain_defers_until_completion() {
        let mut cycle = ActionCycle::new();
        let now = Instant::now();
        assert!(cycle.on_request(request(2, false), true, now).is_none());
        assert!(!cycle.awaiting_choice());
        assert_eq!(
            cycle.submit(&PlayerAction::UseMove { move_index: 0 }),
            Err(CycleError::NoPendingRequest)
        );

        let unlocked = cycle.on_drain_complete();
        assert_eq!(unlocked.map(|r| r.turn_number), Some(2));
        assert!(cycle.awaiting_choice());
    }

    #[tokio::test(start_paused = true)]
    async fn force_unlock_after_deadline() {
        let mut cycle = ActionCycle::new();
        let now = Instant::now();
        cycle.on_request(request(7, false), true, now);
        assert_eq!(cycle.deadline(), Some(now + FORCE_UNLOCK_DELAY));

        assert!(cycle.on_deadline(now + Duration::from_millis(500)).is_none());
        let unlocked = cycle.on_deadline(now + FORCE_UNLOCK_DELAY);
        assert_eq!(unlocked.map(|r| r.turn_number), Some(7));
        assert!(cycle.awaiting_choice());
    }

    #[tokio::test(start_paused = true)]
    async fn run_locks_until_next_request() {
        let mut cycle = ActionCycle::new();
        cycle.on_request(request(1, false), false, Instant::now());
        assert_eq!(cycle.submit(&PlayerAction::Run), Ok(1));
        assert_eq!(
            cycle.submit(&PlayerAction::UseMove { move_index: 0 }),
            Err(CycleError::InputLocked)
        );

        cycle.on_request(request(2, false), false, Instant::now());
        assert_eq!(cycle.submit(&PlayerAction::Run), Ok(2));
    }
}
