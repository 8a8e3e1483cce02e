use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::combat::state::BattleEvent;

/// Fixed spacing between drained events. One message on screen at a time.
pub const EVENT_DELAY: Duration = Duration::from_millis(1500);

/// What the caller must do after poking the player.
#[derive(Debug)]
pub enum DrainStep {
    /// Apply this event to the session now.
    Process(BattleEvent),
    /// The queue emptied; the drain is complete.
    Completed,
    /// Nothing to do.
    Idle,
}

/// Ordered, rate-limited replay queue. Batches arrive together over the
/// network; events leave one at a time, `EVENT_DELAY` apart, preserving
/// global order across batches. The caller owns the timer: it reads
/// `deadline()` and calls `on_deadline` when it passes.
#[derive(Debug, Default)]
pub struct EventLogPlayer {
    queue: VecDeque<BattleEvent>,
    deadline: Option<Instant>,
    draining: bool,
}

impl EventLogPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Appends a batch. When idle and the batch is non-empty, the head is
    /// released immediately and the next step is scheduled. An empty batch
    /// while idle completes synchronously; it is a no-op turn, not a stall.
    pub fn enqueue(&mut self, events: Vec<BattleEvent>, now: Instant) -> DrainStep {
        self.queue.extend(events);
        if self.draining {
            return DrainStep::Idle;
        }
        match self.queue.pop_front() {
            Some(event) => {
                self.draining = true;
                self.deadline = Some(now + EVENT_DELAY);
                DrainStep::Process(event)
            }
            None => DrainStep::Completed,
        }
    }

    /// Advances the drain once its deadline has passed.
    pub fn on_deadline(&mut self, now: Instant) -> DrainStep {
        if !self.draining {
            return DrainStep::Idle;
        }
        match self.deadline {
            Some(deadline) if now >= deadline => {}
            _ => return DrainStep::Idle,
        }
        match self.queue.pop_front() {
            Some(event) => {
                self.deadline = Some(now + EVENT_DELAY);
                DrainStep::Process(event)
            }
            None => {
                self.draining = false;
                self.deadline = None;
                DrainStep::Completed
            }
        }
    }

    /// Session teardown: drop queued events and cancel the pending step.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadline = None;
        self.draining = false;
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::state::BattleEntityRef;

    fn event(n: u32) -> BattleEvent {
        BattleEvent::TurnStart { turn_number: n }
    }

    fn turn_of(step: DrainStep) -> u32 {
        match step {
            DrainStep::Process(BattleEvent::TurnStart { turn_number }) => turn_number,
            other => panic!("expected process step, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_completes_synchronously() {
        let mut player = EventLogPlayer::new();
        let step = player.enqueue(vec![], Instant::now());
        assert!(matches!(step, DrainStep::Completed));
        assert!(!player.is_draining());
        assert!(player.deadline().is_none(), "no timer for a no-op turn");
    }

    #[tokio::test(start_paused = true)]
    async fn batches_drain_in_concatenation_order() {
        let mut player = EventLogPlayer::new();
        let now = Instant::now();
        let first = player.enqueue(vec![event(1), event(2)], now);
        assert_eq!(turn_of(first), 1);

        // Second batch lands mid-drain; must follow, never interleave
        player.enqueue(vec![event(3), event(4)], now);

        let mut seen = Vec::new();
        let mut now = now;
        loop {
            now += EVENT_DELAY;
            match player.on_deadline(now) {
                DrainStep::Process(BattleEvent::TurnStart { turn_number }) => seen.push(turn_number),
                DrainStep::Completed => break,
                other => panic!("unexpected step {:?}", other),
            }
        }
        assert_eq!(seen, vec![2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_paces_at_event_delay() {
        let mut player = EventLogPlayer::new();
        let start = Instant::now();
        let step = player.enqueue(
            vec![
                BattleEvent::DamageDealt {
                    target: BattleEntityRef::Wild,
                    damage: 60,
                    new_hp: 40,
                    max_hp: 100,
                    effectiveness: 1.0,
                    is_critical: false,
                },
                BattleEvent::PokemonFainted { target: BattleEntityRef::Wild },
            ],
            start,
        );
        assert!(matches!(step, DrainStep::Process(BattleEvent::DamageDealt { .. })));
        assert_eq!(player.deadline(), Some(start + EVENT_DELAY));

        // Too early: nothing released
        assert!(matches!(player.on_deadline(start + Duration::from_millis(100)), DrainStep::Idle));

        let step = player.on_deadline(start + EVENT_DELAY);
        assert!(matches!(step, DrainStep::Process(BattleEvent::PokemonFainted { .. })));

        // Completion lands one EVENT_DELAY after the last event, ~3000ms in
        let step = player.on_deadline(start + EVENT_DELAY * 2);
        assert!(matches!(step, DrainStep::Completed));
        assert!(!player.is_draining());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_pending_steps() {
        let mut player = EventLogPlayer::new();
        let now = Instant::now();
        player.enqueue(vec![event(1), event(2), event(3)], now);
        assert!(player.is_draining());

        player.clear();
        assert_eq!(player.queued(), 0);
        assert!(player.deadline().is_none());
        assert!(matches!(player.on_deadline(now + EVENT_DELAY), DrainStep::Idle));
    }
}
