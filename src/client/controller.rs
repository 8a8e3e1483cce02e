use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::cycle::{ActionCycle, CycleError, PendingRequest};
use crate::client::replay::{DrainStep, EventLogPlayer};
use crate::client::session::{BattleMode, BattleSession, EventDelta, Side};
use crate::combat::state::{BattleOutcome, PlayerAction};
use crate::models::{ClientMessage, ServerMessage};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BattleClientError {
    #[error("no battle in progress")]
    NotInBattle,
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error("switch target is fainted, active or out of range")]
    InvalidSwitchTarget,
}

/// What the presentation layers consume. Carries resolved names and numeric
/// deltas so renderers never re-derive game logic.
#[derive(Debug, Clone)]
pub enum Observation {
    BattleStarted {
        battle_id: Uuid,
        mode: BattleMode,
        opponent_name: String,
    },
    Event(EventDelta),
    ActionRequired {
        turn_number: u32,
        can_switch: bool,
        must_switch: bool,
    },
    BattleEnded {
        outcome: BattleOutcome,
        message: String,
    },
    Info {
        message: String,
    },
}

/// Client-side battle engine: owns the session mirror, the replay queue and
/// the action cycle, and routes inbound messages. All entry points are
/// synchronous; the caller drives timers through `next_deadline` and
/// `on_deadline` from a single task, so no mutation ever overlaps another.
pub struct BattleClient {
    self_id: Option<String>,
    session: Option<BattleSession>,
    replay: EventLogPlayer,
    cycle: ActionCycle,
    ended_battles: Vec<Uuid>,
    observations: UnboundedSender<Observation>,
}

impl BattleClient {
    pub fn new(observations: UnboundedSender<Observation>) -> Self {
        BattleClient {
            self_id: None,
            session: None,
            replay: EventLogPlayer::new(),
            cycle: ActionCycle::new(),
            ended_battles: Vec::new(),
            observations,
        }
    }

    pub fn in_battle(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&BattleSession> {
        self.session.as_ref()
    }

    /// Earliest pending timer across the replay drain and the force unlock.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.replay.deadline(), self.cycle.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    fn observe(&self, observation: Observation) {
        let _ = self.observations.send(observation);
    }

    pub fn handle_message(&mut self, message: ServerMessage, now: Instant) {
        match message {
            ServerMessage::Welcome { id, username } => {
                info!(player_id = %id, %username, "connected");
                self.self_id = Some(id);
            }
            ServerMessage::Pong => {}
            ServerMessage::Error { message } => {
                warn!(%message, "server error");
                self.observe(Observation::Info { message });
            }
            ServerMessage::ChallengeReceived { challenger_username, .. } => {
                self.observe(Observation::Info {
                    message: format!("{} wants to battle!", challenger_username),
                });
            }
            ServerMessage::ChallengeResponse { target_username, accepted, .. } => {
                let verb = if accepted { "accepted" } else { "declined" };
                self.observe(Observation::Info {
                    message: format!("{} {} the challenge.", target_username, verb),
                });
            }
            ServerMessage::ChallengeFailed { reason } => {
                self.observe(Observation::Info { message: reason });
            }
            ServerMessage::WildBattleStart {
                battle_id,
                player_team,
                initial_pokemon,
                wild_pokemon,
                initial_field_state,
            } => {
                if self.session.is_some() {
                    warn!(%battle_id, "battle start received while already in battle, ignoring");
                    return;
                }
                let opponent_name = wild_pokemon.name.clone();
                self.session = Some(BattleSession::new_wild(
                    battle_id,
                    &initial_pokemon,
                    &wild_pokemon,
                    &player_team,
                    initial_field_state,
                ));
                self.observe(Observation::BattleStarted {
                    battle_id,
                    mode: BattleMode::Wild,
                    opponent_name,
                });
            }
            ServerMessage::PvPBattleStart {
                battle_id,
                player_team,
                initial_pokemon,
                opponent_initial_pokemon,
                opponent_team,
                initial_field_state,
                opponent_username,
                opponent_id,
                player1_id,
                player2_id,
                turn_number,
            } => {
                if self.session.is_some() {
                    warn!(%battle_id, "battle start received while already in battle, ignoring");
                    return;
                }
                // Side resolution against the locally known identity; fall
                // back to the opponent id when the welcome never arrived
                let is_player1 = match &self.self_id {
                    Some(id) => *id == player1_id,
                    None => {
                        warn!("self identity unknown, resolving side from opponent id");
                        opponent_id == player2_id
                    }
                };
                self.session = Some(BattleSession::new_pvp(
                    battle_id,
                    &initial_pokemon,
                    &opponent_initial_pokemon,
                    &player_team,
                    &opponent_team,
                    initial_field_state,
                    is_player1,
                    turn_number,
                ));
                self.observe(Observation::BattleStarted {
                    battle_id,
                    mode: BattleMode::PvP,
                    opponent_name: opponent_username,
                });
            }
            ServerMessage::RequestAction {
                battle_id,
                turn_number,
                active_pokemon_state,
                other_pokemon_state,
                team_overview,
                field_state,
                can_switch,
                must_switch,
            } => {
                let Some(session) = self.session.as_mut() else {
                    warn!(%battle_id, "action request with no active battle, dropping");
                    return;
                };
                if session.battle_id != battle_id {
                    warn!(%battle_id, "action request for a different battle, dropping");
                    return;
                }
                session.apply_private_snapshot(&active_pokemon_state);
                session.apply_public_snapshot(&other_pokemon_state);
                session.apply_roster(Side::Player, &team_overview);
                session.field_state = field_state;

                let request = PendingRequest {
                    turn_number,
                    can_switch,
                    must_switch,
                };
                if let Some(unlocked) = self.cycle.on_request(request, self.replay.is_draining(), now) {
                    self.observe_request(unlocked);
                }
            }
            ServerMessage::TurnUpdate {
                battle_id,
                events,
                opponent_pokemon_state,
                ..
            } => {
                let Some(session) = self.session.as_mut() else {
                    warn!(%battle_id, "turn update with no active battle, dropping");
                    return;
                };
                if session.battle_id != battle_id {
                    warn!(%battle_id, "turn update for a different battle, dropping");
                    return;
                }
                if let Some(view) = opponent_pokemon_state {
                    session.apply_public_snapshot(&view);
                }
                let step = self.replay.enqueue(events, now);
                self.advance(step);
            }
            ServerMessage::BattleEnd { outcome, reason, exp_gained, pokemon_captured } => {
                let mut message = end_message(outcome);
                if let Some(exp) = exp_gained {
                    message.push_str(&format!(" Gained {} EXP.", exp));
                }
                if let Some(captured) = &pokemon_captured {
                    message.push_str(&format!(" {} was added to the team.", captured.name));
                }
                info!(?outcome, ?reason, "battle ended");
                self.finish(outcome, message);
            }
            ServerMessage::BattleResult { battle_id, result, exp_gained, .. } => {
                // Legacy terminal signal; first received wins
                if self.ended_battles.contains(&battle_id)
                    && self.session.as_ref().map(|s| s.battle_id) != Some(battle_id)
                {
                    warn!(%battle_id, "second end signal for the same battle, protocol inconsistency");
                    return;
                }
                let outcome = match result {
                    crate::models::BattleResultKind::Win => BattleOutcome::Victory,
                    crate::models::BattleResultKind::Loss => BattleOutcome::Defeat,
                    crate::models::BattleResultKind::Run => BattleOutcome::Escape,
                    crate::models::BattleResultKind::Capture => BattleOutcome::Capture,
                };
                let mut message = end_message(outcome);
                if let Some(exp) = exp_gained {
                    message.push_str(&format!(" Gained {} EXP.", exp));
                }
                self.finish(outcome, message);
            }
        }
    }

    /// A timer fired; advance whichever deadline passed.
    pub fn on_deadline(&mut self, now: Instant) {
        let step = self.replay.on_deadline(now);
        self.advance(step);
        if let Some(request) = self.cycle.on_deadline(now) {
            warn!("drain still active past deadline, force unlocking input");
            self.observe_request(request);
        }
    }

    fn advance(&mut self, step: DrainStep) {
        match step {
            DrainStep::Process(event) => {
                let Some(session) = self.session.as_mut() else {
                    error!("drain step with no session, dropping event");
                    return;
                };
                let delta = session.apply_event(&event);
                self.observe(Observation::Event(delta));
            }
            DrainStep::Completed => {
                if let Some(request) = self.cycle.on_drain_complete() {
                    self.observe_request(request);
                }
            }
            DrainStep::Idle => {}
        }
    }

    fn observe_request(&self, request: PendingRequest) {
        self.observe(Observation::ActionRequired {
            turn_number: request.turn_number,
            can_switch: request.can_switch,
            must_switch: request.must_switch,
        });
    }

    /// Tears the session down: clears the queue, cancels every timer and
    /// emits exactly one terminal observation.
    fn finish(&mut self, outcome: BattleOutcome, message: String) {
        let Some(session) = self.session.take() else {
            warn!("end signal with no active battle, dropping");
            return;
        };
        self.ended_battles.push(session.battle_id);
        self.replay.clear();
        self.cycle.reset();
        self.observe(Observation::BattleEnded { outcome, message });
    }

    /// Commits the player's action for the outstanding request. Rejections
    /// happen locally; the returned message is what goes on the wire.
    pub fn submit(&mut self, action: PlayerAction) -> Result<ClientMessage, BattleClientError> {
        let session = self.session.as_ref().ok_or(BattleClientError::NotInBattle)?;
        if let PlayerAction::SwitchPokemon { team_index } = &action {
            let valid = session
                .get_roster(Side::Player)
                .iter()
                .any(|e| e.team_slot == *team_index && !e.is_fainted)
                && *team_index != session.get_active(Side::Player).team_slot;
            if !valid {
                return Err(BattleClientError::InvalidSwitchTarget);
            }
        }
        self.cycle.submit(&action)?;
        Ok(ClientMessage::CombatAction {
            battle_id: session.battle_id,
            action,
        })
    }
}

fn end_message(outcome: BattleOutcome) -> String {
    match outcome {
        BattleOutcome::Victory => "You won the battle!".to_string(),
        BattleOutcome::Defeat => "You were defeated...".to_string(),
        BattleOutcome::Draw => "Neither side can continue. It's a draw!".to_string(),
        BattleOutcome::Escape => "The battle is over.".to_string(),
        BattleOutcome::Capture => "The Pokemon was caught!".to_string(),
    }
}
