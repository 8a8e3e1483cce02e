use std::sync::Arc;

use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::combat::logic::pvp_battle::{process_pvp_forced_switch, process_pvp_turn, PvPEnd};
use crate::combat::logic::wild_battle::{process_forced_switch, process_turn};
use crate::combat::moves::MoveRepository;
use crate::combat::state::{
    BattleEndReason, BattleOutcome, BattlePhase, BattlePlayer, BattlePokemonPrivateView,
    BattlePokemonPublicView, BattlePokemonTeamOverview, BattlePvPPhase, PlayerAction,
    PvPBattleState, WildBattleState,
};
use crate::models::{BattleResultKind, ServerMessage};
use crate::registry::PlayerRegistry;

const TEAM_SIZE: usize = 3;
const PLAYER_LEVEL_RANGE: std::ops::RangeInclusive<u32> = 12..=18;
const WILD_LEVEL_RANGE: std::ops::RangeInclusive<u32> = 5..=15;

/// Owns every active battle and drives the request/response cycle with
/// connected players through the registry.
pub struct BattleManager {
    wild_battles: DashMap<Uuid, Arc<Mutex<WildBattleState>>>,
    pvp_battles: DashMap<Uuid, Arc<Mutex<PvPBattleState>>>,
    player_battles: DashMap<String, Uuid>,
    pending_challenges: DashMap<String, String>,
    move_repository: Arc<MoveRepository>,
    registry: Arc<PlayerRegistry>,
}

impl BattleManager {
    pub fn new(move_repository: Arc<MoveRepository>, registry: Arc<PlayerRegistry>) -> Self {
        BattleManager {
            wild_battles: DashMap::new(),
            pvp_battles: DashMap::new(),
            player_battles: DashMap::new(),
            pending_challenges: DashMap::new(),
            move_repository,
            registry,
        }
    }

    pub fn is_in_battle(&self, player_id: &str) -> bool {
        self.player_battles.contains_key(player_id)
    }

    fn generate_team<R: Rng>(&self, rng: &mut R) -> Vec<crate::combat::state::BattlePokemon> {
        let species = self.move_repository.species_ids();
        if species.is_empty() {
            return Vec::new();
        }
        let mut team = Vec::with_capacity(TEAM_SIZE);
        for position in 0..TEAM_SIZE {
            let template_id = species[rng.gen_range(0..species.len())];
            let level = rng.gen_range(PLAYER_LEVEL_RANGE);
            if let Some(mon) = self.move_repository.build_pokemon(template_id, level, position, false) {
                team.push(mon);
            }
        }
        team
    }

    /// Starts a wild encounter for the player. A player already in a battle
    /// keeps that battle; the duplicate request is dropped with a log line.
    pub async fn start_wild_battle(&self, player_id: &str) -> Result<(), String> {
        if self.is_in_battle(player_id) {
            warn!(player_id, "wild battle requested while already in battle, ignoring");
            return Ok(());
        }
        let username = self
            .registry
            .username_of(player_id)
            .ok_or_else(|| "player not connected".to_string())?;

        let mut rng = SmallRng::from_entropy();
        let team = self.generate_team(&mut rng);
        if team.is_empty() {
            return Err("no species available to build a team".to_string());
        }
        let species = self.move_repository.species_ids();
        if species.is_empty() {
            return Err("no species available for a wild encounter".to_string());
        }
        let wild_template = species[rng.gen_range(0..species.len())];
        let wild_level = rng.gen_range(WILD_LEVEL_RANGE);
        let wild = self
            .move_repository
            .build_pokemon(wild_template, wild_level, 0, true)
            .ok_or_else(|| "unknown wild species".to_string())?;

        let battle_id = Uuid::new_v4();
        let player = BattlePlayer::new(player_id, &username, team);
        let state = WildBattleState::new(battle_id, player, wild, self.move_repository.clone());

        let start = ServerMessage::WildBattleStart {
            battle_id,
            player_team: state
                .player
                .team
                .iter()
                .map(BattlePokemonTeamOverview::from_battle_pokemon)
                .collect(),
            initial_pokemon: BattlePokemonPrivateView::from_battle_pokemon(
                state.player.active(),
                &self.move_repository,
            ),
            wild_pokemon: BattlePokemonPublicView::from_battle_pokemon(&state.wild_pokemon),
            initial_field_state: state.field_state.clone(),
        };
        let request = self.wild_action_request(&state);

        self.wild_battles.insert(battle_id, Arc::new(Mutex::new(state)));
        self.player_battles.insert(player_id.to_string(), battle_id);
        info!(player_id, %battle_id, "wild battle started");

        self.registry.send_to_player(player_id, start);
        self.registry.send_to_player(player_id, request);
        Ok(())
    }

    /// Sends a PvP challenge. Failures go back to the challenger as
    /// `challenge_failed` rather than an error.
    pub async fn challenge_player(&self, challenger_id: &str, target_id: &str) {
        let fail = |reason: &str| {
            self.registry.send_to_player(
                challenger_id,
                ServerMessage::ChallengeFailed {
                    reason: reason.to_string(),
                },
            );
        };
        if challenger_id == target_id {
            fail("cannot challenge yourself");
            return;
        }
        if !self.registry.is_online(target_id) {
            fail("player is not online");
            return;
        }
        if self.is_in_battle(challenger_id) || self.is_in_battle(target_id) {
            fail("player is already in a battle");
            return;
        }
        let challenger_username = self
            .registry
            .username_of(challenger_id)
            .unwrap_or_default();
        self.pending_challenges
            .insert(target_id.to_string(), challenger_id.to_string());
        self.registry.send_to_player(
            target_id,
            ServerMessage::ChallengeReceived {
                challenger_id: challenger_id.to_string(),
                challenger_username,
            },
        );
    }

    pub async fn respond_to_challenge(&self, responder_id: &str, challenger_id: &str, accepted: bool) {
        let valid = self
            .pending_challenges
            .remove(responder_id)
            .map(|(_, stored)| stored == challenger_id)
            .unwrap_or(false);
        if !valid {
            self.registry.send_to_player(
                responder_id,
                ServerMessage::Error {
                    message: "no pending challenge from that player".to_string(),
                },
            );
            return;
        }
        let responder_username = self.registry.username_of(responder_id).unwrap_or_default();
        self.registry.send_to_player(
            challenger_id,
            ServerMessage::ChallengeResponse {
                target_player_id: responder_id.to_string(),
                target_username: responder_username,
                accepted,
            },
        );
        if accepted {
            self.start_pvp_battle(challenger_id, responder_id).await;
        }
    }

    async fn start_pvp_battle(&self, player1_id: &str, player2_id: &str) {
        if self.is_in_battle(player1_id) || self.is_in_battle(player2_id) {
            warn!(player1_id, player2_id, "pvp battle requested while a side is busy, ignoring");
            return;
        }
        let (Some(name1), Some(name2)) = (
            self.registry.username_of(player1_id),
            self.registry.username_of(player2_id),
        ) else {
            return;
        };

        let mut rng = SmallRng::from_entropy();
        let team1 = self.generate_team(&mut rng);
        let team2 = self.generate_team(&mut rng);
        if team1.is_empty() || team2.is_empty() {
            warn!(player1_id, player2_id, "no species available to build pvp teams");
            return;
        }
        let battle_id = Uuid::new_v4();
        let player1 = BattlePlayer::new(player1_id, &name1, team1);
        let player2 = BattlePlayer::new(player2_id, &name2, team2);
        let state = PvPBattleState::new(battle_id, player1, player2, self.move_repository.clone());

        for (me, opponent) in [(&state.player1, &state.player2), (&state.player2, &state.player1)] {
            self.registry.send_to_player(
                &me.player_id,
                ServerMessage::PvPBattleStart {
                    battle_id,
                    player_team: me
                        .team
                        .iter()
                        .map(BattlePokemonTeamOverview::from_battle_pokemon)
                        .collect(),
                    initial_pokemon: BattlePokemonPrivateView::from_battle_pokemon(
                        me.active(),
                        &self.move_repository,
                    ),
                    opponent_initial_pokemon: BattlePokemonPublicView::from_battle_pokemon(
                        opponent.active(),
                    ),
                    opponent_team: opponent
                        .team
                        .iter()
                        .map(BattlePokemonTeamOverview::from_battle_pokemon)
                        .collect(),
                    initial_field_state: state.field_state.clone(),
                    opponent_username: opponent.name.clone(),
                    opponent_id: opponent.player_id.clone(),
                    player1_id: player1_id.to_string(),
                    player2_id: player2_id.to_string(),
                    turn_number: Some(state.turn_number),
                },
            );
            self.registry
                .send_to_player(&me.player_id, self.pvp_action_request(&state, me));
        }

        self.player_battles.insert(player1_id.to_string(), battle_id);
        self.player_battles.insert(player2_id.to_string(), battle_id);
        self.pvp_battles.insert(battle_id, Arc::new(Mutex::new(state)));
        info!(player1_id, player2_id, %battle_id, "pvp battle started");
    }

    /// Entry point for a `combat_action` message.
    pub async fn handle_player_action(
        &self,
        player_id: &str,
        battle_id: Uuid,
        action: PlayerAction,
    ) -> Result<(), String> {
        let owned = self
            .player_battles
            .get(player_id)
            .map(|id| *id == battle_id)
            .unwrap_or(false);
        if !owned {
            return Err("no such battle for this player".to_string());
        }
        if let Some(battle) = self.wild_battles.get(&battle_id).map(|b| b.clone()) {
            self.handle_wild_action(player_id, battle, action).await
        } else if let Some(battle) = self.pvp_battles.get(&battle_id).map(|b| b.clone()) {
            self.handle_pvp_action(player_id, battle, action).await
        } else {
            Err("battle no longer active".to_string())
        }
    }

    async fn handle_wild_action(
        &self,
        player_id: &str,
        battle: Arc<Mutex<WildBattleState>>,
        action: PlayerAction,
    ) -> Result<(), String> {
        let mut state = battle.lock().await;
        validate_action(&state.player, state_phase_accepts_wild(&state, &action), &action, false)?;

        if state.battle_phase == BattlePhase::WaitingForSwitch {
            let PlayerAction::SwitchPokemon { team_index } = action else {
                return Err("a replacement Pokemon is required".to_string());
            };
            let events = process_forced_switch(&mut state, team_index);
            self.registry.send_to_player(
                player_id,
                ServerMessage::TurnUpdate {
                    battle_id: state.battle_id,
                    turn_number: state.turn_number,
                    events,
                    opponent_pokemon_state: Some(BattlePokemonPublicView::from_battle_pokemon(
                        &state.wild_pokemon,
                    )),
                },
            );
            self.registry
                .send_to_player(player_id, self.wild_action_request(&state));
            return Ok(());
        }

        state.player_action = Some(action);
        state.battle_phase = BattlePhase::ProcessingTurn;
        let mut rng = SmallRng::from_entropy();
        let summary = process_turn(&mut state, &mut rng);

        self.registry.send_to_player(
            player_id,
            ServerMessage::TurnUpdate {
                battle_id: state.battle_id,
                turn_number: state.turn_number,
                events: summary.events,
                opponent_pokemon_state: Some(BattlePokemonPublicView::from_battle_pokemon(
                    &state.wild_pokemon,
                )),
            },
        );

        match summary.ended {
            Some((outcome, reason)) => {
                let battle_id = state.battle_id;
                let exp_gained = (outcome == BattleOutcome::Victory).then(|| {
                    self.move_repository
                        .exp_yield(state.wild_pokemon.template_id, state.wild_pokemon.level)
                });
                let captured = (outcome == BattleOutcome::Capture)
                    .then(|| BattlePokemonPublicView::from_battle_pokemon(&state.wild_pokemon));
                drop(state);
                self.finish_wild_battle(player_id, battle_id, outcome, reason, exp_gained, captured);
            }
            None => {
                self.registry
                    .send_to_player(player_id, self.wild_action_request(&state));
            }
        }
        Ok(())
    }

    async fn handle_pvp_action(
        &self,
        player_id: &str,
        battle: Arc<Mutex<PvPBattleState>>,
        action: PlayerAction,
    ) -> Result<(), String> {
        if matches!(action, PlayerAction::Run | PlayerAction::UseItem { .. }) {
            return Err("that action is not available in a trainer battle".to_string());
        }
        let mut state = battle.lock().await;
        let is_player1 = state.player1.player_id == player_id;
        {
            let me = state
                .get_player_by_id(player_id)
                .ok_or_else(|| "not part of this battle".to_string())?;
            validate_action(me, pvp_phase_accepts(&state, is_player1), &action, true)?;
        }

        match state.battle_phase {
            BattlePvPPhase::WaitingForPlayer1Switch | BattlePvPPhase::WaitingForPlayer2Switch => {
                let PlayerAction::SwitchPokemon { team_index } = action else {
                    return Err("a replacement Pokemon is required".to_string());
                };
                let events = process_pvp_forced_switch(&mut state, player_id, team_index);
                self.broadcast_pvp_update(&state, events);
                if state.battle_phase == BattlePvPPhase::WaitingForBothPlayersActions {
                    self.request_pvp_actions(&state);
                } else {
                    self.request_pvp_switch(&state);
                }
                return Ok(());
            }
            BattlePvPPhase::WaitingForBothPlayersActions => {
                if is_player1 {
                    if state.player1_action.is_some() {
                        return Err("action already submitted for this turn".to_string());
                    }
                    state.player1_action = Some(action);
                } else {
                    if state.player2_action.is_some() {
                        return Err("action already submitted for this turn".to_string());
                    }
                    state.player2_action = Some(action);
                }
            }
            _ => return Err("battle is not waiting for actions".to_string()),
        }

        if !state.ready_for_processing() {
            return Ok(());
        }

        let mut rng = SmallRng::from_entropy();
        let summary = process_pvp_turn(&mut state, &mut rng);
        self.broadcast_pvp_update(&state, summary.events);

        match summary.ended {
            Some(end) => {
                let battle_id = state.battle_id;
                let p1 = state.player1.player_id.clone();
                let p2 = state.player2.player_id.clone();
                drop(state);
                self.finish_pvp_battle(battle_id, &p1, &p2, end);
            }
            None => match state.battle_phase {
                BattlePvPPhase::WaitingForBothPlayersActions => self.request_pvp_actions(&state),
                _ => self.request_pvp_switch(&state),
            },
        }
        Ok(())
    }

    /// Tears down whatever battle the player is in when their socket drops.
    pub async fn handle_disconnect(&self, player_id: &str) {
        self.pending_challenges.remove(player_id);
        let Some((_, battle_id)) = self.player_battles.remove(player_id) else {
            return;
        };
        if self.wild_battles.remove(&battle_id).is_some() {
            info!(player_id, %battle_id, "wild battle abandoned on disconnect");
            return;
        }
        if let Some((_, battle)) = self.pvp_battles.remove(&battle_id) {
            let state = battle.lock().await;
            let opponent_id = if state.player1.player_id == player_id {
                state.player2.player_id.clone()
            } else {
                state.player1.player_id.clone()
            };
            drop(state);
            self.player_battles.remove(&opponent_id);
            info!(player_id, %battle_id, "pvp battle ended on disconnect");
            self.registry.send_to_player(
                &opponent_id,
                ServerMessage::BattleEnd {
                    outcome: BattleOutcome::Victory,
                    reason: BattleEndReason::OpponentDisconnected,
                    exp_gained: None,
                    pokemon_captured: None,
                },
            );
            self.registry.send_to_player(
                &opponent_id,
                ServerMessage::BattleResult {
                    battle_id,
                    result: BattleResultKind::Win,
                    exp_gained: None,
                    pokemon_caught: None,
                },
            );
        }
    }

    fn finish_wild_battle(
        &self,
        player_id: &str,
        battle_id: Uuid,
        outcome: BattleOutcome,
        reason: BattleEndReason,
        exp_gained: Option<u32>,
        captured: Option<BattlePokemonPublicView>,
    ) {
        self.wild_battles.remove(&battle_id);
        self.player_battles.remove(player_id);
        info!(player_id, %battle_id, ?outcome, "wild battle finished");
        self.registry.send_to_player(
            player_id,
            ServerMessage::BattleEnd {
                outcome,
                reason,
                exp_gained,
                pokemon_captured: captured.clone(),
            },
        );
        self.registry.send_to_player(
            player_id,
            ServerMessage::BattleResult {
                battle_id,
                result: result_kind(outcome),
                exp_gained,
                pokemon_caught: captured,
            },
        );
    }

    fn finish_pvp_battle(&self, battle_id: Uuid, player1_id: &str, player2_id: &str, end: PvPEnd) {
        self.pvp_battles.remove(&battle_id);
        self.player_battles.remove(player1_id);
        self.player_battles.remove(player2_id);
        info!(%battle_id, winner = ?end.winner_id, "pvp battle finished");
        for id in [player1_id, player2_id] {
            let outcome = match end.winner_id.as_deref() {
                None => BattleOutcome::Draw,
                Some(winner) if winner == id => BattleOutcome::Victory,
                Some(_) => BattleOutcome::Defeat,
            };
            self.registry.send_to_player(
                id,
                ServerMessage::BattleEnd {
                    outcome,
                    reason: end.reason.clone(),
                    exp_gained: None,
                    pokemon_captured: None,
                },
            );
            self.registry.send_to_player(
                id,
                ServerMessage::BattleResult {
                    battle_id,
                    result: result_kind(outcome),
                    exp_gained: None,
                    pokemon_caught: None,
                },
            );
        }
    }

    fn wild_action_request(&self, state: &WildBattleState) -> ServerMessage {
        ServerMessage::RequestAction {
            battle_id: state.battle_id,
            turn_number: state.turn_number,
            active_pokemon_state: BattlePokemonPrivateView::from_battle_pokemon(
                state.player.active(),
                &self.move_repository,
            ),
            other_pokemon_state: BattlePokemonPublicView::from_battle_pokemon(&state.wild_pokemon),
            team_overview: state
                .player
                .team
                .iter()
                .map(BattlePokemonTeamOverview::from_battle_pokemon)
                .collect(),
            field_state: state.field_state.clone(),
            can_switch: state.player.can_switch(),
            must_switch: state.player.must_switch,
        }
    }

    fn pvp_action_request(&self, state: &PvPBattleState, me: &BattlePlayer) -> ServerMessage {
        let opponent = if state.player1.player_id == me.player_id {
            &state.player2
        } else {
            &state.player1
        };
        ServerMessage::RequestAction {
            battle_id: state.battle_id,
            turn_number: state.turn_number,
            active_pokemon_state: BattlePokemonPrivateView::from_battle_pokemon(
                me.active(),
                &self.move_repository,
            ),
            other_pokemon_state: BattlePokemonPublicView::from_battle_pokemon(opponent.active()),
            team_overview: me
                .team
                .iter()
                .map(BattlePokemonTeamOverview::from_battle_pokemon)
                .collect(),
            field_state: state.field_state.clone(),
            can_switch: me.can_switch(),
            must_switch: me.must_switch,
        }
    }

    fn broadcast_pvp_update(&self, state: &PvPBattleState, events: Vec<crate::combat::state::BattleEvent>) {
        for (me, opponent) in [(&state.player1, &state.player2), (&state.player2, &state.player1)] {
            self.registry.send_to_player(
                &me.player_id,
                ServerMessage::TurnUpdate {
                    battle_id: state.battle_id,
                    turn_number: state.turn_number,
                    events: events.clone(),
                    opponent_pokemon_state: Some(BattlePokemonPublicView::from_battle_pokemon(
                        opponent.active(),
                    )),
                },
            );
        }
    }

    fn request_pvp_actions(&self, state: &PvPBattleState) {
        for me in [&state.player1, &state.player2] {
            self.registry
                .send_to_player(&me.player_id, self.pvp_action_request(state, me));
        }
    }

    fn request_pvp_switch(&self, state: &PvPBattleState) {
        let me = match state.battle_phase {
            BattlePvPPhase::WaitingForPlayer1Switch => &state.player1,
            _ => &state.player2,
        };
        self.registry
            .send_to_player(&me.player_id, self.pvp_action_request(state, me));
    }
}

fn result_kind(outcome: BattleOutcome) -> BattleResultKind {
    match outcome {
        BattleOutcome::Victory => BattleResultKind::Win,
        // The legacy signal has no draw kind
        BattleOutcome::Defeat | BattleOutcome::Draw => BattleResultKind::Loss,
        BattleOutcome::Escape => BattleResultKind::Run,
        BattleOutcome::Capture => BattleResultKind::Capture,
    }
}

fn state_phase_accepts_wild(state: &WildBattleState, action: &PlayerAction) -> bool {
    match state.battle_phase {
        BattlePhase::WaitingForPlayerAction => true,
        BattlePhase::WaitingForSwitch => matches!(action, PlayerAction::SwitchPokemon { .. }),
        _ => false,
    }
}

fn pvp_phase_accepts(state: &PvPBattleState, is_player1: bool) -> bool {
    match state.battle_phase {
        BattlePvPPhase::WaitingForBothPlayersActions => true,
        BattlePvPPhase::WaitingForPlayer1Switch => is_player1,
        BattlePvPPhase::WaitingForPlayer2Switch => !is_player1,
        _ => false,
    }
}

/// Shared validation for both battle kinds. `trainer_battle` rejects the
/// wild-only actions.
fn validate_action(
    player: &BattlePlayer,
    phase_ok: bool,
    action: &PlayerAction,
    trainer_battle: bool,
) -> Result<(), String> {
    if !phase_ok {
        return Err("battle is not accepting that action right now".to_string());
    }
    match action {
        PlayerAction::UseMove { move_index } => {
            let active = player.active();
            let mv = active
                .moves
                .get(*move_index)
                .ok_or_else(|| "invalid move index".to_string())?;
            if mv.current_pp == 0 && active.moves.iter().any(|m| m.current_pp > 0) {
                return Err("that move is out of PP".to_string());
            }
            Ok(())
        }
        PlayerAction::SwitchPokemon { team_index } => {
            let target = player
                .team
                .get(*team_index)
                .ok_or_else(|| "invalid team index".to_string())?;
            if target.is_fainted {
                return Err("that Pokemon has fainted".to_string());
            }
            if *team_index == player.active_pokemon_index {
                return Err("that Pokemon is already in battle".to_string());
            }
            Ok(())
        }
        PlayerAction::UseItem { .. } | PlayerAction::Run if trainer_battle => {
            Err("that action is not available in a trainer battle".to_string())
        }
        _ => Ok(()),
    }
}
