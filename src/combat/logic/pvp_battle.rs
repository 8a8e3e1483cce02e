use rand::Rng;

use crate::combat::logic::execution::{apply_status_damage, check_faint, execute_move};
use crate::combat::state::{
    BattleEndReason, BattleEntityRef, BattleEvent, BattlePokemonPublicView, BattlePvPPhase,
    PlayerAction, PvPBattleState, StatusCondition,
};
use crate::stats::StatName;

/// Result of a resolved PvP turn.
pub struct PvPTurnSummary {
    pub events: Vec<BattleEvent>,
    pub ended: Option<PvPEnd>,
}

/// A terminal PvP result. `winner_id` is None only for a double knockout.
pub struct PvPEnd {
    pub winner_id: Option<String>,
    pub reason: BattleEndReason,
}

#[derive(Clone, Copy, PartialEq)]
enum Side {
    Player1,
    Player2,
}

fn entity_ref(side: Side, team_index: usize) -> BattleEntityRef {
    match side {
        Side::Player1 => BattleEntityRef::Player1 { team_index },
        Side::Player2 => BattleEntityRef::Player2 { team_index },
    }
}

fn effective_speed(pokemon: &crate::combat::state::BattlePokemon) -> f32 {
    let mut speed = pokemon.calculated_stats.speed as f32
        * pokemon.stat_modifiers.get_multiplier(StatName::Speed);
    if pokemon.status == Some(StatusCondition::Paralysis) {
        speed *= 0.5;
    }
    speed
}

/// Resolves one PvP turn once both actions are on hand. Switches resolve
/// before moves; moves go in speed order with ties favoring player1.
pub fn process_pvp_turn<R: Rng>(state: &mut PvPBattleState, rng: &mut R) -> PvPTurnSummary {
    let mut events = vec![BattleEvent::TurnStart {
        turn_number: state.turn_number,
    }];

    let p1_action = state.player1_action.take().unwrap_or(PlayerAction::UseMove { move_index: 0 });
    let p2_action = state.player2_action.take().unwrap_or(PlayerAction::UseMove { move_index: 0 });
    let repo = state.move_repository.clone();

    let mut p1_move: Option<usize> = None;
    let mut p2_move: Option<usize> = None;

    match p1_action {
        PlayerAction::SwitchPokemon { team_index } => {
            perform_switch(state, Side::Player1, team_index, &mut events);
        }
        PlayerAction::UseMove { move_index } => p1_move = Some(move_index),
        _ => {}
    }
    match p2_action {
        PlayerAction::SwitchPokemon { team_index } => {
            perform_switch(state, Side::Player2, team_index, &mut events);
        }
        PlayerAction::UseMove { move_index } => p2_move = Some(move_index),
        _ => {}
    }

    let p1_first = effective_speed(state.player1.active()) >= effective_speed(state.player2.active());
    let order = if p1_first {
        [(Side::Player1, p1_move), (Side::Player2, p2_move)]
    } else {
        [(Side::Player2, p2_move), (Side::Player1, p1_move)]
    };

    for (side, maybe_move) in order {
        let Some(move_index) = maybe_move else { continue };
        let (source, target) = match side {
            Side::Player1 => (&mut state.player1, &mut state.player2),
            Side::Player2 => (&mut state.player2, &mut state.player1),
        };
        if source.active().is_fainted {
            continue;
        }
        let source_ref = entity_ref(side, source.active_pokemon_index);
        let target_side = match side {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        };
        let target_ref = entity_ref(target_side, target.active_pokemon_index);
        execute_move(
            source.active_mut(),
            source_ref,
            target.active_mut(),
            target_ref.clone(),
            move_index,
            &repo,
            &mut events,
            rng,
        );
        let target_active = target.active_mut();
        check_faint(target_active, &target_ref, &mut events);
    }

    // End-of-turn residuals, then faint checks for both sides
    for side in [Side::Player1, Side::Player2] {
        let player = match side {
            Side::Player1 => &mut state.player1,
            Side::Player2 => &mut state.player2,
        };
        let entity = entity_ref(side, player.active_pokemon_index);
        if !player.active().is_fainted {
            apply_status_damage(player.active_mut(), &entity, &mut events);
            check_faint(player.active_mut(), &entity, &mut events);
        }
    }
    tick_weather(state, &mut events);

    let ended = resolve_end(state);
    match &ended {
        Some(_) => state.battle_phase = BattlePvPPhase::Finished,
        None => {
            state.turn_number += 1;
            let p1_down = state.player1.active().is_fainted;
            let p2_down = state.player2.active().is_fainted;
            state.player1.must_switch = p1_down;
            state.player2.must_switch = p2_down;
            state.battle_phase = if p1_down {
                BattlePvPPhase::WaitingForPlayer1Switch
            } else if p2_down {
                BattlePvPPhase::WaitingForPlayer2Switch
            } else {
                BattlePvPPhase::WaitingForBothPlayersActions
            };
        }
    }
    state.player1_action = None;
    state.player2_action = None;

    PvPTurnSummary { events, ended }
}

/// Replacement switch after a faint; free of charge for the switching side.
pub fn process_pvp_forced_switch(
    state: &mut PvPBattleState,
    player_id: &str,
    team_index: usize,
) -> Vec<BattleEvent> {
    let mut events = Vec::new();
    let side = if state.player1.player_id == player_id {
        Side::Player1
    } else {
        Side::Player2
    };
    perform_switch(state, side, team_index, &mut events);
    match side {
        Side::Player1 => state.player1.must_switch = false,
        Side::Player2 => state.player2.must_switch = false,
    }
    state.battle_phase = if state.player1.must_switch {
        BattlePvPPhase::WaitingForPlayer1Switch
    } else if state.player2.must_switch {
        BattlePvPPhase::WaitingForPlayer2Switch
    } else {
        BattlePvPPhase::WaitingForBothPlayersActions
    };
    events
}

fn perform_switch(state: &mut PvPBattleState, side: Side, team_index: usize, events: &mut Vec<BattleEvent>) {
    let player = match side {
        Side::Player1 => &mut state.player1,
        Side::Player2 => &mut state.player2,
    };
    player.active_mut().reset_on_switch_out();
    player.active_pokemon_index = team_index;
    let incoming = player.active();
    events.push(BattleEvent::GenericMessage {
        message: format!("{} sent out {}!", player.name, incoming.name),
    });
    events.push(BattleEvent::SwitchIn {
        entity: entity_ref(side, team_index),
        pokemon_view: BattlePokemonPublicView::from_battle_pokemon(incoming),
        team_index,
    });
}

fn resolve_end(state: &PvPBattleState) -> Option<PvPEnd> {
    let p1_out = state.player1.all_fainted();
    let p2_out = state.player2.all_fainted();
    match (p1_out, p2_out) {
        (true, true) => Some(PvPEnd {
            winner_id: None,
            reason: BattleEndReason::BothSidesDefeated,
        }),
        (true, false) => Some(PvPEnd {
            winner_id: Some(state.player2.player_id.clone()),
            reason: BattleEndReason::OpponentDefeated,
        }),
        (false, true) => Some(PvPEnd {
            winner_id: Some(state.player1.player_id.clone()),
            reason: BattleEndReason::OpponentDefeated,
        }),
        (false, false) => None,
    }
}

fn tick_weather(state: &mut PvPBattleState, events: &mut Vec<BattleEvent>) {
    if let Some(weather) = &mut state.field_state.weather {
        if weather.turns_left <= 1 {
            state.field_state.weather = None;
            events.push(BattleEvent::WeatherEnded);
        } else {
            weather.turns_left -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::moves::MoveRepository;
    use crate::combat::state::BattlePlayer;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use uuid::Uuid;

    fn pvp_state(level1: u32, level2: u32) -> PvPBattleState {
        let repo = Arc::new(MoveRepository::builtin());
        let team1 = vec![
            repo.build_pokemon(25, level1, 0, false).unwrap(),
            repo.build_pokemon(4, level1, 1, false).unwrap(),
        ];
        let team2 = vec![repo.build_pokemon(7, level2, 0, false).unwrap()];
        PvPBattleState::new(
            Uuid::new_v4(),
            BattlePlayer::new("p1", "Red", team1),
            BattlePlayer::new("p2", "Blue", team2),
            repo,
        )
    }

    #[test]
    fn both_moves_execute_in_one_turn() {
        let mut state = pvp_state(20, 20);
        state.player1_action = Some(PlayerAction::UseMove { move_index: 0 });
        state.player2_action = Some(PlayerAction::UseMove { move_index: 0 });
        let mut rng = SmallRng::seed_from_u64(3);
        let summary = process_pvp_turn(&mut state, &mut rng);
        let used: Vec<&BattleEntityRef> = summary
            .events
            .iter()
            .filter_map(|e| match e {
                BattleEvent::MoveUsed { source, .. } => Some(source),
                _ => None,
            })
            .collect();
        assert!(used.contains(&&BattleEntityRef::Player1 { team_index: 0 }));
        assert!(used.contains(&&BattleEntityRef::Player2 { team_index: 0 }));
        assert_eq!(state.turn_number, 2);
    }

    #[test]
    fn mismatched_levels_produce_a_winner() {
        let mut state = pvp_state(50, 5);
        let mut rng = SmallRng::seed_from_u64(6);
        let mut winner = None;
        for _ in 0..60 {
            if state.battle_phase == BattlePvPPhase::WaitingForPlayer2Switch {
                // Single-mon team, should not happen
                break;
            }
            state.player1_action = Some(PlayerAction::UseMove { move_index: 0 });
            state.player2_action = Some(PlayerAction::UseMove { move_index: 0 });
            let summary = process_pvp_turn(&mut state, &mut rng);
            if let Some(end) = summary.ended {
                winner = end.winner_id;
                break;
            }
        }
        assert_eq!(winner.as_deref(), Some("p1"));
        assert_eq!(state.battle_phase, BattlePvPPhase::Finished);
    }

    #[test]
    fn double_knockout_ends_without_a_winner() {
        let mut state = pvp_state(20, 20);
        for mon in state.player1.team.iter_mut().chain(state.player2.team.iter_mut()) {
            mon.current_hp = 0;
            mon.is_fainted = true;
        }
        let end = resolve_end(&state).unwrap();
        assert!(end.winner_id.is_none());
        assert_eq!(end.reason, BattleEndReason::BothSidesDefeated);
    }

    #[test]
    fn faint_with_remaining_team_waits_for_switch() {
        let mut state = pvp_state(20, 50);
        let mut rng = SmallRng::seed_from_u64(12);
        for _ in 0..60 {
            state.player1_action = Some(PlayerAction::UseMove { move_index: 0 });
            state.player2_action = Some(PlayerAction::UseMove { move_index: 0 });
            let _ = process_pvp_turn(&mut state, &mut rng);
            if state.battle_phase == BattlePvPPhase::WaitingForPlayer1Switch {
                break;
            }
            assert_ne!(state.battle_phase, BattlePvPPhase::Finished, "p1 has a backup mon");
        }
        assert_eq!(state.battle_phase, BattlePvPPhase::WaitingForPlayer1Switch);
        assert!(state.player1.must_switch);

        let events = process_pvp_forced_switch(&mut state, "p1", 1);
        assert!(events.iter().any(|e| matches!(e, BattleEvent::SwitchIn { .. })));
        assert_eq!(state.battle_phase, BattlePvPPhase::WaitingForBothPlayersActions);
    }
}
