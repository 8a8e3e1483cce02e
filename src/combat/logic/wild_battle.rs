use rand::Rng;

use crate::combat::logic::calculations::{capture_check, run_succeeds};
use crate::combat::logic::execution::{apply_status_damage, check_faint, execute_move};
use crate::combat::state::{
    BallType, BattleEndReason, BattleEntityRef, BattleEvent, BattleOutcome, BattlePhase,
    BattlePokemonPublicView, CaptureAttempt, PlayerAction, StatusCondition, WildBattleState,
    WildPokemonAction,
};
use crate::stats::StatName;

/// Everything the manager needs after one resolved turn.
pub struct WildTurnSummary {
    pub events: Vec<BattleEvent>,
    pub ended: Option<(BattleOutcome, BattleEndReason)>,
}

const HEAL_ITEM_AMOUNT: u32 = 20;
const WILD_FLEE_HP_THRESHOLD: f32 = 0.15;
const WILD_FLEE_CHANCE: f64 = 0.1;

fn player_ref(state: &WildBattleState) -> BattleEntityRef {
    BattleEntityRef::Player {
        team_index: state.player.active_pokemon_index,
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

/// Picks the wild Pokemon's action for the turn: a random usable move,
/// Struggle when out of PP, or a flee attempt at low HP.
pub fn choose_wild_action<R: Rng>(state: &WildBattleState, rng: &mut R) -> WildPokemonAction {
    if state.wild_pokemon.hp_percent() < WILD_FLEE_HP_THRESHOLD && rng.gen_bool(WILD_FLEE_CHANCE) {
        return WildPokemonAction::Flee;
    }
    let usable: Vec<usize> = state
        .wild_pokemon
        .moves
        .iter()
        .enumerate()
        .filter(|(_, m)| m.current_pp > 0)
        .map(|(i, _)| i)
        .collect();
    if usable.is_empty() {
        WildPokemonAction::Struggle
    } else {
        WildPokemonAction::UseMove {
            move_index: usable[rng.gen_range(0..usable.len())],
        }
    }
}

/// Resolves a full turn from the stored player action and a wild action.
/// Leaves the state in the phase the next message cycle expects.
pub fn process_turn<R: Rng>(state: &mut WildBattleState, rng: &mut R) -> WildTurnSummary {
    let mut events = vec![BattleEvent::TurnStart {
        turn_number: state.turn_number,
    }];
    let mut ended: Option<(BattleOutcome, BattleEndReason)> = None;

    let player_action = state.player_action.take().unwrap_or(PlayerAction::Run);
    let wild_action = match state.wild_action.take() {
        Some(action) => action,
        None => choose_wild_action(state, rng),
    };
    let repo = state.move_repository.clone();

    let mut wild_acts = true;
    match player_action {
        PlayerAction::Run => {
            state.run_attempts += 1;
            let success = run_succeeds(
                effective_speed(state.player.active()) as u32,
                effective_speed(&state.wild_pokemon) as u32,
                state.run_attempts,
                rng,
            );
            events.push(BattleEvent::PlayerRanAway { success });
            if success {
                ended = Some((BattleOutcome::Escape, BattleEndReason::PlayerRanAway));
                wild_acts = false;
            }
        }
        PlayerAction::UseItem { item_id, is_capture_item } => {
            if is_capture_item {
                let ball_type = BallType::from_item_id(&item_id);
                events.push(BattleEvent::ItemUsed {
                    item_id: item_id.clone(),
                    item_name: item_id.replace('_', " "),
                    target: Some(BattleEntityRef::Wild),
                });
                let (success, shake_count) =
                    capture_check(&state.wild_pokemon, ball_type.catch_modifier(), rng);
                events.push(BattleEvent::CaptureAttempt {
                    ball_type: ball_type.clone(),
                    shake_count,
                    success,
                });
                state.capture_attempts.push(CaptureAttempt {
                    ball_type,
                    shake_count,
                    success,
                    turn_number: state.turn_number,
                });
                if success {
                    events.push(BattleEvent::GenericMessage {
                        message: format!("Gotcha! {} was caught!", state.wild_pokemon.name),
                    });
                    ended = Some((BattleOutcome::Capture, BattleEndReason::WildPokemonCaptured));
                    wild_acts = false;
                } else {
                    events.push(BattleEvent::GenericMessage {
                        message: format!("Oh no! {} broke free!", state.wild_pokemon.name),
                    });
                }
            } else {
                let active = state.player.active_mut();
                let healed = (active.current_hp + HEAL_ITEM_AMOUNT).min(active.max_hp) - active.current_hp;
                active.current_hp += healed;
                events.push(BattleEvent::ItemUsed {
                    item_id: item_id.clone(),
                    item_name: item_id.replace('_', " "),
                    target: Some(player_ref(state)),
                });
                events.push(BattleEvent::Heal {
                    target: player_ref(state),
                    amount: healed,
                    new_hp: state.player.active().current_hp,
                    max_hp: state.player.active().max_hp,
                });
            }
        }
        PlayerAction::SwitchPokemon { team_index } => {
            perform_switch(state, team_index, &mut events);
        }
        PlayerAction::UseMove { move_index } => {
            let player_first = effective_speed(state.player.active())
                >= effective_speed(&state.wild_pokemon);
            if player_first {
                let entity = player_ref(state);
                execute_move(
                    state.player.active_mut(),
                    entity,
                    &mut state.wild_pokemon,
                    BattleEntityRef::Wild,
                    move_index,
                    &repo,
                    &mut events,
                    rng,
                );
                if !check_faint(&mut state.wild_pokemon, &BattleEntityRef::Wild, &mut events) {
                    run_wild_action(state, &wild_action, &repo, &mut events, &mut ended, rng);
                }
            } else {
                run_wild_action(state, &wild_action, &repo, &mut events, &mut ended, rng);
                let entity = player_ref(state);
                check_faint(state.player.active_mut(), &entity, &mut events);
                if !state.player.active().is_fainted && ended.is_none() {
                    execute_move(
                        state.player.active_mut(),
                        entity,
                        &mut state.wild_pokemon,
                        BattleEntityRef::Wild,
                        move_index,
                        &repo,
                        &mut events,
                        rng,
                    );
                    check_faint(&mut state.wild_pokemon, &BattleEntityRef::Wild, &mut events);
                }
            }
            wild_acts = false;
        }
    }

    if wild_acts && ended.is_none() && !state.wild_pokemon.is_fainted {
        run_wild_action(state, &wild_action, &repo, &mut events, &mut ended, rng);
        let entity = player_ref(state);
        check_faint(state.player.active_mut(), &entity, &mut events);
    }

    if ended.is_none() {
        // End-of-turn residual damage, then the weather clock
        let entity = player_ref(state);
        apply_status_damage(state.player.active_mut(), &entity, &mut events);
        check_faint(state.player.active_mut(), &entity, &mut events);
        if !state.wild_pokemon.is_fainted {
            apply_status_damage(&mut state.wild_pokemon, &BattleEntityRef::Wild, &mut events);
            check_faint(&mut state.wild_pokemon, &BattleEntityRef::Wild, &mut events);
        }
        tick_weather(state, &mut events);
    }

    if ended.is_none() {
        if state.wild_pokemon.is_fainted {
            let amount = repo.exp_yield(state.wild_pokemon.template_id, state.wild_pokemon.level) as u64;
            events.push(BattleEvent::ExpGained {
                source: BattleEntityRef::Wild,
                amount,
            });
            ended = Some((BattleOutcome::Victory, BattleEndReason::WildPokemonDefeated));
        } else if state.player.active().is_fainted {
            if state.player.has_usable_pokemon() {
                state.player.must_switch = true;
                state.battle_phase = BattlePhase::WaitingForSwitch;
            } else {
                ended = Some((BattleOutcome::Defeat, BattleEndReason::AllPlayerPokemonFainted));
            }
        }
    }

    match ended {
        Some(_) => state.battle_phase = BattlePhase::Finished,
        None => {
            state.turn_number += 1;
            if state.battle_phase != BattlePhase::WaitingForSwitch {
                state.battle_phase = BattlePhase::WaitingForPlayerAction;
            }
        }
    }
    state.player_action = None;
    state.wild_action = None;

    WildTurnSummary { events, ended }
}

/// Replacement after a faint. Does not consume a turn; the wild side
/// does not act on the free switch.
pub fn process_forced_switch(state: &mut WildBattleState, team_index: usize) -> Vec<BattleEvent> {
    let mut events = Vec::new();
    perform_switch(state, team_index, &mut events);
    state.player.must_switch = false;
    state.battle_phase = BattlePhase::WaitingForPlayerAction;
    state.turn_number += 1;
    state.player_action = None;
    events
}

fn player_ref_at(team_index: usize) -> BattleEntityRef {
    BattleEntityRef::Player { team_index }
}

fn perform_switch(state: &mut WildBattleState, team_index: usize, events: &mut Vec<BattleEvent>) {
    state.player.active_mut().reset_on_switch_out();
    state.player.active_pokemon_index = team_index;
    let incoming = state.player.active();
    events.push(BattleEvent::GenericMessage {
        message: format!("Go, {}!", incoming.name),
    });
    events.push(BattleEvent::SwitchIn {
        entity: player_ref_at(team_index),
        pokemon_view: BattlePokemonPublicView::from_battle_pokemon(incoming),
        team_index,
    });
}

fn run_wild_action<R: Rng>(
    state: &mut WildBattleState,
    action: &WildPokemonAction,
    repo: &crate::combat::moves::MoveRepository,
    events: &mut Vec<BattleEvent>,
    ended: &mut Option<(BattleOutcome, BattleEndReason)>,
    rng: &mut R,
) {
    match action {
        WildPokemonAction::Flee => {
            events.push(BattleEvent::WildPokemonFled);
            *ended = Some((BattleOutcome::Escape, BattleEndReason::WildPokemonFled));
        }
        WildPokemonAction::UseMove { move_index } => {
            let target_ref = player_ref(state);
            execute_move(
                &mut state.wild_pokemon,
                BattleEntityRef::Wild,
                state.player.active_mut(),
                target_ref,
                *move_index,
                repo,
                events,
                rng,
            );
        }
        WildPokemonAction::Struggle => {
            let target_ref = player_ref(state);
            // Index past the moveset forces the Struggle fallback
            execute_move(
                &mut state.wild_pokemon,
                BattleEntityRef::Wild,
                state.player.active_mut(),
                target_ref,
                usize::MAX,
                repo,
                events,
                rng,
            );
        }
    }
}

fn tick_weather(state: &mut WildBattleState, events: &mut Vec<BattleEvent>) {
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

    fn wild_state(player_level: u32, wild_level: u32) -> WildBattleState {
        let repo = Arc::new(MoveRepository::builtin());
        let team = vec![
            repo.build_pokemon(25, player_level, 0, false).unwrap(),
            repo.build_pokemon(1, player_level, 1, false).unwrap(),
        ];
        let player = BattlePlayer::new("p1", "Red", team);
        let wild = repo.build_pokemon(19, wild_level, 0, true).unwrap();
        WildBattleState::new(Uuid::new_v4(), player, wild, repo)
    }

    #[test]
    fn turn_starts_with_turn_start_event() {
        let mut state = wild_state(20, 5);
        state.player_action = Some(PlayerAction::UseMove { move_index: 0 });
        let mut rng = SmallRng::seed_from_u64(11);
        let summary = process_turn(&mut state, &mut rng);
        assert!(matches!(summary.events[0], BattleEvent::TurnStart { turn_number: 1 }));
    }

    #[test]
    fn high_level_player_defeats_weak_wild() {
        let mut state = wild_state(50, 3);
        let mut rng = SmallRng::seed_from_u64(2);
        let mut last = None;
        for _ in 0..30 {
            state.player_action = Some(PlayerAction::UseMove { move_index: 0 });
            let summary = process_turn(&mut state, &mut rng);
            if let Some(end) = summary.ended {
                last = Some((end, summary.events));
                break;
            }
        }
        let (end, events) = last.expect("battle should finish");
        assert_eq!(end.0, BattleOutcome::Victory);
        assert_eq!(end.1, BattleEndReason::WildPokemonDefeated);
        assert!(events.iter().any(|e| matches!(e, BattleEvent::ExpGained { .. })));
        assert_eq!(state.battle_phase, BattlePhase::Finished);
    }

    #[test]
    fn switch_gives_wild_a_free_move() {
        let mut state = wild_state(20, 20);
        state.player_action = Some(PlayerAction::SwitchPokemon { team_index: 1 });
        let mut rng = SmallRng::seed_from_u64(5);
        let summary = process_turn(&mut state, &mut rng);
        assert!(summary.events.iter().any(|e| matches!(
            e,
            BattleEvent::SwitchIn { team_index: 1, .. }
        )));
        assert_eq!(state.player.active_pokemon_index, 1);
        // The wild side acted after the switch
        assert!(summary.events.iter().any(|e| matches!(
            e,
            BattleEvent::MoveUsed { source: BattleEntityRef::Wild, .. }
        )));
    }

    #[test]
    fn successful_capture_ends_battle() {
        let mut state = wild_state(20, 3);
        state.wild_pokemon.current_hp = 1;
        state.wild_pokemon.status = Some(StatusCondition::Sleep);
        let mut rng = SmallRng::seed_from_u64(1);
        let mut captured = false;
        for _ in 0..20 {
            state.player_action = Some(PlayerAction::UseItem {
                item_id: "ultra_ball".to_string(),
                is_capture_item: true,
            });
            let summary = process_turn(&mut state, &mut rng);
            if let Some((outcome, reason)) = summary.ended {
                assert_eq!(outcome, BattleOutcome::Capture);
                assert_eq!(reason, BattleEndReason::WildPokemonCaptured);
                assert!(summary.events.iter().any(|e| matches!(
                    e,
                    BattleEvent::CaptureAttempt { success: true, .. }
                )));
                captured = true;
                break;
            }
        }
        assert!(captured, "sleeping 1hp target with ultra ball should be caught");
        assert!(!state.capture_attempts.is_empty());
    }

    #[test]
    fn faster_player_escapes_on_first_try() {
        let mut state = wild_state(50, 3);
        state.player_action = Some(PlayerAction::Run);
        let mut rng = SmallRng::seed_from_u64(8);
        let summary = process_turn(&mut state, &mut rng);
        assert_eq!(
            summary.ended,
            Some((BattleOutcome::Escape, BattleEndReason::PlayerRanAway))
        );
        assert!(summary
            .events
            .iter()
            .any(|e| matches!(e, BattleEvent::PlayerRanAway { success: true })));
    }

    #[test]
    fn forced_switch_resumes_action_phase() {
        let mut state = wild_state(20, 20);
        state.player.team[0].current_hp = 0;
        state.player.team[0].is_fainted = true;
        state.player.must_switch = true;
        state.battle_phase = BattlePhase::WaitingForSwitch;

        let events = process_forced_switch(&mut state, 1);
        assert!(events.iter().any(|e| matches!(e, BattleEvent::SwitchIn { .. })));
        assert!(!state.player.must_switch);
        assert_eq!(state.battle_phase, BattlePhase::WaitingForPlayerAction);
    }
}
