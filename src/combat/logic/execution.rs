use rand::Rng;

use crate::combat::logic::calculations::{calculate_damage, move_hits};
use crate::combat::moves::{EffectData, EffectTarget, MoveRepository};
use crate::combat::state::{BattleEntityRef, BattleEvent, BattlePokemon, StatusCondition};

const STRUGGLE_MOVE_ID: u32 = 165;

/// Whether the Pokemon can act this turn. Emits the explanatory events and
/// updates sleep/freeze counters as a side effect.
pub fn can_act<R: Rng>(
    pokemon: &mut BattlePokemon,
    entity: &BattleEntityRef,
    events: &mut Vec<BattleEvent>,
    rng: &mut R,
) -> bool {
    match pokemon.status {
        Some(StatusCondition::Sleep) => {
            if pokemon.status_turns == 0 {
                pokemon.status = None;
                events.push(BattleEvent::StatusRemoved {
                    target: entity.clone(),
                    status: StatusCondition::Sleep,
                });
                events.push(BattleEvent::GenericMessage {
                    message: format!("{} woke up!", pokemon.name),
                });
                true
            } else {
                pokemon.status_turns -= 1;
                events.push(BattleEvent::GenericMessage {
                    message: format!("{} is fast asleep.", pokemon.name),
                });
                false
            }
        }
        Some(StatusCondition::Freeze) => {
            if rng.gen_bool(0.2) {
                pokemon.status = None;
                events.push(BattleEvent::StatusRemoved {
                    target: entity.clone(),
                    status: StatusCondition::Freeze,
                });
                events.push(BattleEvent::GenericMessage {
                    message: format!("{} thawed out!", pokemon.name),
                });
                true
            } else {
                events.push(BattleEvent::GenericMessage {
                    message: format!("{} is frozen solid!", pokemon.name),
                });
                false
            }
        }
        Some(StatusCondition::Paralysis) => {
            if rng.gen_bool(0.25) {
                events.push(BattleEvent::GenericMessage {
                    message: format!("{} is paralyzed! It can't move!", pokemon.name),
                });
                false
            } else {
                true
            }
        }
        _ => true,
    }
}

/// Executes one move from source against target, including PP accounting,
/// accuracy, damage and effects. Both combatants must already be split-borrowed
/// by the caller.
pub fn execute_move<R: Rng>(
    source: &mut BattlePokemon,
    source_ref: BattleEntityRef,
    target: &mut BattlePokemon,
    target_ref: BattleEntityRef,
    move_index: usize,
    repo: &MoveRepository,
    events: &mut Vec<BattleEvent>,
    rng: &mut R,
) {
    if !can_act(source, &source_ref, events, rng) {
        return;
    }

    let move_id = match source.moves.get_mut(move_index) {
        Some(mv) if mv.current_pp > 0 => {
            mv.current_pp -= 1;
            mv.move_id
        }
        _ => STRUGGLE_MOVE_ID,
    };

    let Some(move_data) = repo.get_move(move_id).cloned() else {
        events.push(BattleEvent::MoveFailed {
            source: source_ref,
            reason: format!("Unknown move {}", move_id),
        });
        return;
    };

    events.push(BattleEvent::GenericMessage {
        message: format!("{} used {}!", source.name, move_data.name),
    });
    events.push(BattleEvent::MoveUsed {
        source: source_ref.clone(),
        move_id,
        move_name: move_data.name.clone(),
        target: target_ref.clone(),
    });

    if !move_hits(source, target, &move_data, rng) {
        events.push(BattleEvent::MoveFailed {
            source: source_ref,
            reason: "The attack missed!".to_string(),
        });
        return;
    }

    if move_data.power.is_some() {
        let roll = calculate_damage(source, target, &move_data, repo, rng);
        if roll.effectiveness == 0.0 {
            events.push(BattleEvent::GenericMessage {
                message: format!("It doesn't affect {}...", target.name),
            });
            return;
        }
        target.current_hp = target.current_hp.saturating_sub(roll.damage);
        events.push(BattleEvent::DamageDealt {
            target: target_ref.clone(),
            damage: roll.damage,
            new_hp: target.current_hp,
            max_hp: target.max_hp,
            effectiveness: roll.effectiveness,
            is_critical: roll.is_critical,
        });
    }

    if let Some(effect) = &move_data.effect {
        apply_effect(source, &source_ref, target, &target_ref, effect, events);
    }
    if let Some(secondary) = &move_data.secondary_effect {
        if target.current_hp > 0 && rng.gen_range(0..100) < secondary.chance {
            apply_effect(source, &source_ref, target, &target_ref, &secondary.effect, events);
        }
    }
}

/// Applies a move effect to whichever side it names.
pub fn apply_effect(
    source: &mut BattlePokemon,
    source_ref: &BattleEntityRef,
    target: &mut BattlePokemon,
    target_ref: &BattleEntityRef,
    effect: &EffectData,
    events: &mut Vec<BattleEvent>,
) {
    match effect {
        EffectData::ApplyStatus { status, target: who } => {
            let (pokemon, entity) = match who {
                EffectTarget::User => (source, source_ref),
                EffectTarget::Target => (target, target_ref),
            };
            if pokemon.status.is_none() && !pokemon.is_fainted {
                pokemon.status = Some(*status);
                pokemon.status_turns = match status {
                    StatusCondition::Sleep => 2,
                    StatusCondition::Toxic => 0,
                    _ => 0,
                };
                events.push(BattleEvent::GenericMessage {
                    message: format!("{} was {}!", pokemon.name, status_verb(*status)),
                });
                events.push(BattleEvent::StatusApplied {
                    target: entity.clone(),
                    status: *status,
                });
            }
        }
        EffectData::StatChange { changes, target: who } => {
            let (pokemon, entity) = match who {
                EffectTarget::User => (source, source_ref),
                EffectTarget::Target => (target, target_ref),
            };
            for change in changes {
                let (new_stage, at_limit) = pokemon.stat_modifiers.apply_stages(change.stat, change.stages);
                if at_limit {
                    let direction = if change.stages > 0 { "higher" } else { "lower" };
                    events.push(BattleEvent::GenericMessage {
                        message: format!("{}'s stats won't go any {}!", pokemon.name, direction),
                    });
                } else {
                    events.push(BattleEvent::StatChange {
                        target: entity.clone(),
                        stat: change.stat,
                        stages: change.stages,
                        new_stage,
                        success: true,
                    });
                }
            }
        }
    }
}

fn status_verb(status: StatusCondition) -> &'static str {
    match status {
        StatusCondition::Burn => "burned",
        StatusCondition::Freeze => "frozen",
        StatusCondition::Paralysis => "paralyzed",
        StatusCondition::Poison => "poisoned",
        StatusCondition::Sleep => "put to sleep",
        StatusCondition::Toxic => "badly poisoned",
    }
}

/// End-of-turn chip damage from persistent status conditions.
pub fn apply_status_damage(pokemon: &mut BattlePokemon, entity: &BattleEntityRef, events: &mut Vec<BattleEvent>) {
    if pokemon.is_fainted || pokemon.current_hp == 0 {
        return;
    }
    let Some(status) = pokemon.status else { return };
    let damage = match status {
        StatusCondition::Burn => pokemon.max_hp / 16,
        StatusCondition::Poison => pokemon.max_hp / 8,
        StatusCondition::Toxic => {
            pokemon.status_turns = pokemon.status_turns.saturating_add(1);
            pokemon.max_hp * pokemon.status_turns as u32 / 16
        }
        _ => return,
    };
    let damage = damage.max(1);
    pokemon.current_hp = pokemon.current_hp.saturating_sub(damage);
    events.push(BattleEvent::StatusDamage {
        target: entity.clone(),
        status,
        damage,
        new_hp: pokemon.current_hp,
        max_hp: pokemon.max_hp,
    });
}

/// Marks a Pokemon fainted once its HP reaches zero and emits the event.
/// Returns true on the transition only; repeated calls are no-ops.
pub fn check_faint(pokemon: &mut BattlePokemon, entity: &BattleEntityRef, events: &mut Vec<BattleEvent>) -> bool {
    if pokemon.current_hp == 0 && !pokemon.is_fainted {
        pokemon.is_fainted = true;
        events.push(BattleEvent::GenericMessage {
            message: format!("{} fainted!", pokemon.name),
        });
        events.push(BattleEvent::PokemonFainted {
            target: entity.clone(),
        });
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn faint_event_emitted_once() {
        let repo = MoveRepository::builtin();
        let mut mon = repo.build_pokemon(19, 5, 0, true).unwrap();
        mon.current_hp = 0;
        let mut events = Vec::new();

        assert!(check_faint(&mut mon, &BattleEntityRef::Wild, &mut events));
        assert!(!check_faint(&mut mon, &BattleEntityRef::Wild, &mut events));
        let faints = events
            .iter()
            .filter(|e| matches!(e, BattleEvent::PokemonFainted { .. }))
            .count();
        assert_eq!(faints, 1);
    }

    #[test]
    fn move_without_pp_falls_back_to_struggle() {
        let repo = MoveRepository::builtin();
        let mut source = repo.build_pokemon(25, 10, 0, false).unwrap();
        let mut target = repo.build_pokemon(19, 10, 0, true).unwrap();
        for mv in &mut source.moves {
            mv.current_pp = 0;
        }
        let mut events = Vec::new();
        let mut rng = SmallRng::seed_from_u64(4);
        execute_move(
            &mut source,
            BattleEntityRef::Player { team_index: 0 },
            &mut target,
            BattleEntityRef::Wild,
            0,
            &repo,
            &mut events,
            &mut rng,
        );
        assert!(events.iter().any(|e| matches!(
            e,
            BattleEvent::MoveUsed { move_id: 165, .. }
        )));
    }

    #[test]
    fn toxic_damage_ramps() {
        let repo = MoveRepository::builtin();
        let mut mon = repo.build_pokemon(1, 50, 0, false).unwrap();
        mon.status = Some(StatusCondition::Toxic);
        let mut events = Vec::new();
        apply_status_damage(&mut mon, &BattleEntityRef::Player { team_index: 0 }, &mut events);
        apply_status_damage(&mut mon, &BattleEntityRef::Player { team_index: 0 }, &mut events);
        let damages: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                BattleEvent::StatusDamage { damage, .. } => Some(*damage),
                _ => None,
            })
            .collect();
        assert_eq!(damages.len(), 2);
        assert!(damages[1] > damages[0]);
    }
}
