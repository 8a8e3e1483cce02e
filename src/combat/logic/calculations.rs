use rand::Rng;

use crate::combat::moves::{MoveCategory, MoveData, MoveRepository};
use crate::combat::state::{BattlePokemon, StatusCondition};
use crate::stats::StatName;

/// Outcome of one damage roll
pub struct DamageRoll {
    pub damage: u32,
    pub effectiveness: f32,
    pub is_critical: bool,
}

/// Classic damage formula:
/// Damage = (((2 * Level / 5 + 2) * Power * A/D) / 50 + 2) * Modifier
/// where Modifier = STAB * type effectiveness * crit * random(0.85..=1.0).
pub fn calculate_damage<R: Rng>(
    source: &BattlePokemon,
    target: &BattlePokemon,
    move_data: &MoveData,
    repo: &MoveRepository,
    rng: &mut R,
) -> DamageRoll {
    let power = match move_data.power {
        Some(p) if p > 0 => p,
        _ => {
            return DamageRoll {
                damage: 0,
                effectiveness: 1.0,
                is_critical: false,
            }
        }
    };

    let (attack_stat, attack_stage, defense_stat, defense_stage) = match move_data.category {
        MoveCategory::Physical => (
            source.calculated_stats.attack,
            StatName::Attack,
            target.calculated_stats.defense,
            StatName::Defense,
        ),
        MoveCategory::Special => (
            source.calculated_stats.special_attack,
            StatName::SpecialAttack,
            target.calculated_stats.special_defense,
            StatName::SpecialDefense,
        ),
        MoveCategory::Status => {
            return DamageRoll {
                damage: 0,
                effectiveness: 1.0,
                is_critical: false,
            }
        }
    };

    // Stage multipliers apply before the formula; burn halves physical attack
    let mut attack = attack_stat as f32 * source.stat_modifiers.get_multiplier(attack_stage);
    if source.status == Some(StatusCondition::Burn) && move_data.category == MoveCategory::Physical {
        attack *= 0.5;
    }
    let defense = (defense_stat as f32 * target.stat_modifiers.get_multiplier(defense_stage)).max(1.0);

    let effectiveness = repo.type_effectiveness(move_data.move_type, &target.pokemon_types);
    let stab = if source.pokemon_types.contains(&move_data.move_type) {
        1.5
    } else {
        1.0
    };
    let is_critical = rng.gen_bool(0.0625);
    let critical_mod = if is_critical { 1.5 } else { 1.0 };
    let random_factor = rng.gen_range(0.85..=1.0);

    let base = ((2.0 * source.level as f32 / 5.0 + 2.0) * power as f32 * attack / defense) / 50.0 + 2.0;
    let damage = (base * stab * effectiveness * critical_mod * random_factor).floor() as u32;

    DamageRoll {
        damage: if effectiveness == 0.0 { 0 } else { damage.max(1) },
        effectiveness,
        is_critical,
    }
}

/// Accuracy check with stage multipliers.
pub fn move_hits<R: Rng>(source: &BattlePokemon, target: &BattlePokemon, move_data: &MoveData, rng: &mut R) -> bool {
    let Some(accuracy) = move_data.accuracy else {
        // Moves without an accuracy value never miss
        return true;
    };
    let chance = accuracy as f32
        * source.stat_modifiers.get_multiplier(StatName::Accuracy)
        / target.stat_modifiers.get_multiplier(StatName::Evasion);
    rng.gen_range(0.0..100.0) < chance
}

/// Capture check: ball modifier, missing HP fraction and status all weigh in.
/// Returns (success, shake count 0-3).
pub fn capture_check<R: Rng>(wild: &BattlePokemon, ball_modifier: f32, rng: &mut R) -> (bool, u8) {
    let hp_factor = (3.0 * wild.max_hp as f32 - 2.0 * wild.current_hp as f32) / (3.0 * wild.max_hp as f32);
    let status_bonus = match wild.status {
        Some(StatusCondition::Sleep) | Some(StatusCondition::Freeze) => 2.0,
        Some(_) => 1.5,
        None => 1.0,
    };
    let catch_rate = (hp_factor * ball_modifier * status_bonus * 0.35).min(1.0);

    let mut shakes = 0u8;
    for _ in 0..4 {
        if rng.gen_range(0.0..1.0) < catch_rate {
            shakes += 1;
        } else {
            break;
        }
    }
    // Four successful shake checks means a capture; the wire carries 0-3.
    (shakes == 4, shakes.min(3))
}

/// Speed-based escape formula for running from a wild battle.
pub fn run_succeeds<R: Rng>(player_speed: u32, wild_speed: u32, attempts: u32, rng: &mut R) -> bool {
    if player_speed >= wild_speed {
        return true;
    }
    let odds = ((player_speed as f32 * 32.0) / (wild_speed as f32 / 4.0).max(1.0) + 30.0 * attempts as f32) / 256.0;
    rng.gen_range(0.0..1.0) < odds.min(1.0)
}
