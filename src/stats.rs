use serde::{Deserialize, Serialize};

/// Lowest and highest stage a battle stat modifier can reach.
pub const STAT_STAGE_MIN: i8 = -6;
pub const STAT_STAGE_MAX: i8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
    Accuracy,
    Evasion,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StatSet<T> {
    pub hp: T,
    pub attack: T,
    pub defense: T,
    pub special_attack: T,
    pub special_defense: T,
    pub speed: T,
}

pub type BaseStats = StatSet<u32>;
pub type CalculatedStats = StatSet<u32>;

/// Per-stat stage modifiers, clamped to [-6, +6].
///
/// Accuracy and evasion are battle-only stats, so they live outside the
/// common StatSet.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BattleStatModifiers {
    pub battle_stats: StatSet<i8>,
    pub accuracy: i8,
    pub evasion: i8,
}

impl BattleStatModifiers {
    pub fn stage(&self, stat: StatName) -> i8 {
        match stat {
            StatName::Attack => self.battle_stats.attack,
            StatName::Defense => self.battle_stats.defense,
            StatName::SpecialAttack => self.battle_stats.special_attack,
            StatName::SpecialDefense => self.battle_stats.special_defense,
            StatName::Speed => self.battle_stats.speed,
            StatName::Accuracy => self.accuracy,
            StatName::Evasion => self.evasion,
        }
    }

    /// Set a stat stage, clamping to the legal range. Returns the stage the
    /// stat ended up at.
    pub fn set_stage(&mut self, stat: StatName, value: i8) -> i8 {
        let clamped = value.clamp(STAT_STAGE_MIN, STAT_STAGE_MAX);
        let slot = match stat {
            StatName::Attack => &mut self.battle_stats.attack,
            StatName::Defense => &mut self.battle_stats.defense,
            StatName::SpecialAttack => &mut self.battle_stats.special_attack,
            StatName::SpecialDefense => &mut self.battle_stats.special_defense,
            StatName::Speed => &mut self.battle_stats.speed,
            StatName::Accuracy => &mut self.accuracy,
            StatName::Evasion => &mut self.evasion,
        };
        *slot = clamped;
        clamped
    }

    /// Apply a relative stage change. Returns (new stage, hit the limit).
    pub fn apply_stages(&mut self, stat: StatName, stages: i8) -> (i8, bool) {
        let current = self.stage(stat);
        let new_stage = self.set_stage(stat, current.saturating_add(stages));
        (new_stage, new_stage == current)
    }

    pub fn get_multiplier(&self, stat: StatName) -> f32 {
        let stage = self.stage(stat);
        match stat {
            // Accuracy and evasion use the 3/3 formula
            StatName::Accuracy | StatName::Evasion => {
                if stage >= 0 {
                    (3.0 + stage as f32) / 3.0
                } else {
                    3.0 / (3.0 - stage as f32)
                }
            }
            // Other stats use the 2/2 formula
            _ => {
                if stage >= 0 {
                    (2.0 + stage as f32) / 2.0
                } else {
                    2.0 / (2.0 - stage as f32)
                }
            }
        }
    }
}

/// Level-scaled stats from base stats. HP uses its own formula.
pub fn calculate_stats(base_stats: &BaseStats, level: u32) -> CalculatedStats {
    let hp = (2 * base_stats.hp * level) / 100 + level + 10;
    CalculatedStats {
        hp,
        attack: calculate_stat(base_stats.attack, level),
        defense: calculate_stat(base_stats.defense, level),
        special_attack: calculate_stat(base_stats.special_attack, level),
        special_defense: calculate_stat(base_stats.special_defense, level),
        speed: calculate_stat(base_stats.speed, level),
    }
}

fn calculate_stat(base: u32, level: u32) -> u32 {
    (2 * base * level) / 100 + 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_clamps_at_bounds() {
        let mut mods = BattleStatModifiers::default();
        let (stage, _) = mods.apply_stages(StatName::Attack, 4);
        assert_eq!(stage, 4);
        let (stage, at_limit) = mods.apply_stages(StatName::Attack, 4);
        assert_eq!(stage, 6);
        assert!(!at_limit);
        let (stage, at_limit) = mods.apply_stages(StatName::Attack, 1);
        assert_eq!(stage, 6);
        assert!(at_limit);

        let (stage, _) = mods.apply_stages(StatName::Speed, -8);
        assert_eq!(stage, -6);
    }

    #[test]
    fn multiplier_formulas() {
        let mut mods = BattleStatModifiers::default();
        assert_eq!(mods.get_multiplier(StatName::Attack), 1.0);
        mods.set_stage(StatName::Attack, 2);
        assert_eq!(mods.get_multiplier(StatName::Attack), 2.0);
        mods.set_stage(StatName::Attack, -2);
        assert_eq!(mods.get_multiplier(StatName::Attack), 0.5);
        mods.set_stage(StatName::Accuracy, 3);
        assert_eq!(mods.get_multiplier(StatName::Accuracy), 2.0);
    }

    #[test]
    fn level_scaling() {
        let base = BaseStats {
            hp: 45,
            attack: 49,
            defense: 49,
            special_attack: 65,
            special_defense: 65,
            speed: 45,
        };
        let at_50 = calculate_stats(&base, 50);
        assert_eq!(at_50.hp, 105);
        assert_eq!(at_50.attack, 54);
        let at_5 = calculate_stats(&base, 5);
        assert!(at_5.hp < at_50.hp);
    }
}
