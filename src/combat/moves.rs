use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::combat::state::{BattleMove, BattlePokemon, StatusCondition};
use crate::stats::{calculate_stats, BaseStats, BattleStatModifiers, StatName};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PokemonType {
    Normal,
    Fire,
    Water,
    Grass,
    Electric,
    Rock,
    Flying,
    Poison,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EffectTarget {
    User,
    Target,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatChangeData {
    pub stat: StatName,
    pub stages: i8,
}

/// Non-damaging consequences a move can carry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "effect_type", rename_all = "snake_case")]
pub enum EffectData {
    ApplyStatus { status: StatusCondition, target: EffectTarget },
    StatChange { changes: Vec<StatChangeData>, target: EffectTarget },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryEffect {
    /// Percent chance the effect triggers after the move hits
    pub chance: u8,
    pub effect: EffectData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveData {
    pub id: u32,
    pub name: String,
    pub move_type: PokemonType,
    pub category: MoveCategory,
    pub power: Option<u32>,
    pub accuracy: Option<u8>,
    pub pp: u8,
    pub effect: Option<EffectData>,
    pub secondary_effect: Option<SecondaryEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesTemplate {
    pub id: u32,
    pub name: String,
    pub types: Vec<PokemonType>,
    pub base_stats: BaseStats,
    pub moves: Vec<u32>,
    pub base_exp: u32,
}

/// Repository of move data, species templates and the type chart.
///
/// Loads from JSON when paths are configured, otherwise falls back to the
/// built-in table so the server runs without resource files.
#[derive(Debug)]
pub struct MoveRepository {
    moves: HashMap<u32, MoveData>,
    species: HashMap<u32, SpeciesTemplate>,
    type_chart: HashMap<PokemonType, HashMap<PokemonType, f32>>,
}

impl MoveRepository {
    pub fn load(moves_path: Option<&str>, species_path: Option<&str>) -> Self {
        let mut repo = Self::builtin();
        if let Some(path) = moves_path {
            match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|s| {
                serde_json::from_str::<Vec<MoveData>>(&s).map_err(|e| e.to_string())
            }) {
                Ok(moves) => repo.moves = moves.into_iter().map(|m| (m.id, m)).collect(),
                Err(e) => warn!("Failed to load moves from {}: {}. Using built-in table.", path, e),
            }
        }
        if let Some(path) = species_path {
            match std::fs::read_to_string(path).map_err(|e| e.to_string()).and_then(|s| {
                serde_json::from_str::<Vec<SpeciesTemplate>>(&s).map_err(|e| e.to_string())
            }) {
                Ok(species) => repo.species = species.into_iter().map(|t| (t.id, t)).collect(),
                Err(e) => warn!("Failed to load species from {}: {}. Using built-in table.", path, e),
            }
        }
        repo
    }

    pub fn get_move(&self, move_id: u32) -> Option<&MoveData> {
        self.moves.get(&move_id)
    }

    pub fn get_species(&self, template_id: u32) -> Option<&SpeciesTemplate> {
        self.species.get(&template_id)
    }

    pub fn species_ids(&self) -> Vec<u32> {
        self.species.keys().copied().collect()
    }

    pub fn type_effectiveness(&self, attack_type: PokemonType, defender_types: &[PokemonType]) -> f32 {
        let mut total = 1.0;
        if let Some(row) = self.type_chart.get(&attack_type) {
            for defender in defender_types {
                if let Some(mult) = row.get(defender) {
                    total *= mult;
                }
            }
        }
        total
    }

    pub fn exp_yield(&self, template_id: u32, level: u32) -> u32 {
        let base = self
            .get_species(template_id)
            .map(|s| s.base_exp)
            .unwrap_or(64);
        base * level / 7
    }

    /// Build a battle-ready Pokemon from a species template.
    pub fn build_pokemon(&self, template_id: u32, level: u32, position: usize, is_wild: bool) -> Option<BattlePokemon> {
        let template = self.get_species(template_id)?;
        let stats = calculate_stats(&template.base_stats, level);
        let moves = template
            .moves
            .iter()
            .take(4)
            .filter_map(|id| {
                self.get_move(*id).map(|m| BattleMove {
                    move_id: m.id,
                    current_pp: m.pp,
                    max_pp: m.pp,
                })
            })
            .collect();
        Some(BattlePokemon {
            template_id,
            name: template.name.clone(),
            level,
            pokemon_types: template.types.clone(),
            moves,
            current_hp: stats.hp,
            max_hp: stats.hp,
            calculated_stats: stats,
            status: None,
            status_turns: 0,
            volatile_statuses: HashMap::new(),
            stat_modifiers: BattleStatModifiers::default(),
            is_fainted: false,
            position,
            is_wild,
        })
    }

    pub fn builtin() -> Self {
        let moves = vec![
            MoveData {
                id: 1,
                name: "Tackle".to_string(),
                move_type: PokemonType::Normal,
                category: MoveCategory::Physical,
                power: Some(40),
                accuracy: Some(100),
                pp: 35,
                effect: None,
                secondary_effect: None,
            },
            MoveData {
                id: 2,
                name: "Ember".to_string(),
                move_type: PokemonType::Fire,
                category: MoveCategory::Special,
                power: Some(40),
                accuracy: Some(100),
                pp: 25,
                effect: None,
                secondary_effect: Some(SecondaryEffect {
                    chance: 10,
                    effect: EffectData::ApplyStatus {
                        status: StatusCondition::Burn,
                        target: EffectTarget::Target,
                    },
                }),
            },
            MoveData {
                id: 3,
                name: "Water Gun".to_string(),
                move_type: PokemonType::Water,
                category: MoveCategory::Special,
                power: Some(40),
                accuracy: Some(100),
                pp: 25,
                effect: None,
                secondary_effect: None,
            },
            MoveData {
                id: 4,
                name: "Vine Whip".to_string(),
                move_type: PokemonType::Grass,
                category: MoveCategory::Physical,
                power: Some(45),
                accuracy: Some(100),
                pp: 25,
                effect: None,
                secondary_effect: None,
            },
            MoveData {
                id: 5,
                name: "Thunder Shock".to_string(),
                move_type: PokemonType::Electric,
                category: MoveCategory::Special,
                power: Some(40),
                accuracy: Some(100),
                pp: 30,
                effect: None,
                secondary_effect: Some(SecondaryEffect {
                    chance: 10,
                    effect: EffectData::ApplyStatus {
                        status: StatusCondition::Paralysis,
                        target: EffectTarget::Target,
                    },
                }),
            },
            MoveData {
                id: 6,
                name: "Growl".to_string(),
                move_type: PokemonType::Normal,
                category: MoveCategory::Status,
                power: None,
                accuracy: Some(100),
                pp: 40,
                effect: Some(EffectData::StatChange {
                    changes: vec![StatChangeData {
                        stat: StatName::Attack,
                        stages: -1,
                    }],
                    target: EffectTarget::Target,
                }),
                secondary_effect: None,
            },
            MoveData {
                id: 7,
                name: "Tail Whip".to_string(),
                move_type: PokemonType::Normal,
                category: MoveCategory::Status,
                power: None,
                accuracy: Some(100),
                pp: 30,
                effect: Some(EffectData::StatChange {
                    changes: vec![StatChangeData {
                        stat: StatName::Defense,
                        stages: -1,
                    }],
                    target: EffectTarget::Target,
                }),
                secondary_effect: None,
            },
            MoveData {
                id: 8,
                name: "Poison Sting".to_string(),
                move_type: PokemonType::Poison,
                category: MoveCategory::Physical,
                power: Some(15),
                accuracy: Some(100),
                pp: 35,
                effect: None,
                secondary_effect: Some(SecondaryEffect {
                    chance: 30,
                    effect: EffectData::ApplyStatus {
                        status: StatusCondition::Poison,
                        target: EffectTarget::Target,
                    },
                }),
            },
            // Struggle: used when no move has PP left
            MoveData {
                id: 165,
                name: "Struggle".to_string(),
                move_type: PokemonType::Normal,
                category: MoveCategory::Physical,
                power: Some(50),
                accuracy: None,
                pp: 1,
                effect: None,
                secondary_effect: None,
            },
        ];

        let species = vec![
            SpeciesTemplate {
                id: 1,
                name: "Bulbasaur".to_string(),
                types: vec![PokemonType::Grass, PokemonType::Poison],
                base_stats: BaseStats {
                    hp: 45,
                    attack: 49,
                    defense: 49,
                    special_attack: 65,
                    special_defense: 65,
                    speed: 45,
                },
                moves: vec![1, 4, 6, 8],
                base_exp: 64,
            },
            SpeciesTemplate {
                id: 4,
                name: "Charmander".to_string(),
                types: vec![PokemonType::Fire],
                base_stats: BaseStats {
                    hp: 39,
                    attack: 52,
                    defense: 43,
                    special_attack: 60,
                    special_defense: 50,
                    speed: 65,
                },
                moves: vec![1, 2, 6],
                base_exp: 62,
            },
            SpeciesTemplate {
                id: 7,
                name: "Squirtle".to_string(),
                types: vec![PokemonType::Water],
                base_stats: BaseStats {
                    hp: 44,
                    attack: 48,
                    defense: 65,
                    special_attack: 50,
                    special_defense: 64,
                    speed: 43,
                },
                moves: vec![1, 3, 7],
                base_exp: 63,
            },
            SpeciesTemplate {
                id: 25,
                name: "Pikachu".to_string(),
                types: vec![PokemonType::Electric],
                base_stats: BaseStats {
                    hp: 35,
                    attack: 55,
                    defense: 40,
                    special_attack: 50,
                    special_defense: 50,
                    speed: 90,
                },
                moves: vec![1, 5, 6],
                base_exp: 112,
            },
            SpeciesTemplate {
                id: 16,
                name: "Pidgey".to_string(),
                types: vec![PokemonType::Normal, PokemonType::Flying],
                base_stats: BaseStats {
                    hp: 40,
                    attack: 45,
                    defense: 40,
                    special_attack: 35,
                    special_defense: 35,
                    speed: 56,
                },
                moves: vec![1, 6],
                base_exp: 50,
            },
            SpeciesTemplate {
                id: 19,
                name: "Rattata".to_string(),
                types: vec![PokemonType::Normal],
                base_stats: BaseStats {
                    hp: 30,
                    attack: 56,
                    defense: 35,
                    special_attack: 25,
                    special_defense: 35,
                    speed: 72,
                },
                moves: vec![1, 7],
                base_exp: 51,
            },
        ];

        let mut type_chart: HashMap<PokemonType, HashMap<PokemonType, f32>> = HashMap::new();
        let entries: &[(PokemonType, PokemonType, f32)] = &[
            (PokemonType::Fire, PokemonType::Grass, 2.0),
            (PokemonType::Fire, PokemonType::Water, 0.5),
            (PokemonType::Fire, PokemonType::Fire, 0.5),
            (PokemonType::Fire, PokemonType::Rock, 0.5),
            (PokemonType::Water, PokemonType::Fire, 2.0),
            (PokemonType::Water, PokemonType::Rock, 2.0),
            (PokemonType::Water, PokemonType::Grass, 0.5),
            (PokemonType::Water, PokemonType::Water, 0.5),
            (PokemonType::Grass, PokemonType::Water, 2.0),
            (PokemonType::Grass, PokemonType::Rock, 2.0),
            (PokemonType::Grass, PokemonType::Fire, 0.5),
            (PokemonType::Grass, PokemonType::Grass, 0.5),
            (PokemonType::Grass, PokemonType::Flying, 0.5),
            (PokemonType::Grass, PokemonType::Poison, 0.5),
            (PokemonType::Electric, PokemonType::Water, 2.0),
            (PokemonType::Electric, PokemonType::Flying, 2.0),
            (PokemonType::Electric, PokemonType::Grass, 0.5),
            (PokemonType::Electric, PokemonType::Electric, 0.5),
            (PokemonType::Rock, PokemonType::Fire, 2.0),
            (PokemonType::Rock, PokemonType::Flying, 2.0),
            (PokemonType::Poison, PokemonType::Grass, 2.0),
            (PokemonType::Poison, PokemonType::Poison, 0.5),
            (PokemonType::Poison, PokemonType::Rock, 0.5),
            (PokemonType::Flying, PokemonType::Grass, 2.0),
            (PokemonType::Flying, PokemonType::Rock, 0.5),
            (PokemonType::Flying, PokemonType::Electric, 0.5),
        ];
        for (atk, def, mult) in entries {
            type_chart.entry(*atk).or_default().insert(*def, *mult);
        }

        MoveRepository {
            moves: moves.into_iter().map(|m| (m.id, m)).collect(),
            species: species.into_iter().map(|t| (t.id, t)).collect(),
            type_chart,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tables_are_consistent() {
        let repo = MoveRepository::builtin();
        for id in repo.species_ids() {
            let species = repo.get_species(id).unwrap();
            for move_id in &species.moves {
                assert!(repo.get_move(*move_id).is_some(), "species {} references missing move {}", id, move_id);
            }
        }
    }

    #[test]
    fn type_chart_multiplies_across_dual_types() {
        let repo = MoveRepository::builtin();
        // Grass vs Grass/Poison: 0.5 * 0.5
        let eff = repo.type_effectiveness(
            PokemonType::Grass,
            &[PokemonType::Grass, PokemonType::Poison],
        );
        assert_eq!(eff, 0.25);
        // Unlisted matchup is neutral
        assert_eq!(repo.type_effectiveness(PokemonType::Normal, &[PokemonType::Fire]), 1.0);
    }

    #[test]
    fn build_pokemon_fills_moves_and_hp() {
        let repo = MoveRepository::builtin();
        let pikachu = repo.build_pokemon(25, 12, 0, true).unwrap();
        assert_eq!(pikachu.name, "Pikachu");
        assert_eq!(pikachu.current_hp, pikachu.max_hp);
        assert!(pikachu.current_hp > 0);
        assert!(!pikachu.moves.is_empty());
        assert!(pikachu.moves.len() <= 4);
        assert!(repo.build_pokemon(9999, 5, 0, true).is_none());
    }
}
