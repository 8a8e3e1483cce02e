use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::combat::moves::{MoveCategory, MoveRepository, PokemonType};
use crate::stats::{BattleStatModifiers, CalculatedStats, StatName};

/// Main battle state container for a wild Pokemon encounter
#[derive(Debug)]
pub struct WildBattleState {
    pub battle_id: Uuid,
    pub player: BattlePlayer,
    pub wild_pokemon: BattlePokemon,
    pub turn_number: u32,
    pub battle_phase: BattlePhase,
    pub player_action: Option<PlayerAction>,
    pub wild_action: Option<WildPokemonAction>,
    pub field_state: FieldState,
    pub capture_attempts: Vec<CaptureAttempt>,
    pub run_attempts: u32,
    pub move_repository: Arc<MoveRepository>,
}

impl WildBattleState {
    pub fn new(battle_id: Uuid, player: BattlePlayer, wild_pokemon: BattlePokemon, move_repository: Arc<MoveRepository>) -> Self {
        WildBattleState {
            battle_id,
            player,
            wild_pokemon,
            turn_number: 1,
            battle_phase: BattlePhase::WaitingForPlayerAction,
            player_action: None,
            wild_action: None,
            field_state: FieldState::default(),
            capture_attempts: Vec::new(),
            run_attempts: 0,
            move_repository,
        }
    }
}

/// Main battle state container for a PvP battle between two players
#[derive(Debug)]
pub struct PvPBattleState {
    pub battle_id: Uuid,
    pub player1: BattlePlayer,
    pub player2: BattlePlayer,
    pub turn_number: u32,
    pub battle_phase: BattlePvPPhase,
    pub player1_action: Option<PlayerAction>,
    pub player2_action: Option<PlayerAction>,
    pub field_state: FieldState,
    pub move_repository: Arc<MoveRepository>,
}

impl PvPBattleState {
    pub fn new(battle_id: Uuid, player1: BattlePlayer, player2: BattlePlayer, move_repository: Arc<MoveRepository>) -> Self {
        PvPBattleState {
            battle_id,
            player1,
            player2,
            turn_number: 1,
            battle_phase: BattlePvPPhase::WaitingForBothPlayersActions,
            player1_action: None,
            player2_action: None,
            field_state: FieldState::default(),
            move_repository,
        }
    }

    pub fn get_player_by_id(&self, player_id: &str) -> Option<&BattlePlayer> {
        if self.player1.player_id == player_id {
            Some(&self.player1)
        } else if self.player2.player_id == player_id {
            Some(&self.player2)
        } else {
            None
        }
    }

    pub fn both_actions_submitted(&self) -> bool {
        self.player1_action.is_some() && self.player2_action.is_some()
    }

    /// Whether the actions on hand satisfy the current phase.
    pub fn ready_for_processing(&self) -> bool {
        match self.battle_phase {
            BattlePvPPhase::WaitingForBothPlayersActions => self.both_actions_submitted(),
            BattlePvPPhase::WaitingForPlayer1Switch => self.player1_action.is_some(),
            BattlePvPPhase::WaitingForPlayer2Switch => self.player2_action.is_some(),
            _ => false,
        }
    }
}

/// Phases of a wild battle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BattlePhase {
    WaitingForPlayerAction,
    ProcessingTurn,
    WaitingForSwitch,
    Finished,
}

/// Phases specific to PvP battles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BattlePvPPhase {
    WaitingForBothPlayersActions,
    ProcessingTurn,
    WaitingForPlayer1Switch,
    WaitingForPlayer2Switch,
    Finished,
}

/// One side of a battle: identity plus a switchable team
#[derive(Debug, Clone)]
pub struct BattlePlayer {
    pub player_id: String,
    pub name: String,
    pub team: Vec<BattlePokemon>,
    pub active_pokemon_index: usize,
    pub must_switch: bool,
}

impl BattlePlayer {
    pub fn new(player_id: &str, name: &str, team: Vec<BattlePokemon>) -> Self {
        BattlePlayer {
            player_id: player_id.to_string(),
            name: name.to_string(),
            team,
            active_pokemon_index: 0,
            must_switch: false,
        }
    }

    pub fn active(&self) -> &BattlePokemon {
        &self.team[self.active_pokemon_index]
    }

    pub fn active_mut(&mut self) -> &mut BattlePokemon {
        &mut self.team[self.active_pokemon_index]
    }

    pub fn has_usable_pokemon(&self) -> bool {
        self.team.iter().any(|p| !p.is_fainted)
    }

    pub fn can_switch(&self) -> bool {
        self.team.iter().filter(|p| !p.is_fainted).count() > 1
    }

    pub fn all_fainted(&self) -> bool {
        self.team.iter().all(|p| p.is_fainted)
    }
}

/// A Pokemon in battle with all its dynamic state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePokemon {
    pub template_id: u32,
    pub name: String,
    pub level: u32,
    pub pokemon_types: Vec<PokemonType>,
    pub moves: Vec<BattleMove>,
    pub calculated_stats: CalculatedStats,
    pub current_hp: u32,
    pub max_hp: u32,
    pub status: Option<StatusCondition>,
    pub status_turns: u8,
    pub volatile_statuses: HashMap<VolatileStatusType, VolatileStatusData>,
    pub stat_modifiers: BattleStatModifiers,
    pub is_fainted: bool,
    pub position: usize,
    pub is_wild: bool,
}

impl BattlePokemon {
    pub fn hp_percent(&self) -> f32 {
        if self.max_hp == 0 {
            0.0
        } else {
            self.current_hp as f32 / self.max_hp as f32
        }
    }

    /// Damage clamps at zero and flips the fainted flag in the same mutation.
    pub fn take_damage(&mut self, damage: u32) {
        self.current_hp = self.current_hp.saturating_sub(damage);
        if self.current_hp == 0 {
            self.is_fainted = true;
        }
    }

    /// Clears everything that does not survive a switch-out.
    pub fn reset_on_switch_out(&mut self) {
        self.volatile_statuses.clear();
        self.stat_modifiers = BattleStatModifiers::default();
    }
}

/// A move in battle with PP tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleMove {
    pub move_id: u32,
    pub current_pp: u8,
    pub max_pp: u8,
}

/// Transient conditions that clear on switch-out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum VolatileStatusType {
    Confusion,
    Flinch,
    Taunt,
    LeechSeed,
    Substitute,
    Bound,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum StatusCondition {
    Burn,
    Freeze,
    Paralysis,
    Poison,
    Sleep,
    Toxic,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VolatileStatusData {
    pub turns_left: Option<u8>,
}

/// Global field state affecting both sides
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldState {
    pub weather: Option<WeatherState>,
    pub trick_room_turns: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherState {
    pub weather_type: WeatherType,
    pub turns_left: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum WeatherType {
    Rain,
    HarshSunlight,
    Sandstorm,
    Hail,
}

/// Action a player commits for one turn
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum PlayerAction {
    UseMove { move_index: usize },
    SwitchPokemon { team_index: usize },
    UseItem { item_id: String, is_capture_item: bool },
    Run,
}

/// Action a wild Pokemon takes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum WildPokemonAction {
    UseMove { move_index: usize },
    Struggle,
    Flee,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureAttempt {
    pub ball_type: BallType,
    pub shake_count: u8,
    pub success: bool,
    pub turn_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BallType {
    PokeBall,
    GreatBall,
    UltraBall,
}

impl BallType {
    pub fn from_item_id(item_id: &str) -> Self {
        match item_id {
            "great_ball" => BallType::GreatBall,
            "ultra_ball" => BallType::UltraBall,
            _ => BallType::PokeBall,
        }
    }

    pub fn catch_modifier(&self) -> f32 {
        match self {
            BallType::PokeBall => 1.0,
            BallType::GreatBall => 1.5,
            BallType::UltraBall => 2.0,
        }
    }
}

/// Reason the battle ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BattleEndReason {
    WildPokemonDefeated,
    WildPokemonCaptured,
    WildPokemonFled,
    PlayerRanAway,
    AllPlayerPokemonFainted,
    OpponentDefeated,
    BothSidesDefeated,
    PlayerDisconnected,
    OpponentDisconnected,
}

/// Outcome of a battle from the receiving player's perspective.
///
/// The closed set the client presents: victory, defeat, draw, escape,
/// capture. `Draw` only occurs in PvP, on a double knockout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Copy)]
#[serde(rename_all = "snake_case")]
pub enum BattleOutcome {
    Victory,
    Defeat,
    Draw,
    Escape,
    Capture,
}

/// Event that occurred during battle, replayed by the client one at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "details", rename_all = "snake_case")]
pub enum BattleEvent {
    TurnStart { turn_number: u32 },
    MoveUsed { source: BattleEntityRef, move_id: u32, move_name: String, target: BattleEntityRef },
    MoveFailed { source: BattleEntityRef, reason: String },
    DamageDealt { target: BattleEntityRef, damage: u32, new_hp: u32, max_hp: u32, effectiveness: f32, is_critical: bool },
    Heal { target: BattleEntityRef, amount: u32, new_hp: u32, max_hp: u32 },
    StatusApplied { target: BattleEntityRef, status: StatusCondition },
    StatusRemoved { target: BattleEntityRef, status: StatusCondition },
    StatusDamage { target: BattleEntityRef, status: StatusCondition, damage: u32, new_hp: u32, max_hp: u32 },
    VolatileStatusApplied { target: BattleEntityRef, volatile_status: VolatileStatusType },
    VolatileStatusRemoved { target: BattleEntityRef, volatile_status: VolatileStatusType },
    StatChange { target: BattleEntityRef, stat: StatName, stages: i8, new_stage: i8, success: bool },
    PokemonFainted { target: BattleEntityRef },
    SwitchIn { entity: BattleEntityRef, pokemon_view: BattlePokemonPublicView, team_index: usize },
    WeatherStarted { weather_type: WeatherType },
    WeatherEnded,
    FieldEffectApplied { effect_type: FieldEffectType, target_side: EffectTargetSide },
    FieldEffectEnded { effect_type: FieldEffectType, target_side: EffectTargetSide },
    ItemUsed { item_id: String, item_name: String, target: Option<BattleEntityRef> },
    CaptureAttempt { ball_type: BallType, shake_count: u8, success: bool },
    WildPokemonFled,
    PlayerRanAway { success: bool },
    ExpGained { source: BattleEntityRef, amount: u64 },
    GenericMessage { message: String },
}

/// Reference to the combatant an event concerns. `Wild` never carries a
/// team index; the player variants always do.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum BattleEntityRef {
    Player { team_index: usize },
    Wild,
    Player1 { team_index: usize },
    Player2 { team_index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum FieldEffectType {
    Reflect,
    LightScreen,
    Tailwind,
    TrickRoom,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EffectTargetSide {
    Player,
    Opponent,
    Both,
}

// View structs for client communication

/// Public view of a Pokemon safe to show to the opposing side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePokemonPublicView {
    pub template_id: u32,
    pub name: String,
    pub level: u32,
    pub current_hp_percent: f32,
    pub max_hp: u32,
    pub types: Vec<PokemonType>,
    pub status: Option<StatusCondition>,
    pub stat_modifiers: BattleStatModifiers,
    pub is_fainted: bool,
    pub is_wild: bool,
    pub team_index: usize,
}

/// Private view with full details for the owning player's Pokemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePokemonPrivateView {
    pub template_id: u32,
    pub name: String,
    pub level: u32,
    pub current_hp: u32,
    pub current_hp_percent: f32,
    pub max_hp: u32,
    pub types: Vec<PokemonType>,
    pub status: Option<StatusCondition>,
    pub volatile_statuses: Vec<VolatileStatusType>,
    pub stat_modifiers: BattleStatModifiers,
    pub moves: Vec<BattleMoveView>,
    pub is_fainted: bool,
    pub team_index: usize,
}

/// View of a move with details needed for UI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleMoveView {
    pub move_id: u32,
    pub name: String,
    pub move_type: PokemonType,
    pub category: MoveCategory,
    pub current_pp: u8,
    pub max_pp: u8,
    pub power: Option<u32>,
    pub accuracy: Option<u8>,
}

/// Minimal info for the team sidebar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattlePokemonTeamOverview {
    pub template_id: u32,
    pub name: String,
    pub level: u32,
    pub current_hp_percent: f32,
    pub current_hp: u32,
    pub max_hp: u32,
    pub status: Option<StatusCondition>,
    pub is_fainted: bool,
    pub team_index: usize,
}

impl BattlePokemonTeamOverview {
    pub fn from_battle_pokemon(pokemon: &BattlePokemon) -> Self {
        BattlePokemonTeamOverview {
            template_id: pokemon.template_id,
            name: pokemon.name.clone(),
            level: pokemon.level,
            current_hp_percent: pokemon.hp_percent(),
            current_hp: pokemon.current_hp,
            max_hp: pokemon.max_hp,
            status: pokemon.status,
            is_fainted: pokemon.is_fainted,
            team_index: pokemon.position,
        }
    }
}

impl BattlePokemonPublicView {
    pub fn from_battle_pokemon(pokemon: &BattlePokemon) -> Self {
        BattlePokemonPublicView {
            template_id: pokemon.template_id,
            name: pokemon.name.clone(),
            level: pokemon.level,
            current_hp_percent: pokemon.hp_percent(),
            max_hp: pokemon.max_hp,
            types: pokemon.pokemon_types.clone(),
            status: pokemon.status,
            stat_modifiers: pokemon.stat_modifiers.clone(),
            is_fainted: pokemon.is_fainted,
            is_wild: pokemon.is_wild,
            team_index: pokemon.position,
        }
    }
}

impl BattlePokemonPrivateView {
    pub fn from_battle_pokemon(pokemon: &BattlePokemon, move_repo: &MoveRepository) -> Self {
        BattlePokemonPrivateView {
            template_id: pokemon.template_id,
            name: pokemon.name.clone(),
            level: pokemon.level,
            current_hp: pokemon.current_hp,
            current_hp_percent: pokemon.hp_percent(),
            max_hp: pokemon.max_hp,
            types: pokemon.pokemon_types.clone(),
            status: pokemon.status,
            volatile_statuses: pokemon.volatile_statuses.keys().copied().collect(),
            stat_modifiers: pokemon.stat_modifiers.clone(),
            moves: pokemon
                .moves
                .iter()
                .map(|m| match move_repo.get_move(m.move_id) {
                    Some(data) => BattleMoveView {
                        move_id: m.move_id,
                        name: data.name.clone(),
                        move_type: data.move_type,
                        category: data.category,
                        current_pp: m.current_pp,
                        max_pp: m.max_pp,
                        power: data.power,
                        accuracy: data.accuracy,
                    },
                    None => BattleMoveView {
                        move_id: m.move_id,
                        name: format!("Move {}", m.move_id),
                        move_type: PokemonType::Normal,
                        category: MoveCategory::Physical,
                        current_pp: m.current_pp,
                        max_pp: m.max_pp,
                        power: None,
                        accuracy: None,
                    },
                })
                .collect(),
            is_fainted: pokemon.is_fainted,
            team_index: pokemon.position,
        }
    }
}
