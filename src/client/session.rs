use std::time::Duration;

use tracing::warn;
use uuid::Uuid;

use crate::combat::moves::PokemonType;
use crate::combat::state::{
    BattleEntityRef, BattleEvent, BattleMoveView, BattlePokemonPrivateView,
    BattlePokemonPublicView, BattlePokemonTeamOverview, FieldState, StatusCondition,
    VolatileStatusType, WeatherState,
};
use crate::stats::BattleStatModifiers;

/// Extra delay a renderer should hold before animating the HP bar, so the
/// effectiveness text registers first. The state mutation itself is immediate.
pub const HP_COMMIT_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleMode {
    Wild,
    PvP,
}

/// Which side of the battle an entity belongs to, from the local
/// client's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Player,
    Opponent,
}

/// Mirror of one active combatant, updated by events and snapshots.
#[derive(Debug, Clone)]
pub struct CombatantState {
    pub template_id: u32,
    pub name: String,
    pub level: u32,
    pub current_hp: u32,
    pub max_hp: u32,
    pub hp_percent: f32,
    pub types: Vec<PokemonType>,
    pub status: Option<StatusCondition>,
    pub volatile_statuses: Vec<VolatileStatusType>,
    pub stat_modifiers: BattleStatModifiers,
    pub moves: Vec<BattleMoveView>,
    pub team_slot: usize,
    pub is_fainted: bool,
    /// Turn on which an event last touched HP. A snapshot for the same turn
    /// must not overwrite HP, or a stale snapshot racing a damage event would
    /// visually heal the combatant.
    pub hp_touched_turn: Option<u32>,
}

impl CombatantState {
    pub fn from_private(view: &BattlePokemonPrivateView) -> Self {
        CombatantState {
            template_id: view.template_id,
            name: view.name.clone(),
            level: view.level,
            current_hp: view.current_hp,
            max_hp: view.max_hp,
            hp_percent: view.current_hp_percent,
            types: view.types.clone(),
            status: view.status,
            volatile_statuses: view.volatile_statuses.clone(),
            stat_modifiers: view.stat_modifiers.clone(),
            moves: view.moves.clone(),
            team_slot: view.team_index,
            is_fainted: view.is_fainted,
            hp_touched_turn: None,
        }
    }

    /// Public views only carry an HP fraction; the absolute value is
    /// reconstructed for display and replaced by event-carried absolutes.
    pub fn from_public(view: &BattlePokemonPublicView, team_slot: usize) -> Self {
        let current_hp = (view.current_hp_percent * view.max_hp as f32).round() as u32;
        CombatantState {
            template_id: view.template_id,
            name: view.name.clone(),
            level: view.level,
            current_hp,
            max_hp: view.max_hp,
            hp_percent: view.current_hp_percent,
            types: view.types.clone(),
            status: view.status,
            volatile_statuses: Vec::new(),
            stat_modifiers: view.stat_modifiers.clone(),
            moves: Vec::new(),
            team_slot,
            is_fainted: view.is_fainted,
            hp_touched_turn: None,
        }
    }

    fn set_hp(&mut self, new_hp: u32, max_hp: u32, turn: u32) {
        self.current_hp = new_hp;
        self.max_hp = max_hp;
        self.hp_percent = if max_hp == 0 { 0.0 } else { new_hp as f32 / max_hp as f32 };
        if new_hp == 0 {
            self.is_fainted = true;
        }
        self.hp_touched_turn = Some(turn);
    }
}

/// Summary entry for the switch menu and team sidebar.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    pub template_id: u32,
    pub name: String,
    pub level: u32,
    pub current_hp: u32,
    pub max_hp: u32,
    pub hp_percent: f32,
    pub status: Option<StatusCondition>,
    pub is_fainted: bool,
    pub team_slot: usize,
}

impl RosterEntry {
    fn from_overview(view: &BattlePokemonTeamOverview) -> Self {
        RosterEntry {
            template_id: view.template_id,
            name: view.name.clone(),
            level: view.level,
            current_hp: view.current_hp,
            max_hp: view.max_hp,
            hp_percent: view.current_hp_percent,
            status: view.status,
            is_fainted: view.is_fainted,
            team_slot: view.team_index,
        }
    }
}

/// One side of the mirrored battle.
#[derive(Debug, Clone)]
pub struct SideState {
    pub active: CombatantState,
    pub roster: Vec<RosterEntry>,
}

/// Structured outcome of applying one event, enough for a renderer to act
/// without re-deriving game logic.
#[derive(Debug, Clone)]
pub struct EventDelta {
    pub message: String,
    pub side: Option<Side>,
    pub new_hp: Option<(u32, u32)>,
    pub hp_commit_delay: Option<Duration>,
}

impl EventDelta {
    fn message(text: impl Into<String>) -> Self {
        EventDelta {
            message: text.into(),
            side: None,
            new_hp: None,
            hp_commit_delay: None,
        }
    }
}

/// Client-side record of one ongoing battle. The single source of truth for
/// what the battle looks like right now.
#[derive(Debug)]
pub struct BattleSession {
    pub battle_id: Uuid,
    pub mode: BattleMode,
    pub turn_number: u32,
    pub field_state: FieldState,
    pub player: SideState,
    pub opponent: SideState,
    /// PvP only: whether the local client is the server's player1.
    pub is_player1: bool,
}

impl BattleSession {
    pub fn new_wild(
        battle_id: Uuid,
        initial_pokemon: &BattlePokemonPrivateView,
        wild_pokemon: &BattlePokemonPublicView,
        player_team: &[BattlePokemonTeamOverview],
        field_state: FieldState,
    ) -> Self {
        BattleSession {
            battle_id,
            mode: BattleMode::Wild,
            turn_number: 1,
            field_state,
            player: SideState {
                active: CombatantState::from_private(initial_pokemon),
                roster: player_team.iter().map(RosterEntry::from_overview).collect(),
            },
            opponent: SideState {
                active: CombatantState::from_public(wild_pokemon, 0),
                roster: Vec::new(),
            },
            is_player1: false,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new_pvp(
        battle_id: Uuid,
        initial_pokemon: &BattlePokemonPrivateView,
        opponent_pokemon: &BattlePokemonPublicView,
        player_team: &[BattlePokemonTeamOverview],
        opponent_team: &[BattlePokemonTeamOverview],
        field_state: FieldState,
        is_player1: bool,
        turn_number: Option<u32>,
    ) -> Self {
        BattleSession {
            battle_id,
            mode: BattleMode::PvP,
            turn_number: turn_number.unwrap_or(1),
            field_state,
            player: SideState {
                active: CombatantState::from_private(initial_pokemon),
                roster: player_team.iter().map(RosterEntry::from_overview).collect(),
            },
            opponent: SideState {
                active: CombatantState::from_public(opponent_pokemon, opponent_pokemon.team_index),
                roster: opponent_team.iter().map(RosterEntry::from_overview).collect(),
            },
            is_player1,
        }
    }

    /// Maps a wire entity reference onto a local side. `player1`/`player2`
    /// references are resolved through the side assignment from the start
    /// message, never assumed.
    pub fn resolve_side(&self, entity: &BattleEntityRef) -> Side {
        match entity {
            BattleEntityRef::Player { .. } => Side::Player,
            BattleEntityRef::Wild => Side::Opponent,
            BattleEntityRef::Player1 { .. } => {
                if self.is_player1 {
                    Side::Player
                } else {
                    Side::Opponent
                }
            }
            BattleEntityRef::Player2 { .. } => {
                if self.is_player1 {
                    Side::Opponent
                } else {
                    Side::Player
                }
            }
        }
    }

    pub fn get_active(&self, side: Side) -> &CombatantState {
        match side {
            Side::Player => &self.player.active,
            Side::Opponent => &self.opponent.active,
        }
    }

    pub fn get_roster(&self, side: Side) -> &[RosterEntry] {
        match side {
            Side::Player => &self.player.roster,
            Side::Opponent => &self.opponent.roster,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideState {
        match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }

    fn sync_roster_hp(&mut self, side: Side) {
        let state = self.side_mut(side);
        let slot = state.active.team_slot;
        let (hp, max, percent, fainted, status) = (
            state.active.current_hp,
            state.active.max_hp,
            state.active.hp_percent,
            state.active.is_fainted,
            state.active.status,
        );
        if let Some(entry) = state.roster.iter_mut().find(|e| e.team_slot == slot) {
            entry.current_hp = hp;
            entry.max_hp = max;
            entry.hp_percent = percent;
            entry.is_fainted = fainted;
            entry.status = status;
        }
    }

    /// Applies one event, mutating exactly the fields the discriminant
    /// implies, and returns the observable delta.
    pub fn apply_event(&mut self, event: &BattleEvent) -> EventDelta {
        match event {
            BattleEvent::TurnStart { turn_number } => {
                self.turn_number = *turn_number;
                EventDelta::message(format!("Turn {}", turn_number))
            }
            BattleEvent::MoveUsed { source, move_name, .. } => {
                let side = self.resolve_side(source);
                let name = self.get_active(side).name.clone();
                EventDelta {
                    message: format!("{} used {}!", name, move_name),
                    side: Some(side),
                    new_hp: None,
                    hp_commit_delay: None,
                }
            }
            BattleEvent::MoveFailed { reason, .. } => EventDelta::message(reason.clone()),
            BattleEvent::DamageDealt { target, new_hp, max_hp, effectiveness, is_critical, .. } => {
                let side = self.resolve_side(target);
                let turn = self.turn_number;
                let active = &mut self.side_mut(side).active;
                active.set_hp(*new_hp, *max_hp, turn);
                let name = active.name.clone();
                self.sync_roster_hp(side);
                let mut message = format!("{} took damage!", name);
                if *is_critical {
                    message.push_str(" A critical hit!");
                }
                if *effectiveness > 1.0 {
                    message.push_str(" It's super effective!");
                } else if *effectiveness > 0.0 && *effectiveness < 1.0 {
                    message.push_str(" It's not very effective...");
                }
                EventDelta {
                    message,
                    side: Some(side),
                    new_hp: Some((*new_hp, *max_hp)),
                    hp_commit_delay: Some(HP_COMMIT_DELAY),
                }
            }
            BattleEvent::Heal { target, new_hp, max_hp, .. } => {
                let side = self.resolve_side(target);
                let turn = self.turn_number;
                let active = &mut self.side_mut(side).active;
                active.set_hp(*new_hp, *max_hp, turn);
                let name = active.name.clone();
                self.sync_roster_hp(side);
                EventDelta {
                    message: format!("{} regained health!", name),
                    side: Some(side),
                    new_hp: Some((*new_hp, *max_hp)),
                    hp_commit_delay: None,
                }
            }
            BattleEvent::StatusApplied { target, status } => {
                let side = self.resolve_side(target);
                self.side_mut(side).active.status = Some(*status);
                self.sync_roster_hp(side);
                let name = self.get_active(side).name.clone();
                EventDelta::message(format!("{} is now {:?}!", name, status))
            }
            BattleEvent::StatusRemoved { target, .. } => {
                let side = self.resolve_side(target);
                self.side_mut(side).active.status = None;
                self.sync_roster_hp(side);
                let name = self.get_active(side).name.clone();
                EventDelta::message(format!("{} recovered!", name))
            }
            BattleEvent::StatusDamage { target, new_hp, max_hp, status, .. } => {
                let side = self.resolve_side(target);
                let turn = self.turn_number;
                let active = &mut self.side_mut(side).active;
                active.set_hp(*new_hp, *max_hp, turn);
                let name = active.name.clone();
                self.sync_roster_hp(side);
                EventDelta {
                    message: format!("{} is hurt by {:?}!", name, status),
                    side: Some(side),
                    new_hp: Some((*new_hp, *max_hp)),
                    hp_commit_delay: Some(HP_COMMIT_DELAY),
                }
            }
            BattleEvent::VolatileStatusApplied { target, volatile_status } => {
                let side = self.resolve_side(target);
                let active = &mut self.side_mut(side).active;
                if !active.volatile_statuses.contains(volatile_status) {
                    active.volatile_statuses.push(*volatile_status);
                }
                EventDelta::message(format!("{} is affected by {:?}!", self.get_active(side).name, volatile_status))
            }
            BattleEvent::VolatileStatusRemoved { target, volatile_status } => {
                let side = self.resolve_side(target);
                let active = &mut self.side_mut(side).active;
                active.volatile_statuses.retain(|v| v != volatile_status);
                EventDelta::message(format!("{} shook off {:?}!", self.get_active(side).name, volatile_status))
            }
            BattleEvent::StatChange { target, stat, stages, new_stage, .. } => {
                let side = self.resolve_side(target);
                self.side_mut(side).active.stat_modifiers.set_stage(*stat, *new_stage);
                let name = self.get_active(side).name.clone();
                let direction = if *stages > 0 { "rose" } else { "fell" };
                EventDelta::message(format!("{}'s {:?} {}!", name, stat, direction))
            }
            BattleEvent::PokemonFainted { target } => {
                // Idempotent: a repeat application changes nothing further
                let side = self.resolve_side(target);
                self.side_mut(side).active.is_fainted = true;
                self.sync_roster_hp(side);
                let name = self.get_active(side).name.clone();
                EventDelta {
                    message: format!("{} fainted!", name),
                    side: Some(side),
                    new_hp: None,
                    hp_commit_delay: None,
                }
            }
            BattleEvent::SwitchIn { entity, pokemon_view, team_index } => {
                let side = self.resolve_side(entity);
                self.side_mut(side).active = CombatantState::from_public(pokemon_view, *team_index);
                self.sync_roster_hp(side);
                EventDelta {
                    message: format!("{} was sent out!", pokemon_view.name),
                    side: Some(side),
                    new_hp: None,
                    hp_commit_delay: None,
                }
            }
            BattleEvent::WeatherStarted { weather_type } => {
                self.field_state.weather = Some(WeatherState {
                    weather_type: *weather_type,
                    turns_left: 5,
                });
                EventDelta::message(format!("The weather changed: {:?}!", weather_type))
            }
            BattleEvent::WeatherEnded => {
                self.field_state.weather = None;
                EventDelta::message("The weather returned to normal.")
            }
            BattleEvent::FieldEffectApplied { effect_type, .. } => {
                EventDelta::message(format!("{:?} took effect!", effect_type))
            }
            BattleEvent::FieldEffectEnded { effect_type, .. } => {
                EventDelta::message(format!("{:?} wore off.", effect_type))
            }
            BattleEvent::ItemUsed { item_name, .. } => {
                EventDelta::message(format!("Used {}!", item_name))
            }
            BattleEvent::CaptureAttempt { shake_count, success, .. } => {
                if *success {
                    EventDelta::message("Gotcha!")
                } else {
                    EventDelta::message(format!("The ball shook {} times, then it broke free!", shake_count))
                }
            }
            BattleEvent::WildPokemonFled => {
                EventDelta::message(format!("The wild {} fled!", self.opponent.active.name))
            }
            BattleEvent::PlayerRanAway { success } => {
                if *success {
                    EventDelta::message("Got away safely!")
                } else {
                    EventDelta::message("Couldn't get away!")
                }
            }
            BattleEvent::ExpGained { amount, .. } => {
                EventDelta::message(format!("Gained {} EXP!", amount))
            }
            BattleEvent::GenericMessage { message } => EventDelta::message(message.clone()),
        }
    }

    /// Merges a private snapshot into the player side. Identity, moves and
    /// stat fields are always snapshot-authoritative; HP only when no event
    /// for the current turn has already touched it.
    pub fn apply_private_snapshot(&mut self, view: &BattlePokemonPrivateView) {
        let turn = self.turn_number;
        let active = &mut self.player.active;
        if active.team_slot != view.team_index {
            self.player.active = CombatantState::from_private(view);
            self.sync_roster_hp(Side::Player);
            return;
        }
        active.template_id = view.template_id;
        active.name = view.name.clone();
        active.level = view.level;
        active.types = view.types.clone();
        active.status = view.status;
        active.volatile_statuses = view.volatile_statuses.clone();
        active.stat_modifiers = view.stat_modifiers.clone();
        active.moves = view.moves.clone();
        if active.hp_touched_turn == Some(turn) {
            warn!(turn, "snapshot HP ignored, already touched by an event this turn");
        } else {
            active.current_hp = view.current_hp;
            active.max_hp = view.max_hp;
            active.hp_percent = view.current_hp_percent;
            active.is_fainted = view.is_fainted;
        }
        self.sync_roster_hp(Side::Player);
    }

    /// Same merge rule for the opponent's public view. The snapshot's team
    /// slot decides whether this is still the same combatant.
    pub fn apply_public_snapshot(&mut self, view: &BattlePokemonPublicView) {
        let turn = self.turn_number;
        let active = &mut self.opponent.active;
        if active.team_slot != view.team_index || active.template_id != view.template_id {
            self.opponent.active = CombatantState::from_public(view, view.team_index);
            self.sync_roster_hp(Side::Opponent);
            return;
        }
        active.name = view.name.clone();
        active.level = view.level;
        active.types = view.types.clone();
        active.status = view.status;
        active.stat_modifiers = view.stat_modifiers.clone();
        if active.hp_touched_turn == Some(turn) {
            warn!(turn, "opponent snapshot HP ignored, already touched this turn");
        } else {
            let current_hp = (view.current_hp_percent * view.max_hp as f32).round() as u32;
            active.current_hp = current_hp;
            active.max_hp = view.max_hp;
            active.hp_percent = view.current_hp_percent;
            active.is_fainted = view.is_fainted;
        }
        self.sync_roster_hp(Side::Opponent);
    }

    pub fn apply_roster(&mut self, side: Side, overview: &[BattlePokemonTeamOverview]) {
        self.side_mut(side).roster = overview.iter().map(RosterEntry::from_overview).collect();
    }

    pub fn is_over(&self) -> bool {
        let player_out = self.player.active.is_fainted
            && self.player.roster.iter().all(|e| e.is_fainted);
        let opponent_out = self.opponent.active.is_fainted
            && (self.opponent.roster.is_empty() || self.opponent.roster.iter().all(|e| e.is_fainted));
        player_out || opponent_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::moves::MoveRepository;

    fn session() -> BattleSession {
        let repo = MoveRepository::builtin();
        let player = repo.build_pokemon(25, 20, 0, false).unwrap();
        let backup = repo.build_pokemon(1, 20, 1, false).unwrap();
        let wild = repo.build_pokemon(19, 10, 0, true).unwrap();
        BattleSession::new_wild(
            Uuid::new_v4(),
            &BattlePokemonPrivateView::from_battle_pokemon(&player, &repo),
            &BattlePokemonPublicView::from_battle_pokemon(&wild),
            &[
                BattlePokemonTeamOverview::from_battle_pokemon(&player),
                BattlePokemonTeamOverview::from_battle_pokemon(&backup),
            ],
            FieldState::default(),
        )
    }

    fn damage(target: BattleEntityRef, new_hp: u32, max_hp: u32) -> BattleEvent {
        BattleEvent::DamageDealt {
            target,
            damage: 10,
            new_hp,
            max_hp,
            effectiveness: 1.0,
            is_critical: false,
        }
    }

    #[test]
    fn damage_clamps_and_faints_together() {
        let mut session = session();
        session.apply_event(&damage(BattleEntityRef::Wild, 0, 100));
        let wild = session.get_active(Side::Opponent);
        assert_eq!(wild.current_hp, 0);
        assert!(wild.is_fainted, "hp reaching zero must flag fainted");
    }

    #[test]
    fn fainted_event_is_idempotent() {
        let mut session = session();
        session.apply_event(&damage(BattleEntityRef::Wild, 0, 100));
        session.apply_event(&BattleEvent::PokemonFainted { target: BattleEntityRef::Wild });
        let before = session.get_active(Side::Opponent).clone();
        session.apply_event(&BattleEvent::PokemonFainted { target: BattleEntityRef::Wild });
        let after = session.get_active(Side::Opponent);
        assert!(after.is_fainted);
        assert_eq!(before.current_hp, after.current_hp);
        assert_eq!(before.status, after.status);
    }

    #[test]
    fn snapshot_does_not_overwrite_same_turn_hp() {
        let repo = MoveRepository::builtin();
        let mut session = session();
        let slot = session.player.active.team_slot;
        let stale_hp = session.player.active.max_hp;

        session.apply_event(&damage(BattleEntityRef::Player { team_index: slot }, 12, 50));
        assert_eq!(session.player.active.current_hp, 12);

        // A stale request_action snapshot still carrying full HP for this turn
        let full = repo.build_pokemon(25, 20, slot, false).unwrap();
        let view = BattlePokemonPrivateView::from_battle_pokemon(&full, &repo);
        session.apply_private_snapshot(&view);
        assert_eq!(session.player.active.current_hp, 12, "snapshot must not heal the mirror");
        assert_ne!(session.player.active.current_hp, stale_hp);
        // Identity fields still came through
        assert!(!session.player.active.moves.is_empty());
    }

    #[test]
    fn snapshot_hp_applies_on_a_later_turn() {
        let repo = MoveRepository::builtin();
        let mut session = session();
        let slot = session.player.active.team_slot;
        session.apply_event(&damage(BattleEntityRef::Player { team_index: slot }, 12, 50));

        session.apply_event(&BattleEvent::TurnStart { turn_number: 2 });
        let full = repo.build_pokemon(25, 20, slot, false).unwrap();
        let view = BattlePokemonPrivateView::from_battle_pokemon(&full, &repo);
        session.apply_private_snapshot(&view);
        assert_eq!(session.player.active.current_hp, view.current_hp);
    }

    #[test]
    fn pvp_side_resolution_maps_player1_to_local_side() {
        let repo = MoveRepository::builtin();
        let mine = repo.build_pokemon(25, 20, 0, false).unwrap();
        let theirs = repo.build_pokemon(7, 20, 0, false).unwrap();
        let session = BattleSession::new_pvp(
            Uuid::new_v4(),
            &BattlePokemonPrivateView::from_battle_pokemon(&mine, &repo),
            &BattlePokemonPublicView::from_battle_pokemon(&theirs),
            &[BattlePokemonTeamOverview::from_battle_pokemon(&mine)],
            &[BattlePokemonTeamOverview::from_battle_pokemon(&theirs)],
            FieldState::default(),
            true,
            None,
        );
        assert_eq!(session.resolve_side(&BattleEntityRef::Player1 { team_index: 0 }), Side::Player);
        assert_eq!(session.resolve_side(&BattleEntityRef::Player2 { team_index: 0 }), Side::Opponent);
    }

    #[test]
    fn same_species_opponent_swap_updates_the_slot() {
        let repo = MoveRepository::builtin();
        let mine = repo.build_pokemon(25, 20, 0, false).unwrap();
        let their_lead = repo.build_pokemon(7, 20, 0, false).unwrap();
        let mut their_backup = repo.build_pokemon(7, 20, 1, false).unwrap();
        their_backup.take_damage(10);
        let mut session = BattleSession::new_pvp(
            Uuid::new_v4(),
            &BattlePokemonPrivateView::from_battle_pokemon(&mine, &repo),
            &BattlePokemonPublicView::from_battle_pokemon(&their_lead),
            &[BattlePokemonTeamOverview::from_battle_pokemon(&mine)],
            &[
                BattlePokemonTeamOverview::from_battle_pokemon(&their_lead),
                BattlePokemonTeamOverview::from_battle_pokemon(&their_backup),
            ],
            FieldState::default(),
            true,
            None,
        );
        assert_eq!(session.opponent.active.team_slot, 0);

        session.apply_public_snapshot(&BattlePokemonPublicView::from_battle_pokemon(&their_backup));
        assert_eq!(session.opponent.active.team_slot, 1);
        assert_eq!(session.opponent.active.current_hp, their_backup.current_hp);
    }

    #[test]
    fn switch_ins_keep_one_active_slot() {
        let repo = MoveRepository::builtin();
        let mut session = session();
        for slot in [1usize, 0, 1] {
            let mon = repo.build_pokemon(1, 20, slot, false).unwrap();
            session.apply_event(&BattleEvent::SwitchIn {
                entity: BattleEntityRef::Player { team_index: slot },
                pokemon_view: BattlePokemonPublicView::from_battle_pokemon(&mon),
                team_index: slot,
            });
            assert_eq!(session.player.active.team_slot, slot);
            let active_entries = session
                .player
                .roster
                .iter()
                .filter(|e| e.team_slot == session.player.active.team_slot)
                .count();
            assert_eq!(active_entries, 1);
        }
    }

    #[test]
    fn damage_delta_carries_hp_commit_delay() {
        let mut session = session();
        let delta = session.apply_event(&damage(BattleEntityRef::Wild, 40, 100));
        assert_eq!(delta.hp_commit_delay, Some(HP_COMMIT_DELAY));
        assert_eq!(delta.new_hp, Some((40, 100)));
    }
}
