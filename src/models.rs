use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::combat::state::{
    BattleEndReason, BattleEvent, BattleOutcome, BattlePokemonPrivateView,
    BattlePokemonPublicView, BattlePokemonTeamOverview, FieldState, PlayerAction,
};

// Client messages
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { session_token: String },
    Ping,
    /// Request a wild encounter (stand-in for overworld interaction)
    EngageWild,
    ChallengePlayer { target_player_id: String },
    RespondToChallenge { challenger_id: String, accepted: bool },
    CombatAction { battle_id: Uuid, action: PlayerAction },
}

/// Result field of the legacy `battle_result` terminal signal
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BattleResultKind {
    Win,
    Loss,
    Run,
    Capture,
}

// Server messages
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        id: String,
        username: String,
    },
    Pong,
    Error {
        message: String,
    },
    ChallengeReceived {
        challenger_id: String,
        challenger_username: String,
    },
    ChallengeResponse {
        target_player_id: String,
        target_username: String,
        accepted: bool,
    },
    ChallengeFailed {
        reason: String,
    },
    WildBattleStart {
        battle_id: Uuid,
        player_team: Vec<BattlePokemonTeamOverview>,
        initial_pokemon: BattlePokemonPrivateView,
        wild_pokemon: BattlePokemonPublicView,
        initial_field_state: FieldState,
    },
    #[serde(rename = "pvp_battle_start")]
    PvPBattleStart {
        battle_id: Uuid,
        player_team: Vec<BattlePokemonTeamOverview>,
        initial_pokemon: BattlePokemonPrivateView,
        opponent_initial_pokemon: BattlePokemonPublicView,
        opponent_team: Vec<BattlePokemonTeamOverview>,
        initial_field_state: FieldState,
        opponent_username: String,
        opponent_id: String,
        player1_id: String,
        player2_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        turn_number: Option<u32>,
    },
    RequestAction {
        battle_id: Uuid,
        turn_number: u32,
        active_pokemon_state: BattlePokemonPrivateView,
        other_pokemon_state: BattlePokemonPublicView,
        team_overview: Vec<BattlePokemonTeamOverview>,
        field_state: FieldState,
        can_switch: bool,
        must_switch: bool,
    },
    TurnUpdate {
        battle_id: Uuid,
        turn_number: u32,
        #[serde(deserialize_with = "lenient_events")]
        events: Vec<BattleEvent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        opponent_pokemon_state: Option<BattlePokemonPublicView>,
    },
    BattleEnd {
        outcome: BattleOutcome,
        reason: BattleEndReason,
        exp_gained: Option<u32>,
        pokemon_captured: Option<BattlePokemonPublicView>,
    },
    /// Legacy end signal kept for older clients; carries the same terminal
    /// meaning as `battle_end`.
    BattleResult {
        battle_id: Uuid,
        result: BattleResultKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exp_gained: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pokemon_caught: Option<BattlePokemonPublicView>,
    },
}

/// Events decode one at a time: an entry this client does not recognize
/// degrades to a generic message instead of discarding the whole update and
/// every valid event in it.
fn lenient_events<'de, D>(deserializer: D) -> Result<Vec<BattleEvent>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).unwrap_or_else(|e| {
                warn!(error = %e, "unrecognized battle event, downgraded to a message");
                BattleEvent::GenericMessage {
                    message: "Something happened.".to_string(),
                }
            })
        })
        .collect())
}
