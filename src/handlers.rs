use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::combat::BattleManager;
use crate::models::{ClientMessage, ServerMessage};
use crate::registry::PlayerRegistry;

/// Shared server state handed to every connection.
pub struct AppState {
    pub registry: Arc<PlayerRegistry>,
    pub battle_manager: Arc<BattleManager>,
}

// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "OK"
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let username = match params.get("username") {
        Some(username) if validate_username(username) => username.clone(),
        Some(_) => {
            return (
                axum::http::StatusCode::BAD_REQUEST,
                "Invalid username format. Only alphanumeric characters and underscores are allowed.",
            )
                .into_response()
        }
        None => {
            return (axum::http::StatusCode::BAD_REQUEST, "Username is required").into_response()
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, username))
}

// Validate username format: only alphanumeric and underscores allowed
fn validate_username(username: &str) -> bool {
    if username.is_empty() || username.len() > 20 {
        return false;
    }
    username.chars().all(|c| c.is_alphanumeric() || c == '_')
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, username: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for join message with session token
    let session_token = if let Some(Ok(Message::Text(text))) = ws_receiver.next().await {
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Join { session_token }) => session_token,
            _ => {
                error!("First message must be a join message with session token");
                return;
            }
        }
    } else {
        error!("Failed to receive join message");
        return;
    };

    let player_id = Uuid::new_v4().to_string();
    info!("Player connected: {} (session: {})", player_id, session_token);

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.registry.register(&player_id, &username, tx);

    // Writer task: everything queued for this player goes out here
    let mut writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let welcome = ServerMessage::Welcome {
        id: player_id.clone(),
        username: username.clone(),
    };
    state.registry.send_to_player(&player_id, welcome);

    let state_for_reader = state.clone();
    let player_id_for_reader = player_id.clone();
    let mut reader_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Join { .. }) => {}
                Ok(ClientMessage::Ping) => {
                    state_for_reader
                        .registry
                        .send_to_player(&player_id_for_reader, ServerMessage::Pong);
                }
                Ok(ClientMessage::EngageWild) => {
                    if let Err(e) = state_for_reader
                        .battle_manager
                        .start_wild_battle(&player_id_for_reader)
                        .await
                    {
                        error!("Failed to start wild battle: {}", e);
                        state_for_reader.registry.send_to_player(
                            &player_id_for_reader,
                            ServerMessage::Error {
                                message: format!("Failed to start battle: {}", e),
                            },
                        );
                    }
                }
                Ok(ClientMessage::ChallengePlayer { target_player_id }) => {
                    state_for_reader
                        .battle_manager
                        .challenge_player(&player_id_for_reader, &target_player_id)
                        .await;
                }
                Ok(ClientMessage::RespondToChallenge { challenger_id, accepted }) => {
                    state_for_reader
                        .battle_manager
                        .respond_to_challenge(&player_id_for_reader, &challenger_id, accepted)
                        .await;
                }
                Ok(ClientMessage::CombatAction { battle_id, action }) => {
                    if let Err(e) = state_for_reader
                        .battle_manager
                        .handle_player_action(&player_id_for_reader, battle_id, action)
                        .await
                    {
                        error!("Failed to handle action for battle {}: {}", battle_id, e);
                        state_for_reader
                            .registry
                            .send_to_player(&player_id_for_reader, ServerMessage::Error { message: e });
                    }
                }
                Err(e) => {
                    error!("Failed to parse client message: {}", e);
                }
            }
        }
    });

    tokio::select! {
        _ = &mut reader_task => writer_task.abort(),
        _ = &mut writer_task => reader_task.abort(),
    }

    info!("Player disconnected: {}", player_id);
    state.battle_manager.handle_disconnect(&player_id).await;
    state.registry.unregister(&player_id);
}
