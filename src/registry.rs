use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::models::ServerMessage;

/// Connected player with the channel feeding their websocket writer task.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    pub username: String,
    pub sender: UnboundedSender<ServerMessage>,
}

/// Registry of connected players keyed by player id.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: DashMap<String, PlayerHandle>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, player_id: &str, username: &str, sender: UnboundedSender<ServerMessage>) {
        self.players.insert(
            player_id.to_string(),
            PlayerHandle {
                username: username.to_string(),
                sender,
            },
        );
    }

    pub fn unregister(&self, player_id: &str) {
        self.players.remove(player_id);
    }

    pub fn is_online(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    pub fn username_of(&self, player_id: &str) -> Option<String> {
        self.players.get(player_id).map(|h| h.username.clone())
    }

    /// Queues a message for a player. Dropped silently with a log line when
    /// the player has disconnected; battle cleanup happens on the socket task.
    pub fn send_to_player(&self, player_id: &str, message: ServerMessage) {
        if let Some(handle) = self.players.get(player_id) {
            if handle.sender.send(message).is_err() {
                warn!(player_id, "player channel closed, dropping message");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn send_reaches_registered_player() {
        let registry = PlayerRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.register("p1", "Red", tx);

        registry.send_to_player("p1", ServerMessage::Pong);
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::Pong)));

        registry.unregister("p1");
        assert!(!registry.is_online("p1"));
        registry.send_to_player("p1", ServerMessage::Pong);
        assert!(rx.try_recv().is_err());
    }
}
