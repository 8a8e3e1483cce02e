pub mod controller;
pub mod cycle;
pub mod replay;
pub mod session;
pub mod transport;

pub use controller::{BattleClient, BattleClientError, Observation};
pub use session::BattleSession;
pub use transport::{Connection, ReconnectPolicy};

use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep_until, Instant};
use tracing::warn;

use crate::combat::state::PlayerAction;
use crate::models::ClientMessage;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Drives the battle client from one task: transport delivery, drain timers
/// and player input all funnel through the same `&mut BattleClient`, so no
/// mutation ever interleaves with another.
pub async fn run(
    mut connection: Connection,
    mut client: BattleClient,
    mut actions: UnboundedReceiver<PlayerAction>,
) -> Result<()> {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // Far-future stand-in when no timer is pending keeps select! simple
        let deadline = client
            .next_deadline()
            .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

        tokio::select! {
            message = connection.recv() => {
                client.handle_message(message?, Instant::now());
            }
            action = actions.recv() => {
                let Some(action) = action else { break };
                match client.submit(action) {
                    Ok(message) => connection.send(&message).await?,
                    Err(e) => warn!(error = %e, "action rejected locally"),
                }
            }
            _ = sleep_until(deadline), if client.next_deadline().is_some() => {
                client.on_deadline(Instant::now());
            }
            _ = ping_interval.tick() => {
                connection.send(&ClientMessage::Ping).await?;
            }
        }
    }
    Ok(())
}
