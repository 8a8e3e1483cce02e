use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{advance, Instant};
use uuid::Uuid;

use pokebattle::client::replay::EVENT_DELAY;
use pokebattle::client::session::Side;
use pokebattle::client::{BattleClient, Observation};
use pokebattle::combat::moves::MoveRepository;
use pokebattle::combat::state::{
    BallType, BattleEndReason, BattleEntityRef, BattleEvent, BattleOutcome,
    BattlePokemonPrivateView, BattlePokemonPublicView, BattlePokemonTeamOverview, FieldState,
    PlayerAction,
};
use pokebattle::models::{ClientMessage, ServerMessage};

struct Script {
    client: BattleClient,
    rx: mpsc::UnboundedReceiver<Observation>,
    repo: MoveRepository,
    battle_id: Uuid,
}

impl Script {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Script {
            client: BattleClient::new(tx),
            rx,
            repo: MoveRepository::builtin(),
            battle_id: Uuid::new_v4(),
        }
    }

    fn observations(&mut self) -> Vec<Observation> {
        let mut out = Vec::new();
        while let Ok(obs) = self.rx.try_recv() {
            out.push(obs);
        }
        out
    }

    fn start_wild_battle(&mut self) {
        let player = self.repo.build_pokemon(25, 20, 0, false).unwrap();
        let backup = self.repo.build_pokemon(1, 20, 1, false).unwrap();
        let wild = self.repo.build_pokemon(19, 10, 0, true).unwrap();
        self.client.handle_message(
            ServerMessage::WildBattleStart {
                battle_id: self.battle_id,
                player_team: vec![
                    BattlePokemonTeamOverview::from_battle_pokemon(&player),
                    BattlePokemonTeamOverview::from_battle_pokemon(&backup),
                ],
                initial_pokemon: BattlePokemonPrivateView::from_battle_pokemon(&player, &self.repo),
                wild_pokemon: BattlePokemonPublicView::from_battle_pokemon(&wild),
                initial_field_state: FieldState::default(),
            },
            Instant::now(),
        );
    }

    fn request_action(&mut self, turn_number: u32, must_switch: bool) {
        let player = self.repo.build_pokemon(25, 20, 0, false).unwrap();
        let wild = self.repo.build_pokemon(19, 10, 0, true).unwrap();
        let backup = self.repo.build_pokemon(1, 20, 1, false).unwrap();
        self.client.handle_message(
            ServerMessage::RequestAction {
                battle_id: self.battle_id,
                turn_number,
                active_pokemon_state: BattlePokemonPrivateView::from_battle_pokemon(&player, &self.repo),
                other_pokemon_state: BattlePokemonPublicView::from_battle_pokemon(&wild),
                team_overview: vec![
                    BattlePokemonTeamOverview::from_battle_pokemon(&player),
                    BattlePokemonTeamOverview::from_battle_pokemon(&backup),
                ],
                field_state: FieldState::default(),
                can_switch: true,
                must_switch,
            },
            Instant::now(),
        );
    }

    fn turn_update(&mut self, turn_number: u32, events: Vec<BattleEvent>) {
        self.client.handle_message(
            ServerMessage::TurnUpdate {
                battle_id: self.battle_id,
                turn_number,
                events,
                opponent_pokemon_state: None,
            },
            Instant::now(),
        );
    }
}

fn action_required_count(observations: &[Observation]) -> usize {
    observations
        .iter()
        .filter(|o| matches!(o, Observation::ActionRequired { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn damage_then_faint_drains_on_schedule() {
    let mut script = Script::new();
    script.start_wild_battle();
    script.observations();

    script.turn_update(
        1,
        vec![
            BattleEvent::DamageDealt {
                target: BattleEntityRef::Wild,
                damage: 60,
                new_hp: 40,
                max_hp: 100,
                effectiveness: 1.0,
                is_critical: false,
            },
            BattleEvent::PokemonFainted {
                target: BattleEntityRef::Wild,
            },
        ],
    );

    // Head applied immediately
    let session = script.client.session().unwrap();
    assert_eq!(session.get_active(Side::Opponent).current_hp, 40);
    assert!(!session.get_active(Side::Opponent).is_fainted);

    advance(EVENT_DELAY).await;
    script.client.on_deadline(Instant::now());
    let session = script.client.session().unwrap();
    assert!(session.get_active(Side::Opponent).is_fainted);
    assert_eq!(session.get_active(Side::Opponent).current_hp, 40);

    // Completion lands one more EVENT_DELAY later, ~3000ms total
    advance(EVENT_DELAY).await;
    script.client.on_deadline(Instant::now());
    assert!(script.client.next_deadline().is_none());

    let events = script
        .observations()
        .iter()
        .filter(|o| matches!(o, Observation::Event(_)))
        .count();
    assert_eq!(events, 2);
}

#[tokio::test(start_paused = true)]
async fn full_wild_battle_to_capture() {
    let mut script = Script::new();
    script.start_wild_battle();
    let started = script.observations();
    assert!(matches!(started[0], Observation::BattleStarted { .. }));

    // Turn 1: server asks, player answers with a move
    script.request_action(1, false);
    assert_eq!(action_required_count(&script.observations()), 1);

    let message = script
        .client
        .submit(PlayerAction::UseMove { move_index: 0 })
        .unwrap();
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["type"], "combat_action");
    assert_eq!(json["battle_id"], script.battle_id.to_string());

    // A second submission for the same turn never leaves the client
    assert!(script.client.submit(PlayerAction::UseMove { move_index: 1 }).is_err());

    // Server resolves the turn
    script.turn_update(
        2,
        vec![
            BattleEvent::TurnStart { turn_number: 1 },
            BattleEvent::MoveUsed {
                source: BattleEntityRef::Player { team_index: 0 },
                move_id: 5,
                move_name: "Thunder Shock".to_string(),
                target: BattleEntityRef::Wild,
            },
            BattleEvent::DamageDealt {
                target: BattleEntityRef::Wild,
                damage: 20,
                new_hp: 8,
                max_hp: 28,
                effectiveness: 1.0,
                is_critical: false,
            },
        ],
    );

    // Next request arrives while the drain is still running: input stays
    // locked until the queue empties
    script.request_action(2, false);
    assert_eq!(action_required_count(&script.observations()), 0);
    assert!(script
        .client
        .submit(PlayerAction::UseItem {
            item_id: "poke_ball".to_string(),
            is_capture_item: true,
        })
        .is_err());

    // Drain the remaining two events plus the completion step
    for _ in 0..3 {
        advance(EVENT_DELAY).await;
        script.client.on_deadline(Instant::now());
    }
    assert_eq!(action_required_count(&script.observations()), 1);
    let session = script.client.session().unwrap();
    assert_eq!(session.get_active(Side::Opponent).current_hp, 8);

    // Turn 2: throw a ball
    let message = script
        .client
        .submit(PlayerAction::UseItem {
            item_id: "poke_ball".to_string(),
            is_capture_item: true,
        })
        .unwrap();
    assert!(matches!(message, ClientMessage::CombatAction { .. }));

    script.turn_update(
        2,
        vec![
            BattleEvent::TurnStart { turn_number: 2 },
            BattleEvent::ItemUsed {
                item_id: "poke_ball".to_string(),
                item_name: "poke ball".to_string(),
                target: Some(BattleEntityRef::Wild),
            },
            BattleEvent::CaptureAttempt {
                ball_type: BallType::PokeBall,
                shake_count: 3,
                success: true,
            },
        ],
    );

    // The server ends the battle while two events are still queued
    script.client.handle_message(
        ServerMessage::BattleEnd {
            outcome: BattleOutcome::Capture,
            reason: BattleEndReason::WildPokemonCaptured,
            exp_gained: None,
            pokemon_captured: None,
        },
        Instant::now(),
    );

    assert!(!script.client.in_battle());
    assert!(script.client.next_deadline().is_none());
    let ends: Vec<Observation> = script
        .observations()
        .into_iter()
        .filter(|o| matches!(o, Observation::BattleEnded { .. }))
        .collect();
    assert_eq!(ends.len(), 1);
    if let Observation::BattleEnded { outcome, .. } = &ends[0] {
        assert_eq!(*outcome, BattleOutcome::Capture);
    }

    // Stale timer fire after teardown applies nothing
    advance(EVENT_DELAY).await;
    script.client.on_deadline(Instant::now());
    assert!(script.observations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn must_switch_turn_only_accepts_a_switch() {
    let mut script = Script::new();
    script.start_wild_battle();
    script.request_action(3, true);
    script.observations();

    assert!(script.client.submit(PlayerAction::UseMove { move_index: 0 }).is_err());
    assert!(script.client.submit(PlayerAction::Run).is_err());
    let message = script
        .client
        .submit(PlayerAction::SwitchPokemon { team_index: 1 })
        .unwrap();
    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["action"]["action_type"], "switch_pokemon");
    assert_eq!(json["action"]["team_index"], 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_drain_force_unlocks_input() {
    let mut script = Script::new();
    script.start_wild_battle();
    script.observations();

    // A long batch keeps the replay draining
    script.turn_update(
        1,
        (1..=10)
            .map(|n| BattleEvent::GenericMessage {
                message: format!("msg {}", n),
            })
            .collect(),
    );
    script.request_action(2, false);
    assert_eq!(action_required_count(&script.observations()), 0);

    // Force unlock fires at 2000ms even though the drain is mid-flight
    advance(Duration::from_millis(2000)).await;
    script.client.on_deadline(Instant::now());
    assert_eq!(action_required_count(&script.observations()), 1);
    assert!(script.client.submit(PlayerAction::UseMove { move_index: 0 }).is_ok());
}
