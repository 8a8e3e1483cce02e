use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use pokebattle::combat::moves::MoveRepository;
use pokebattle::combat::BattleManager;
use pokebattle::config::Config;
use pokebattle::handlers::{self, AppState};
use pokebattle::registry::PlayerRegistry;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let config = Config::from_env();

    let move_repository = Arc::new(MoveRepository::load(
        config.resources.moves_path.as_deref(),
        config.resources.species_path.as_deref(),
    ));
    let registry = Arc::new(PlayerRegistry::new());
    let battle_manager = Arc::new(BattleManager::new(move_repository, registry.clone()));

    let state = Arc::new(AppState {
        registry,
        battle_manager,
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .server
                .cors_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect::<Vec<_>>(),
        )
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let app = Router::new()
        .route("/ws", get(handlers::ws_handler))
        .route("/health", get(handlers::health_handler))
        .layer(cors)
        .with_state(state);

    let addr = config.server_addr();
    tracing::info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind port");
    axum::serve(listener, app).await.expect("Server failed");
}
