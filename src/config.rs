use serde::{Deserialize, Serialize};
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tracing::info;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub resources: ResourcesConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// Paths to the JSON data files. When a path is absent the built-in
/// tables are used.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResourcesConfig {
    pub moves_path: Option<String>,
    pub species_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
                port: 8080,
                cors_origins: vec!["*".to_string()],
            },
            resources: ResourcesConfig {
                moves_path: None,
                species_path: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        // Load .env file if available
        dotenv::dotenv().ok();

        let mut config = Config::default();

        if let Ok(port) = env::var("PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(host) = env::var("HOST") {
            if let Ok(host) = host.parse::<IpAddr>() {
                config.server.host = host;
            }
        }

        if let Ok(cors) = env::var("CORS_ORIGINS") {
            config.server.cors_origins = cors.split(',').map(|s| s.trim().to_string()).collect();
        }

        if let Ok(moves_path) = env::var("MOVES_PATH") {
            config.resources.moves_path = Some(moves_path);
        }

        if let Ok(species_path) = env::var("SPECIES_PATH") {
            config.resources.species_path = Some(species_path);
        }

        info!("Configuration loaded: {:?}", config);
        config
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}
