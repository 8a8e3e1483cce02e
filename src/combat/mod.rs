pub mod logic;
pub mod manager;
pub mod moves;
pub mod state;

pub use manager::BattleManager;
