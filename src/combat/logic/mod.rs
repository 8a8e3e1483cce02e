pub mod calculations;
pub mod execution;
pub mod pvp_battle;
pub mod wild_battle;
