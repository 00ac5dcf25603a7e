pub mod autowalk;
pub mod bag;
pub mod battle;
pub mod entities;
pub mod map;
pub mod remote;
pub mod save;
pub mod scene;
pub mod shop;
pub mod state;
pub mod teleport;

pub use map::TmxDirectory;
pub use save::{load_game, save_game, SaveError};
pub use scene::{GameplayScene, OnlineLink};
