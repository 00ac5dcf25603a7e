//! Save file: one pretty-printed JSON document holding every map block with
//! its entities, the current map, the player, the bag and the shop state.

use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::bag::Bag;
use super::entities::{
    EntityConfigError, Player, PlayerRecord, ShopNpc, ShopNpcRecord, StationaryTrainer,
    TrainerRecord,
};
use super::map::{GameMap, MapLoadError, MapSource, TeleportRecord, Teleporter, TilePoint};
use super::shop::ShopState;
use super::state::{GameState, UnknownMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapBlock {
    pub path: String,
    #[serde(default)]
    pub teleport: Vec<TeleportRecord>,
    /// Spawn tile.
    pub player: TilePoint,
    #[serde(default)]
    pub enemy_trainers: Vec<TrainerRecord>,
    #[serde(default)]
    pub shop_npc: Vec<ShopNpcRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveGame {
    pub map: Vec<MapBlock>,
    pub current_map: String,
    #[serde(default)]
    pub player: Option<PlayerRecord>,
    #[serde(default)]
    pub bag: Bag,
    #[serde(default)]
    pub shop_state: ShopState,
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("read save '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write save '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode save json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("{0}")]
    Parse(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Map(#[from] MapLoadError),
    #[error("invalid entity at {path}: {source}")]
    Entity {
        path: String,
        #[source]
        source: EntityConfigError,
    },
    #[error(transparent)]
    UnknownMap(#[from] UnknownMap),
}

fn validation_err(path: &str, message: impl Into<String>) -> SaveError {
    SaveError::Validation(format!("validation failed at {path}: {}", message.into()))
}

fn expected_actual(path: &str, expected: impl Display, actual: impl Display) -> SaveError {
    validation_err(path, format!("expected {expected}, got {actual}"))
}

fn require_finite(path: &str, value: f32) -> Result<(), SaveError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(expected_actual(path, "finite number", value))
    }
}

/// Captures the persisted parts of `state`. Maps keep their load order.
pub fn snapshot(state: &GameState) -> SaveGame {
    let map = state
        .maps()
        .iter()
        .map(|game_map| {
            let key = game_map.key();
            MapBlock {
                path: key.to_string(),
                teleport: game_map
                    .teleporters()
                    .iter()
                    .map(Teleporter::to_record)
                    .collect(),
                player: TilePoint::from_pixels(game_map.spawn()),
                enemy_trainers: state
                    .trainers_on(key)
                    .iter()
                    .map(StationaryTrainer::to_record)
                    .collect(),
                shop_npc: state
                    .shop_npcs_on(key)
                    .iter()
                    .map(ShopNpc::to_record)
                    .collect(),
            }
        })
        .collect();

    SaveGame {
        map,
        current_map: state.current_map_key().to_string(),
        player: Some(state.player().to_record()),
        bag: state.bag.clone(),
        shop_state: state.shop.clone(),
    }
}

/// Writes the state as pretty JSON, creating the parent directory. Failure
/// is logged and returned; `state` is never touched.
pub fn save_game(state: &GameState, path: &Path) -> Result<(), SaveError> {
    let result = write_save(&snapshot(state), path);
    match &result {
        Ok(()) => info!(path = %path.display(), "game_saved"),
        Err(error) => warn!(path = %path.display(), error = %error, "game_save_failed"),
    }
    result
}

fn write_save(save: &SaveGame, path: &Path) -> Result<(), SaveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| SaveError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(save).map_err(SaveError::Encode)?;
    fs::write(path, json).map_err(|source| SaveError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads a save. A missing file is not an error: it yields `Ok(None)`.
pub fn load_game(path: &Path, maps: &dyn MapSource) -> Result<Option<GameState>, SaveError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "save_file_missing");
            return Ok(None);
        }
        Err(source) => {
            return Err(SaveError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let save = parse_save_game_json(&raw)?;
    validate_save_game(&save)?;
    let state = build_state(save, maps)?;
    info!(
        path = %path.display(),
        current_map = state.current_map_key(),
        maps = state.maps().len(),
        "game_loaded"
    );
    Ok(Some(state))
}

pub fn parse_save_game_json(raw: &str) -> Result<SaveGame, SaveError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    match serde_path_to_error::deserialize::<_, SaveGame>(&mut deserializer) {
        Ok(save) => Ok(save),
        Err(error) => {
            let path = error.path().to_string();
            let source = error.into_inner();
            if path.is_empty() || path == "." {
                Err(SaveError::Parse(format!("parse save json: {source}")))
            } else {
                Err(SaveError::Parse(format!(
                    "parse save json at {path}: {source}"
                )))
            }
        }
    }
}

pub fn validate_save_game(save: &SaveGame) -> Result<(), SaveError> {
    if save.map.is_empty() {
        return Err(expected_actual("map", "at least one map block", 0));
    }

    let mut known_paths = HashMap::with_capacity(save.map.len());
    for (index, block) in save.map.iter().enumerate() {
        if let Some(first_index) = known_paths.insert(block.path.as_str(), index) {
            return Err(validation_err(
                &format!("map[{index}].path"),
                format!(
                    "duplicate map '{}' (first seen at map[{first_index}].path)",
                    block.path
                ),
            ));
        }
        require_finite(&format!("map[{index}].player.x"), block.player.x)?;
        require_finite(&format!("map[{index}].player.y"), block.player.y)?;
        for (tp_index, teleport) in block.teleport.iter().enumerate() {
            let prefix = format!("map[{index}].teleport[{tp_index}]");
            require_finite(&format!("{prefix}.x"), teleport.x)?;
            require_finite(&format!("{prefix}.y"), teleport.y)?;
            require_finite(&format!("{prefix}.target_x"), teleport.target_x)?;
            require_finite(&format!("{prefix}.target_y"), teleport.target_y)?;
        }
    }

    if !known_paths.contains_key(save.current_map.as_str()) {
        return Err(expected_actual(
            "current_map",
            "a path listed in map[]",
            format!("'{}'", save.current_map),
        ));
    }

    if let Some(player) = &save.player {
        require_finite("player.x", player.x)?;
        require_finite("player.y", player.y)?;
    }

    for (index, monster) in save.bag.monsters.iter().enumerate() {
        if monster.max_hp <= 0 {
            return Err(expected_actual(
                &format!("bag.monsters[{index}].max_hp"),
                "positive number",
                monster.max_hp,
            ));
        }
    }

    require_finite("shop_state.time_until_refresh", save.shop_state.time_until_refresh)
}

/// Rebuilds the game state in dependency order: maps, trainers, shop NPCs,
/// player, bag, shop state.
pub fn build_state(save: SaveGame, maps: &dyn MapSource) -> Result<GameState, SaveError> {
    let mut game_maps = Vec::with_capacity(save.map.len());
    for block in &save.map {
        let tilemap = maps.load_tilemap(&block.path)?;
        let teleporters = block.teleport.iter().map(Teleporter::from_record).collect();
        game_maps.push(GameMap::new(
            block.path.clone(),
            tilemap,
            block.player.to_pixels(),
            teleporters,
        ));
    }

    let mut state = GameState::new(game_maps, &save.current_map, Player::new(Vec2::ZERO))?;

    for (index, block) in save.map.iter().enumerate() {
        let trainers = block
            .enemy_trainers
            .iter()
            .enumerate()
            .map(|(trainer_index, record)| {
                StationaryTrainer::from_record(record).map_err(|source| SaveError::Entity {
                    path: format!("map[{index}].enemy_trainers[{trainer_index}]"),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        state.set_trainers(&block.path, trainers);
    }

    for (index, block) in save.map.iter().enumerate() {
        let shop_npcs = block
            .shop_npc
            .iter()
            .enumerate()
            .map(|(npc_index, record)| {
                ShopNpc::from_record(record).map_err(|source| SaveError::Entity {
                    path: format!("map[{index}].shop_npc[{npc_index}]"),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        state.set_shop_npcs(&block.path, shop_npcs);
    }

    match &save.player {
        Some(record) => *state.player_mut() = Player::from_record(record),
        None => {
            let spawn = state.spawn_point();
            state.player_mut().set_position(spawn);
        }
    }

    state.bag = save.bag;
    state.shop = save.shop_state;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use engine::{Direction, Tilemap, TileCoord};

    use super::*;
    use crate::app::gameplay::bag::{ItemRecord, MonsterRecord};
    use crate::app::gameplay::entities::{AnimationDescriptor, Entity, TrainerClassification};
    use crate::app::gameplay::shop::default_shop_stock;

    fn map_source() -> HashMap<String, Tilemap> {
        HashMap::from([
            ("map.tmx".to_string(), Tilemap::open(40, 40)),
            ("gym.tmx".to_string(), Tilemap::open(20, 20)),
        ])
    }

    fn sample_state() -> GameState {
        let home = GameMap::new(
            "map.tmx",
            Tilemap::open(40, 40),
            TileCoord::new(16, 30).origin(),
            vec![Teleporter::new(
                TileCoord::new(24, 24).origin(),
                "gym.tmx",
                TileCoord::new(10, 18).origin(),
            )],
        );
        let gym = GameMap::new(
            "gym.tmx",
            Tilemap::open(20, 20),
            TileCoord::new(10, 18).origin(),
            Vec::new(),
        );
        let mut state = GameState::new(
            vec![home, gym],
            "map.tmx",
            Player::new(TileCoord::new(16, 30).origin()),
        )
        .expect("state");
        state.set_trainers(
            "gym.tmx",
            vec![StationaryTrainer::new(
                TileCoord::new(10, 4).origin(),
                TrainerClassification::Stationary,
                3,
                Some(Direction::Down),
                vec![MonsterRecord {
                    name: "Gengar".to_string(),
                    hp: 90,
                    max_hp: 90,
                    level: 8,
                    sprite_path: "menu_sprites/menusprite5.png".to_string(),
                }],
            )
            .expect("trainer")],
        );
        let mut npc = ShopNpc::new(
            TileCoord::new(18, 28).origin(),
            Direction::Down,
            AnimationDescriptor::default(),
            2,
        );
        npc.shop_items_mut()[1].count = 3;
        state.set_shop_npcs("map.tmx", vec![npc]);
        state.bag = Bag::new(
            vec![MonsterRecord {
                name: "Pikachu".to_string(),
                hp: 42,
                max_hp: 80,
                level: 5,
                sprite_path: "menu_sprites/menusprite1.png".to_string(),
            }],
            vec![ItemRecord::new("Coins", 120, "ingame_ui/coin.png")],
        );
        state.shop.time_until_refresh = 5_000.0;
        state
    }

    #[test]
    fn missing_file_is_no_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load_game(&dir.path().join("absent.json"), &map_source()).expect("no error");
        assert!(loaded.is_none());
    }

    #[test]
    fn saved_state_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("saves").join("game0.json");
        let mut state = sample_state();
        state.player_mut().set_position(Vec2::new(1040.0, 1920.0));
        save_game(&state, &path).expect("save");

        let loaded = load_game(&path, &map_source())
            .expect("load")
            .expect("present");
        assert_eq!(loaded.current_map_key(), "map.tmx");
        assert_eq!(loaded.player().position(), Vec2::new(1040.0, 1920.0));
        assert_eq!(loaded.bag, state.bag);
        assert_eq!(loaded.shop.time_until_refresh, 5_000.0);
        assert_eq!(loaded.trainers_on("gym.tmx").len(), 1);
        assert_eq!(loaded.shop_npcs_on("map.tmx")[0].shop_items()[1].count, 3);
        assert_eq!(
            loaded.map("map.tmx").expect("map").teleporters(),
            state.map("map.tmx").expect("map").teleporters()
        );
        assert_eq!(snapshot(&loaded), snapshot(&state));
    }

    #[test]
    fn missing_player_spawns_at_map_spawn() {
        let raw = r#"{
            "map": [{"path": "map.tmx", "teleport": [], "player": {"x": 16, "y": 30}}],
            "current_map": "map.tmx"
        }"#;
        let state = build_state(parse_save_game_json(raw).expect("parse"), &map_source())
            .expect("state");
        assert_eq!(state.player().position(), TileCoord::new(16, 30).origin());
        assert_eq!(state.shop.items, default_shop_stock());
        assert_eq!(state.shop.time_until_refresh, 0.0);
        assert!(state.bag.monsters.is_empty());
    }

    #[test]
    fn parse_error_reports_json_path() {
        let raw = r#"{"map": [{"path": 3, "player": {"x": 0, "y": 0}}], "current_map": "map.tmx"}"#;
        let error = parse_save_game_json(raw).expect_err("bad path type");
        let message = error.to_string();
        assert!(message.starts_with("parse save json at map[0].path"), "{message}");
    }

    #[test]
    fn unknown_current_map_fails_validation() {
        let raw = r#"{"map": [{"path": "map.tmx", "player": {"x": 0, "y": 0}}], "current_map": "cave.tmx"}"#;
        let save = parse_save_game_json(raw).expect("parse");
        let message = validate_save_game(&save).expect_err("invalid").to_string();
        assert_eq!(
            message,
            "validation failed at current_map: expected a path listed in map[], got 'cave.tmx'"
        );
    }

    #[test]
    fn duplicate_map_paths_fail_validation() {
        let mut save = snapshot(&sample_state());
        save.map[1].path = "map.tmx".to_string();
        let message = validate_save_game(&save).expect_err("duplicate").to_string();
        assert!(message.starts_with("validation failed at map[1].path"), "{message}");
    }

    #[test]
    fn trainer_with_bad_facing_rejects_load() {
        let mut save = snapshot(&sample_state());
        save.map[1].enemy_trainers[0].facing = Some("NORTH".to_string());
        let error = build_state(save, &map_source()).expect_err("bad facing");
        assert!(matches!(
            error,
            SaveError::Entity { ref path, .. } if path == "map[1].enemy_trainers[0]"
        ));
    }

    #[test]
    fn map_missing_from_source_rejects_load() {
        let mut save = snapshot(&sample_state());
        save.map[1].path = "cave.tmx".to_string();
        let error = build_state(save, &map_source()).expect_err("unknown map");
        assert!(matches!(error, SaveError::Map(MapLoadError::Unknown(_))));
    }

    #[test]
    fn saved_json_uses_tile_units() {
        let save = snapshot(&sample_state());
        let json = serde_json::to_value(&save).expect("json");
        assert_eq!(json["map"][0]["teleport"][0]["x"], 24.0);
        assert_eq!(json["map"][0]["player"]["y"], 30.0);
        assert_eq!(json["player"]["direction"], "DOWN");
        assert_eq!(json["map"][1]["enemy_trainers"][0]["facing"], "DOWN");
        assert_eq!(
            json["shop_state"]["items"][0]["name"],
            "Potion"
        );
        let position = sample_state().trainers_on("gym.tmx")[0].position();
        assert_eq!(position, TileCoord::new(10, 4).origin());
    }
}
