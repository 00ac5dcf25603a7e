use std::path::PathBuf;

use engine::{load_tmx_file, NavGrid, Rect, Tilemap, TmxError, Vec2, TILE_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One-tile trigger that moves the player to another map.
#[derive(Debug, Clone, PartialEq)]
pub struct Teleporter {
    pub position: Vec2,
    pub destination: String,
    pub target: Vec2,
}

/// Teleporter as persisted, in tile units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleportRecord {
    pub x: f32,
    pub y: f32,
    pub destination: String,
    pub target_x: f32,
    pub target_y: f32,
}

impl Teleporter {
    pub fn new(position: Vec2, destination: impl Into<String>, target: Vec2) -> Self {
        Self {
            position,
            destination: destination.into(),
            target,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::at(self.position, Vec2::new(TILE_SIZE, TILE_SIZE))
    }

    pub fn collides_with(&self, rect: Rect) -> bool {
        self.rect().intersects(&rect)
    }

    pub fn from_record(record: &TeleportRecord) -> Self {
        Self {
            position: Vec2::new(record.x * TILE_SIZE, record.y * TILE_SIZE),
            destination: record.destination.clone(),
            target: Vec2::new(record.target_x * TILE_SIZE, record.target_y * TILE_SIZE),
        }
    }

    pub fn to_record(&self) -> TeleportRecord {
        let source = self.position.to_tile();
        let target = self.target.to_tile();
        TeleportRecord {
            x: source.x as f32,
            y: source.y as f32,
            destination: self.destination.clone(),
            target_x: target.x as f32,
            target_y: target.y as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilePoint {
    pub x: f32,
    pub y: f32,
}

impl TilePoint {
    pub fn to_pixels(self) -> Vec2 {
        Vec2::new(self.x * TILE_SIZE, self.y * TILE_SIZE)
    }

    pub fn from_pixels(position: Vec2) -> Self {
        let tile = position.to_tile();
        Self {
            x: tile.x as f32,
            y: tile.y as f32,
        }
    }
}

/// A loaded map: immutable collision data plus spawn and teleporters.
#[derive(Debug, Clone)]
pub struct GameMap {
    key: String,
    tilemap: Tilemap,
    spawn: Vec2,
    teleporters: Vec<Teleporter>,
}

impl GameMap {
    pub fn new(
        key: impl Into<String>,
        tilemap: Tilemap,
        spawn: Vec2,
        teleporters: Vec<Teleporter>,
    ) -> Self {
        Self {
            key: key.into(),
            tilemap,
            spawn,
            teleporters,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn tilemap(&self) -> &Tilemap {
        &self.tilemap
    }

    pub fn spawn(&self) -> Vec2 {
        self.spawn
    }

    pub fn teleporters(&self) -> &[Teleporter] {
        &self.teleporters
    }

    pub fn nav_grid(&self) -> NavGrid {
        NavGrid::new(self.tilemap.width(), self.tilemap.height())
    }

    pub fn check_collision(&self, rect: Rect) -> bool {
        self.tilemap.check_collision(rect)
    }

    pub fn overlaps_encounter(&self, rect: Rect) -> bool {
        self.tilemap.overlaps_encounter(rect)
    }

    /// First teleporter overlapping `rect`, in declaration order.
    pub fn check_teleport(&self, rect: Rect) -> Option<&Teleporter> {
        self.teleporters
            .iter()
            .find(|teleporter| teleporter.collides_with(rect))
    }
}

#[derive(Debug, Error)]
pub enum MapLoadError {
    #[error("map '{key}' failed to load: {source}")]
    Tmx {
        key: String,
        #[source]
        source: TmxError,
    },
    #[error("map '{0}' is not provided by this map source")]
    Unknown(String),
}

/// Resolves a map key from a save file into collision data.
pub trait MapSource {
    fn load_tilemap(&self, key: &str) -> Result<Tilemap, MapLoadError>;
}

/// Production source: keys are paths of `.tmx` files relative to `root`.
#[derive(Debug, Clone)]
pub struct TmxDirectory {
    root: PathBuf,
}

impl TmxDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MapSource for TmxDirectory {
    fn load_tilemap(&self, key: &str) -> Result<Tilemap, MapLoadError> {
        load_tmx_file(&self.root.join(key)).map_err(|source| MapLoadError::Tmx {
            key: key.to_string(),
            source,
        })
    }
}

#[cfg(test)]
impl MapSource for std::collections::HashMap<String, Tilemap> {
    fn load_tilemap(&self, key: &str) -> Result<Tilemap, MapLoadError> {
        self.get(key)
            .cloned()
            .ok_or_else(|| MapLoadError::Unknown(key.to_string()))
    }
}
