//! Overworld entities: the player, stationary trainers and shop NPCs.
//!
//! The variants share position, facing and a one-tile bounding rectangle
//! through [`Entity`]; the two stationary variants also watch a straight
//! line of sight through [`Sighted`]. Persisted records are tile-based.

use engine::{
    facing_transition, normalized_step, resolve_axis_separated, Direction, MoveResolution, Rect,
    UnknownDirection, Vec2, TILE_SIZE,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bag::{ItemRecord, MonsterRecord};

pub const PLAYER_SPEED: f32 = 4.0 * TILE_SIZE;
const DEFAULT_SIGHT_TILES: u32 = 2;
const STATIONARY_CLASSIFICATION: &str = "stationary";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntityConfigError {
    #[error("stationary trainer requires a facing direction")]
    MissingFacing,
    #[error("unknown trainer classification '{0}'")]
    UnknownClassification(String),
    #[error(transparent)]
    InvalidFacing(#[from] UnknownDirection),
}

/// What the renderer needs to draw one entity this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawData {
    pub position: Vec2,
    pub facing: Direction,
    pub is_moving: bool,
    pub alert: bool,
}

pub trait Entity {
    fn position(&self) -> Vec2;
    fn facing(&self) -> Direction;

    fn size(&self) -> Vec2 {
        Vec2::new(TILE_SIZE, TILE_SIZE)
    }

    fn bounding_rect(&self) -> Rect {
        Rect::at(self.position(), self.size())
    }

    fn draw_data(&self) -> DrawData;
}

/// Entities that notice the player standing in front of them.
pub trait Sighted: Entity {
    fn sight_tiles(&self) -> u32;
    fn is_detected(&self) -> bool;
    fn set_detected(&mut self, detected: bool);

    fn line_of_sight_rect(&self) -> Rect {
        line_of_sight_rect(self.position(), self.facing(), self.sight_tiles())
    }

    fn refresh_detection(&mut self, player_rect: Rect) {
        let detected = self.line_of_sight_rect().intersects(&player_rect);
        self.set_detected(detected);
    }
}

/// Strip `max_tiles` tiles long, starting one tile away from `position` in
/// the facing direction.
pub fn line_of_sight_rect(position: Vec2, facing: Direction, max_tiles: u32) -> Rect {
    let reach = TILE_SIZE * max_tiles as f32;
    match facing {
        Direction::Right => Rect::new(position.x + TILE_SIZE, position.y, reach, TILE_SIZE),
        Direction::Left => Rect::new(position.x - reach, position.y, reach, TILE_SIZE),
        Direction::Down => Rect::new(position.x, position.y + TILE_SIZE, TILE_SIZE, reach),
        Direction::Up => Rect::new(position.x, position.y - reach, TILE_SIZE, reach),
    }
}

fn parse_facing(raw: Option<&str>) -> Result<Direction, EntityConfigError> {
    match raw {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(Direction::Down),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub is_moving: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    position: Vec2,
    facing: Direction,
    is_moving: bool,
}

impl Player {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            facing: Direction::Down,
            is_moving: false,
        }
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn set_facing(&mut self, facing: Direction) {
        self.facing = facing;
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    /// One tick of manual movement from raw axis input (`y` down). Facing
    /// follows the raw input signs; a zero input neither moves nor turns.
    pub fn apply_input(
        &mut self,
        dt: f32,
        raw_axes: (i32, i32),
        collides: impl FnMut(Rect) -> bool,
    ) -> Option<MoveResolution> {
        let (raw_x, raw_y) = raw_axes;
        self.is_moving = raw_x != 0 || raw_y != 0;
        if !self.is_moving {
            return None;
        }
        if let Some(facing) = facing_transition(self.facing, raw_x, raw_y) {
            self.facing = facing;
        }
        let delta = normalized_step(
            Vec2::new(raw_x as f32, raw_y as f32),
            PLAYER_SPEED,
            dt,
        );
        Some(self.move_by(delta, collides))
    }

    /// Axis-separated move shared by manual input and autowalk.
    pub fn move_by(&mut self, delta: Vec2, collides: impl FnMut(Rect) -> bool) -> MoveResolution {
        let resolution = resolve_axis_separated(self.position, self.size(), delta, collides);
        self.position = resolution.position;
        resolution
    }

    pub fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            x: self.position.x / TILE_SIZE,
            y: self.position.y / TILE_SIZE,
            direction: self.facing,
            is_moving: self.is_moving,
        }
    }

    pub fn from_record(record: &PlayerRecord) -> Self {
        Self {
            position: Vec2::new(record.x * TILE_SIZE, record.y * TILE_SIZE),
            facing: record.direction,
            is_moving: false,
        }
    }
}

impl Entity for Player {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn facing(&self) -> Direction {
        self.facing
    }

    fn draw_data(&self) -> DrawData {
        DrawData {
            position: self.position,
            facing: self.facing,
            is_moving: self.is_moving,
            alert: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerClassification {
    Stationary,
}

impl TrainerClassification {
    pub fn parse(raw: &str) -> Result<Self, EntityConfigError> {
        match raw {
            STATIONARY_CLASSIFICATION => Ok(Self::Stationary),
            other => Err(EntityConfigError::UnknownClassification(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stationary => STATIONARY_CLASSIFICATION,
        }
    }
}

fn default_classification() -> String {
    STATIONARY_CLASSIFICATION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_classification")]
    pub classification: String,
    #[serde(default)]
    pub facing: Option<String>,
    #[serde(default)]
    pub max_tiles: Option<u32>,
    pub monsters: Vec<MonsterRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationaryTrainer {
    position: Vec2,
    facing: Direction,
    classification: TrainerClassification,
    max_tiles: u32,
    monsters: Vec<MonsterRecord>,
    detected: bool,
}

impl StationaryTrainer {
    /// A stationary trainer cannot guess where it is looking, so a missing
    /// facing rejects construction.
    pub fn new(
        position: Vec2,
        classification: TrainerClassification,
        max_tiles: u32,
        facing: Option<Direction>,
        monsters: Vec<MonsterRecord>,
    ) -> Result<Self, EntityConfigError> {
        let facing = match classification {
            TrainerClassification::Stationary => {
                facing.ok_or(EntityConfigError::MissingFacing)?
            }
        };
        Ok(Self {
            position,
            facing,
            classification,
            max_tiles,
            monsters,
            detected: false,
        })
    }

    pub fn monsters(&self) -> &[MonsterRecord] {
        &self.monsters
    }

    pub fn lead_monster(&self) -> Option<&MonsterRecord> {
        self.monsters.first()
    }

    pub fn to_record(&self) -> TrainerRecord {
        TrainerRecord {
            x: self.position.x / TILE_SIZE,
            y: self.position.y / TILE_SIZE,
            classification: self.classification.as_str().to_string(),
            facing: Some(self.facing.as_token().to_string()),
            max_tiles: Some(self.max_tiles),
            monsters: self.monsters.clone(),
        }
    }

    /// Records written without a facing default to facing down.
    pub fn from_record(record: &TrainerRecord) -> Result<Self, EntityConfigError> {
        let classification = TrainerClassification::parse(&record.classification)?;
        let facing = parse_facing(record.facing.as_deref())?;
        Self::new(
            Vec2::new(record.x * TILE_SIZE, record.y * TILE_SIZE),
            classification,
            record.max_tiles.unwrap_or(DEFAULT_SIGHT_TILES),
            Some(facing),
            record.monsters.clone(),
        )
    }
}

impl Entity for StationaryTrainer {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn facing(&self) -> Direction {
        self.facing
    }

    fn draw_data(&self) -> DrawData {
        DrawData {
            position: self.position,
            facing: self.facing,
            is_moving: false,
            alert: self.detected,
        }
    }
}

impl Sighted for StationaryTrainer {
    fn sight_tiles(&self) -> u32 {
        self.max_tiles
    }

    fn is_detected(&self) -> bool {
        self.detected
    }

    fn set_detected(&mut self, detected: bool) {
        self.detected = detected;
    }
}

/// Sprite sheet layout for an animated NPC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationDescriptor {
    pub path: String,
    pub n_keyframes: u32,
    pub rows: Vec<String>,
}

impl Default for AnimationDescriptor {
    fn default() -> Self {
        Self {
            path: default_animation_path(),
            n_keyframes: default_keyframes(),
            rows: default_rows(),
        }
    }
}

fn default_animation_path() -> String {
    "character/ow5.png".to_string()
}

fn default_keyframes() -> u32 {
    4
}

fn default_rows() -> Vec<String> {
    ["down", "left", "right", "up"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_sight_tiles() -> u32 {
    DEFAULT_SIGHT_TILES
}

pub fn default_npc_stock() -> Vec<ItemRecord> {
    vec![
        ItemRecord::new("Potion", 10, "ingame_ui/potion.png").priced(30),
        ItemRecord::new("Pokeball", 10, "ingame_ui/ball.png").priced(50),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopNpcRecord {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub facing: Option<String>,
    #[serde(default = "default_sight_tiles")]
    pub max_tiles: u32,
    #[serde(default = "default_animation_path")]
    pub animation_path: String,
    #[serde(default = "default_keyframes")]
    pub n_keyframes: u32,
    #[serde(default = "default_rows")]
    pub rows: Vec<String>,
    #[serde(default = "default_npc_stock")]
    pub shop_items: Vec<ItemRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShopNpc {
    position: Vec2,
    facing: Direction,
    max_tiles: u32,
    animation: AnimationDescriptor,
    shop_items: Vec<ItemRecord>,
    detected: bool,
}

impl ShopNpc {
    pub fn new(
        position: Vec2,
        facing: Direction,
        animation: AnimationDescriptor,
        max_tiles: u32,
    ) -> Self {
        Self {
            position,
            facing,
            max_tiles,
            animation,
            shop_items: default_npc_stock(),
            detected: false,
        }
    }

    pub fn animation(&self) -> &AnimationDescriptor {
        &self.animation
    }

    pub fn shop_items(&self) -> &[ItemRecord] {
        &self.shop_items
    }

    pub fn shop_items_mut(&mut self) -> &mut Vec<ItemRecord> {
        &mut self.shop_items
    }

    pub fn to_record(&self) -> ShopNpcRecord {
        ShopNpcRecord {
            x: self.position.x / TILE_SIZE,
            y: self.position.y / TILE_SIZE,
            facing: Some(self.facing.as_token().to_string()),
            max_tiles: self.max_tiles,
            animation_path: self.animation.path.clone(),
            n_keyframes: self.animation.n_keyframes,
            rows: self.animation.rows.clone(),
            shop_items: self.shop_items.clone(),
        }
    }

    pub fn from_record(record: &ShopNpcRecord) -> Result<Self, EntityConfigError> {
        let facing = parse_facing(record.facing.as_deref())?;
        let mut npc = Self::new(
            Vec2::new(record.x * TILE_SIZE, record.y * TILE_SIZE),
            facing,
            AnimationDescriptor {
                path: record.animation_path.clone(),
                n_keyframes: record.n_keyframes,
                rows: record.rows.clone(),
            },
            record.max_tiles,
        );
        npc.shop_items = record.shop_items.clone();
        Ok(npc)
    }
}

impl Entity for ShopNpc {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn facing(&self) -> Direction {
        self.facing
    }

    fn draw_data(&self) -> DrawData {
        DrawData {
            position: self.position,
            facing: self.facing,
            is_moving: false,
            alert: self.detected,
        }
    }
}

impl Sighted for ShopNpc {
    fn sight_tiles(&self) -> u32 {
        self.max_tiles
    }

    fn is_detected(&self) -> bool {
        self.detected
    }

    fn set_detected(&mut self, detected: bool) {
        self.detected = detected;
    }
}
