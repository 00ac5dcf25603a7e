use std::collections::{BTreeMap, HashMap};

use engine::{Direction, Vec2};

use crate::app::online::{ChatMessage, PlayerId, RemotePlayer};

pub const REMOTE_LERP_SPEED: f32 = 8.0;
pub const CHAT_BUBBLE_SECONDS: f32 = 5.0;

/// Smoothed on-screen state of one remote player.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAvatar {
    pub id: PlayerId,
    pub position: Vec2,
    pub facing: Direction,
    pub map: String,
    pub sprite: String,
    pub is_moving: bool,
}

fn facing_from_delta(dx: f32, dy: f32) -> Option<Direction> {
    if dx.abs() > dy.abs() {
        Some(if dx > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        })
    } else if dy.abs() > 0.0 {
        Some(if dy > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        })
    } else {
        None
    }
}

/// Remote players as drawn: each displayed position chases the last
/// reported one instead of jumping to it.
#[derive(Debug, Clone, Default)]
pub struct RemotePlayerView {
    avatars: BTreeMap<PlayerId, RemoteAvatar>,
}

impl RemotePlayerView {
    pub fn update(&mut self, roster: &[RemotePlayer], dt: f32) {
        let factor = (REMOTE_LERP_SPEED * dt).clamp(0.0, 1.0);
        for record in roster {
            let target = Vec2::new(record.x, record.y);
            let reported = record
                .direction
                .as_deref()
                .and_then(|raw| raw.parse::<Direction>().ok());
            let avatar = self
                .avatars
                .entry(record.id)
                .or_insert_with(|| RemoteAvatar {
                    id: record.id,
                    position: target,
                    facing: reported.unwrap_or_default(),
                    map: record.map.clone(),
                    sprite: record.sprite.clone(),
                    is_moving: record.is_moving,
                });

            let delta = target - avatar.position;
            avatar.facing = facing_from_delta(delta.x, delta.y)
                .or(reported)
                .unwrap_or(avatar.facing);
            avatar.position = avatar.position + delta * factor;
            avatar.map.clone_from(&record.map);
            avatar.sprite.clone_from(&record.sprite);
            avatar.is_moving = record.is_moving;
        }
        self.avatars
            .retain(|id, _| roster.iter().any(|record| record.id == *id));
    }

    pub fn avatar(&self, id: PlayerId) -> Option<&RemoteAvatar> {
        self.avatars.get(&id)
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    pub fn visible_on<'a>(&'a self, map_key: &'a str) -> impl Iterator<Item = &'a RemoteAvatar> {
        self.avatars
            .values()
            .filter(move |avatar| avatar.map == map_key)
    }
}

/// Latest chat line per sender, shown for a few seconds of simulation time.
#[derive(Debug, Clone, Default)]
pub struct ChatBubbles {
    bubbles: HashMap<PlayerId, (String, f32)>,
    last_seen_id: u64,
    clock: f32,
}

impl ChatBubbles {
    pub fn advance(&mut self, dt: f32) {
        self.clock += dt;
        let now = self.clock;
        self.bubbles.retain(|_, (_, expires_at)| *expires_at > now);
    }

    /// Takes messages newer than the cursor; anonymous or empty messages
    /// only move the cursor.
    pub fn ingest<'a>(&mut self, messages: impl IntoIterator<Item = &'a ChatMessage>) {
        let mut max_id = self.last_seen_id;
        for message in messages {
            if message.id <= self.last_seen_id {
                continue;
            }
            if message.sender >= 0 && !message.text.is_empty() {
                self.bubbles.insert(
                    message.sender,
                    (message.text.clone(), self.clock + CHAT_BUBBLE_SECONDS),
                );
            }
            max_id = max_id.max(message.id);
        }
        self.last_seen_id = max_id;
    }

    pub fn bubble(&self, sender: PlayerId) -> Option<&str> {
        self.bubbles.get(&sender).map(|(text, _)| text.as_str())
    }

    pub fn last_seen_id(&self) -> u64 {
        self.last_seen_id
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }
}
