use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PlayerId = i64;

pub const DEFAULT_REMOTE_SPRITE: &str = "character/ow1.png";

fn default_remote_sprite() -> String {
    DEFAULT_REMOTE_SPRITE.to_string()
}

fn default_is_moving() -> bool {
    true
}

fn unknown_sender() -> PlayerId {
    -1
}

/// Position report for the local player.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerUpdate {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub map: String,
    #[serde(rename = "dir", skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprite: Option<String>,
}

/// One entry of the remote roster. `id` is filled in from the roster key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlayer {
    #[serde(default)]
    pub id: PlayerId,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub map: String,
    #[serde(rename = "dir", default)]
    pub direction: Option<String>,
    #[serde(default = "default_remote_sprite")]
    pub sprite: String,
    #[serde(default = "default_is_moving")]
    pub is_moving: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    #[serde(rename = "from", default = "unknown_sender")]
    pub sender: PlayerId,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Error)]
pub enum OnlineError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("spawn online poller thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Presence service contract. Every call is blocking and bounded by a
/// timeout, so it must only ever run on the poller thread.
pub trait OnlineService: Send {
    fn register(&self) -> Result<PlayerId, OnlineError>;
    fn post_position(&self, update: &PlayerUpdate) -> Result<(), OnlineError>;
    /// Every known player keyed by id, the local player included.
    fn get_roster(&self) -> Result<BTreeMap<PlayerId, RemotePlayer>, OnlineError>;
    fn post_chat(&self, id: PlayerId, text: &str) -> Result<(), OnlineError>;
    /// Recent chat in server order.
    fn get_chat(&self) -> Result<Vec<ChatMessage>, OnlineError>;
}
