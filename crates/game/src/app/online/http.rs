use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::service::{ChatMessage, OnlineError, OnlineService, PlayerId, PlayerUpdate, RemotePlayer};

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: PlayerId,
}

#[derive(Debug, Deserialize)]
struct RosterResponse {
    #[serde(default)]
    players: HashMap<String, RemotePlayer>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

/// Presence service over plain HTTP/JSON:
/// `GET /register`, `GET|POST /players`, `GET|POST /chat`.
pub struct HttpOnlineService {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpOnlineService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, HTTP_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { base_url, agent }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, OnlineError> {
        let url = self.url(endpoint);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|error| request_error(&url, error))?;
        check_status(&url, response.status())?;
        response
            .into_json::<T>()
            .map_err(|source| OnlineError::Decode { url, source })
    }

    fn post_json(&self, endpoint: &str, body: impl serde::Serialize) -> Result<(), OnlineError> {
        let url = self.url(endpoint);
        let response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|error| request_error(&url, error))?;
        check_status(&url, response.status())
    }
}

fn request_error(url: &str, error: ureq::Error) -> OnlineError {
    match error {
        ureq::Error::Status(status, _) => OnlineError::Status {
            url: url.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => OnlineError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

fn check_status(url: &str, status: u16) -> Result<(), OnlineError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(OnlineError::Status {
            url: url.to_string(),
            status,
        })
    }
}

/// Roster keys arrive as strings; entries with a non-numeric key are
/// skipped.
fn tag_roster(players: HashMap<String, RemotePlayer>) -> BTreeMap<PlayerId, RemotePlayer> {
    players
        .into_iter()
        .filter_map(|(key, mut player)| match key.parse::<PlayerId>() {
            Ok(id) => {
                player.id = id;
                Some((id, player))
            }
            Err(_) => {
                debug!(key = key.as_str(), "roster_key_not_numeric");
                None
            }
        })
        .collect()
}

impl OnlineService for HttpOnlineService {
    fn register(&self) -> Result<PlayerId, OnlineError> {
        self.get_json::<RegisterResponse>("register")
            .map(|response| response.id)
    }

    fn post_position(&self, update: &PlayerUpdate) -> Result<(), OnlineError> {
        self.post_json("players", update)
    }

    fn get_roster(&self) -> Result<BTreeMap<PlayerId, RemotePlayer>, OnlineError> {
        self.get_json::<RosterResponse>("players")
            .map(|response| tag_roster(response.players))
    }

    fn post_chat(&self, id: PlayerId, text: &str) -> Result<(), OnlineError> {
        self.post_json("chat", json!({ "id": id, "text": text }))
    }

    fn get_chat(&self) -> Result<Vec<ChatMessage>, OnlineError> {
        self.get_json::<ChatResponse>("chat")
            .map(|response| response.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_loses_trailing_slash() {
        let service = HttpOnlineService::new("http://localhost:8989/");
        assert_eq!(service.base_url(), "http://localhost:8989");
        assert_eq!(service.url("players"), "http://localhost:8989/players");
    }

    #[test]
    fn roster_keys_become_ids() {
        let response: RosterResponse = serde_json::from_str(
            r#"{"players": {
                "3": {"x": 64, "y": 128, "map": "map.tmx", "dir": "left"},
                "ghost": {"x": 0, "y": 0, "map": "map.tmx"}
            }}"#,
        )
        .expect("parse");
        let roster = tag_roster(response.players);
        assert_eq!(roster.len(), 1);
        let player = &roster[&3];
        assert_eq!(player.id, 3);
        assert_eq!(player.direction.as_deref(), Some("left"));
        assert_eq!(player.sprite, "character/ow1.png");
        assert!(player.is_moving);
    }

    #[test]
    fn position_body_omits_absent_fields() {
        let update = PlayerUpdate {
            id: 7,
            x: 1.0,
            y: 2.0,
            map: "gym.tmx".to_string(),
            direction: Some("up".to_string()),
            sprite: None,
        };
        let body = serde_json::to_value(&update).expect("json");
        assert_eq!(body["dir"], "up");
        assert!(body.get("sprite").is_none());
    }

    #[test]
    fn chat_sender_defaults_to_unknown() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"messages": [{"id": 4, "text": "hi"}]}"#).expect("parse");
        assert_eq!(response.messages[0].sender, -1);
        let empty: ChatResponse = serde_json::from_str("{}").expect("parse");
        assert!(empty.messages.is_empty());
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let service = HttpOnlineService::with_timeout("http://127.0.0.1:9", Duration::from_millis(200));
        assert!(matches!(
            service.get_roster(),
            Err(OnlineError::Transport { .. })
        ));
    }
}
