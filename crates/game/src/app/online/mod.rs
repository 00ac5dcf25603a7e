mod http;
mod poller;
mod service;

pub use http::HttpOnlineService;
pub use poller::{OnlinePoller, OnlineSnapshot, SharedOnline, POLL_INTERVAL};
pub use service::{ChatMessage, OnlineError, OnlineService, PlayerId, PlayerUpdate, RemotePlayer};
