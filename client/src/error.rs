//! Error types for the lobby client

use std::fmt;
use std::time::Duration;

/// Failure of a single server's room feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    InvalidUrl(String),
    Connect(String),
    Timeout(Duration),
    Transport(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "Invalid feed URL: {}", url),
            Self::Connect(e) => write!(f, "Failed to connect to room feed: {}", e),
            Self::Timeout(after) => write!(f, "Room feed connect timed out after {:?}", after),
            Self::Transport(e) => write!(f, "Room feed transport error: {}", e),
        }
    }
}

impl std::error::Error for FeedError {}

/// Failure reported by the native client bridge.
#[derive(Debug)]
pub enum BridgeError {
    Unavailable,
    Spawn(std::io::Error),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Native client is not available"),
            Self::Spawn(e) => write!(f, "Failed to launch native client: {}", e),
        }
    }
}

impl std::error::Error for BridgeError {}

#[derive(Debug)]
pub enum LobbyError {
    Http(reqwest::Error),
    Json(serde_json::Error),
    Io(std::io::Error),
    AppNotFound(String),
    UnknownServer(String),
    NoServerSelected,
    NoWindbot(String),
    MissingRoomId,
    MissingRoomServer,
}

impl fmt::Display for LobbyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "Catalog request failed: {}", e),
            Self::Json(e) => write!(f, "Malformed catalog: {}", e),
            Self::Io(e) => write!(f, "Failed to read catalog: {}", e),
            Self::AppNotFound(id) => write!(f, "App {} not found in catalog", id),
            Self::UnknownServer(id) => write!(f, "Unknown server: {}", id),
            Self::NoServerSelected => write!(f, "No server selected"),
            Self::NoWindbot(server) => write!(f, "Server {} has no AI opponents", server),
            Self::MissingRoomId => write!(f, "Room has no id"),
            Self::MissingRoomServer => write!(f, "Room is not attached to a server"),
        }
    }
}

impl std::error::Error for LobbyError {}

impl From<reqwest::Error> for LobbyError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<serde_json::Error> for LobbyError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<std::io::Error> for LobbyError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
