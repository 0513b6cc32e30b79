use crate::options::Ruleset;
use crate::{ARENA_ATHLETIC, ARENA_ENTERTAIN, ARENA_SERVER_ID, WINDBOT_PREFIX};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A game server as listed in the platform catalog.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Base URL of the realtime room feed.
    #[serde(default)]
    pub url: Option<String>,
    /// Address and port the native client joins.
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub custom: bool,
    #[serde(default)]
    pub replay: bool,
    /// AI opponents available on this server.
    #[serde(default)]
    pub windbot: Option<Vec<String>>,
}

impl Server {
    /// Servers are identified by id. Catalog entries without an id fall back
    /// to their endpoint.
    pub fn is_same(&self, other: &Server) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            (None, None) => {
                self.address == other.address && self.port == other.port && self.url == other.url
            }
            _ => false,
        }
    }

    pub fn is_arena_canonical(&self) -> bool {
        self.id.as_deref() == Some(ARENA_SERVER_ID)
    }

    pub fn in_arena_family(&self) -> bool {
        self.id
            .as_deref()
            .map_or(false, |id| id.starts_with(ARENA_SERVER_ID))
    }

    /// Whether this server publishes a room feed the lobby aggregates.
    pub fn has_room_feed(&self) -> bool {
        self.url.is_some() && (self.custom || self.replay)
    }

    pub fn windbots(&self) -> &[String] {
        self.windbot.as_deref().unwrap_or(&[])
    }

    /// Short label for logs.
    pub fn label(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or(self.address.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub username: String,
    pub position: u32,
}

/// A room as reported by a server's room feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Room {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Owning server, attached by the client when the room arrives on a feed.
    #[serde(skip)]
    pub server: Option<Arc<Server>>,
    #[serde(default)]
    pub private: Option<bool>,
    #[serde(default)]
    pub options: Ruleset,
    /// Ranked-match category, `athletic` or `entertain`.
    #[serde(default)]
    pub arena: Option<String>,
    #[serde(default)]
    pub users: Vec<RoomUser>,
}

impl Room {
    pub fn with_server(mut self, server: &Arc<Server>) -> Self {
        self.server = Some(Arc::clone(server));
        self
    }

    pub fn is_private(&self) -> bool {
        self.private.unwrap_or(false)
    }

    pub fn is_windbot(&self) -> bool {
        self.id
            .as_deref()
            .map_or(false, |id| id.starts_with(WINDBOT_PREFIX))
    }

    pub fn belongs_to(&self, server: &Server) -> bool {
        self.server.as_deref().map_or(false, |s| s.is_same(server))
    }

    /// Position in the lobby listing: ranked rooms first, then rooms by
    /// mode, AI rooms after single and match duels.
    pub fn sort_key(&self) -> u32 {
        match self.arena.as_deref() {
            Some(ARENA_ATHLETIC) => 0,
            Some(ARENA_ENTERTAIN) => 1,
            _ if self.is_windbot() => 5,
            _ => self.options.mode + 2,
        }
    }
}

/// Partial room carried by an `update` event. Present fields replace the
/// stored ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoomPatch {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub private: Option<bool>,
    #[serde(default)]
    pub options: Option<Ruleset>,
    #[serde(default)]
    pub arena: Option<String>,
    #[serde(default)]
    pub users: Option<Vec<RoomUser>>,
}

impl RoomPatch {
    pub fn apply(&self, room: &Room) -> Room {
        let mut merged = room.clone();
        if let Some(title) = &self.title {
            merged.title = Some(title.clone());
        }
        if let Some(private) = self.private {
            merged.private = Some(private);
        }
        if let Some(options) = &self.options {
            merged.options = options.clone();
        }
        if let Some(arena) = &self.arena {
            merged.arena = Some(arena.clone());
        }
        if let Some(users) = &self.users {
            merged.users = users.clone();
        }
        merged
    }
}

/// Message received on a room feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum RoomEvent {
    Init(Vec<Room>),
    Create(Room),
    Update(RoomPatch),
    Delete(String),
}

/// Arena matchmaker answer: where to join and with which password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResponse {
    pub password: String,
    pub address: String,
    pub port: u16,
}
