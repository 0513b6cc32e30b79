//! Types and codecs shared by the lobby client, its tests and any tool that
//! needs to speak the room-feed or native-join formats.
//!
//! - [`options`]: the room ruleset and its lobby defaults
//! - [`room`]: rooms, servers and the realtime feed messages
//! - [`token`]: the obfuscated options token handed to the native client

pub mod options;
pub mod room;
pub mod token;

pub use options::Ruleset;
pub use room::{MatchResponse, Room, RoomEvent, RoomPatch, RoomUser, Server};
pub use token::{decode_token, user_secret, DecodedToken, OptionsBlock, TokenError, TokenKind};

/// Id of the canonical ranked-arena server. Servers whose id starts with this
/// value belong to the arena family.
pub const ARENA_SERVER_ID: &str = "tiramisu";

/// Room ids and join tokens of AI opponents start with this prefix.
pub const WINDBOT_PREFIX: &str = "AI#";

pub const ARENA_ATHLETIC: &str = "athletic";
pub const ARENA_ENTERTAIN: &str = "entertain";
