//! Options token exchanged with the native client's join handshake.
//!
//! A token is a 6-byte options block, obfuscated with a per-user secret and
//! base64-encoded, followed by the room title, password or id:
//!
//! ```text
//! byte 0  checksum: 0 - (byte1 + .. + byte5) mod 256
//! byte 1  marker << 4 | duel_rule << 1 | auto_death
//! byte 2  rule << 5 | mode << 3 | no_check_deck << 1 | no_shuffle_deck
//! byte 3  start_lp, u16 little-endian
//! byte 5  start_hand << 4 | draw_count
//! ```
//!
//! The block is XOR-ed as three little-endian u16 words with
//! `(external_id % 65535) + 1`. Values wider than their field are truncated,
//! the receiver rejects what it cannot parse.

use crate::options::Ruleset;
use crate::WINDBOT_PREFIX;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

pub const BLOCK_LEN: usize = 6;
/// Length of the base64 prefix of every token.
pub const ENCODED_BLOCK_LEN: usize = 8;
/// Stands in for the first whitespace of a title or password.
pub const WHITESPACE_MARKER: char = '\u{feff}';

/// What the native client should do with the token, stored in the high
/// nibble of byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TokenKind {
    PublicCreate = 1,
    PrivateCreate = 2,
    JoinRoom = 3,
    JoinPassword = 5,
}

impl TokenKind {
    pub fn marker(self) -> u8 {
        self as u8
    }

    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            1 => Some(Self::PublicCreate),
            2 => Some(Self::PrivateCreate),
            3 => Some(Self::JoinRoom),
            5 => Some(Self::JoinPassword),
            _ => None,
        }
    }
}

/// XOR key bound to a platform account.
pub fn user_secret(external_id: u64) -> u16 {
    ((external_id % 65535) + 1) as u16
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionsBlock([u8; BLOCK_LEN]);

impl OptionsBlock {
    /// Block carrying only a marker, used by the join tokens.
    pub fn marker_only(kind: TokenKind) -> Self {
        let mut bytes = [0u8; BLOCK_LEN];
        bytes[1] = kind.marker() << 4;
        Self::sealed(bytes)
    }

    pub fn with_ruleset(kind: TokenKind, ruleset: &Ruleset) -> Self {
        let mut bytes = [0u8; BLOCK_LEN];
        bytes[1] = ((u32::from(kind.marker()) << 4)
            | (ruleset.duel_rule << 1)
            | u32::from(ruleset.auto_death)) as u8;
        bytes[2] = ((ruleset.rule << 5)
            | (ruleset.mode << 3)
            | (u32::from(ruleset.no_check_deck) << 1)
            | u32::from(ruleset.no_shuffle_deck)) as u8;
        bytes[3..5].copy_from_slice(&(ruleset.start_lp as u16).to_le_bytes());
        bytes[5] = ((ruleset.start_hand << 4) | ruleset.draw_count) as u8;
        Self::sealed(bytes)
    }

    fn sealed(mut bytes: [u8; BLOCK_LEN]) -> Self {
        bytes[0] = Self::checksum_of(&bytes);
        Self(bytes)
    }

    fn checksum_of(bytes: &[u8; BLOCK_LEN]) -> u8 {
        bytes[1..]
            .iter()
            .fold(0u8, |checksum, byte| checksum.wrapping_sub(*byte))
    }

    pub fn from_bytes(bytes: [u8; BLOCK_LEN]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; BLOCK_LEN] {
        self.0
    }

    pub fn checksum_valid(&self) -> bool {
        self.0[0] == Self::checksum_of(&self.0)
    }

    /// XORs every little-endian word with `secret`. Applying it twice with
    /// the same secret restores the block.
    pub fn obfuscate(&self, secret: u16) -> Self {
        let mut bytes = self.0;
        for word in bytes.chunks_exact_mut(2) {
            let value = u16::from_le_bytes([word[0], word[1]]) ^ secret;
            word.copy_from_slice(&value.to_le_bytes());
        }
        Self(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn marker(&self) -> u8 {
        self.0[1] >> 4
    }

    /// Reads the ruleset fields the block carries. Fields outside the block
    /// keep their defaults.
    pub fn ruleset(&self) -> Ruleset {
        let b = self.0;
        Ruleset {
            duel_rule: u32::from((b[1] >> 1) & 0x07),
            auto_death: b[1] & 0x01 != 0,
            rule: u32::from(b[2] >> 5),
            mode: u32::from((b[2] >> 3) & 0x03),
            no_check_deck: b[2] & 0x02 != 0,
            no_shuffle_deck: b[2] & 0x01 != 0,
            start_lp: u32::from(u16::from_le_bytes([b[3], b[4]])),
            start_hand: u32::from(b[5] >> 4),
            draw_count: u32::from(b[5] & 0x0f),
            ..Ruleset::default()
        }
    }
}

/// Replaces the first whitespace character with [`WHITESPACE_MARKER`].
pub fn mark_first_whitespace(text: &str) -> String {
    match text.char_indices().find(|(_, c)| c.is_whitespace()) {
        Some((index, c)) => {
            let mut marked = String::with_capacity(text.len() + 2);
            marked.push_str(&text[..index]);
            marked.push(WHITESPACE_MARKER);
            marked.push_str(&text[index + c.len_utf8()..]);
            marked
        }
        None => text.to_string(),
    }
}

/// Token that creates a room on the server it is sent to. Private rooms
/// carry the host password verbatim, public rooms their title.
pub fn create_room_token(
    ruleset: &Ruleset,
    private: bool,
    title: &str,
    host_password: &str,
    secret: u16,
) -> String {
    let kind = if private {
        TokenKind::PrivateCreate
    } else {
        TokenKind::PublicCreate
    };
    let block = OptionsBlock::with_ruleset(kind, ruleset).obfuscate(secret);
    let tail = if private {
        host_password.to_string()
    } else {
        mark_first_whitespace(title)
    };
    block.to_base64() + &tail
}

pub fn join_room_token(room_id: &str, secret: u16) -> String {
    let block = OptionsBlock::marker_only(TokenKind::JoinRoom).obfuscate(secret);
    block.to_base64() + room_id
}

pub fn join_password_token(password: &str, secret: u16) -> String {
    let block = OptionsBlock::marker_only(TokenKind::JoinPassword).obfuscate(secret);
    block.to_base64() + &mark_first_whitespace(password)
}

pub fn windbot_token(bot_name: &str) -> String {
    format!("{}{}", WINDBOT_PREFIX, bot_name)
}

#[derive(Debug)]
pub enum TokenError {
    TooShort(usize),
    Base64(base64::DecodeError),
    Checksum { expected: u8, found: u8 },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort(len) => write!(f, "Token too short: {} bytes", len),
            Self::Base64(e) => write!(f, "Invalid token block: {}", e),
            Self::Checksum { expected, found } => write!(
                f,
                "Options checksum mismatch: expected {:#04x}, found {:#04x}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for TokenError {}

impl From<base64::DecodeError> for TokenError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Base64(e)
    }
}

/// Receiver-side view of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedToken {
    pub marker: u8,
    pub ruleset: Ruleset,
    /// Title, password or room id following the block.
    pub tail: String,
}

impl DecodedToken {
    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_marker(self.marker)
    }
}

pub fn decode_token(token: &str, secret: u16) -> Result<DecodedToken, TokenError> {
    let prefix = token
        .as_bytes()
        .get(..ENCODED_BLOCK_LEN)
        .ok_or(TokenError::TooShort(token.len()))?;
    let raw = STANDARD.decode(prefix)?;
    let bytes: [u8; BLOCK_LEN] = raw
        .as_slice()
        .try_into()
        .map_err(|_| TokenError::TooShort(raw.len()))?;

    let block = OptionsBlock::from_bytes(bytes).obfuscate(secret);
    if !block.checksum_valid() {
        return Err(TokenError::Checksum {
            expected: OptionsBlock::checksum_of(&block.0),
            found: block.0[0],
        });
    }

    Ok(DecodedToken {
        marker: block.marker(),
        ruleset: block.ruleset(),
        // a valid block is ASCII, so the tail starts on a char boundary
        tail: token.get(ENCODED_BLOCK_LEN..).unwrap_or_default().to_string(),
    })
}
