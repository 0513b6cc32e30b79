use serde::{Deserialize, Serialize};

/// Game rules of a room.
///
/// Numeric fields are kept wider than their encoded bit widths so that any
/// value the room feed reports deserializes; the token codec truncates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    pub mode: u32,
    pub rule: u32,
    pub start_lp: u32,
    /// Starting life points for tag duels.
    pub start_lp_tag: u32,
    pub start_hand: u32,
    pub draw_count: u32,
    pub duel_rule: u32,
    pub no_check_deck: bool,
    pub no_shuffle_deck: bool,
    /// Forbidden/limited list id.
    pub lflist: Option<i32>,
    /// Per-turn time limit in seconds.
    pub time_limit: Option<u32>,
    pub auto_death: bool,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            mode: 1,
            rule: 0,
            start_lp: 8000,
            start_lp_tag: 16000,
            start_hand: 5,
            draw_count: 1,
            duel_rule: 5,
            no_check_deck: false,
            no_shuffle_deck: false,
            lflist: Some(0),
            time_limit: Some(180),
            auto_death: false,
        }
    }
}

impl Ruleset {
    /// Life points a player starts with under this ruleset's mode.
    pub fn effective_start_lp(&self) -> u32 {
        // mode 2 is tag duel
        if self.mode == 2 {
            self.start_lp_tag
        } else {
            self.start_lp
        }
    }
}
