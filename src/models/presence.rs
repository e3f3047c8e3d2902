use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    #[default]
    Unknown,
    Available,
    Hidden,
    Busy,
    Away,
    ExtendedAway,
    Offline,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Hidden => "hidden",
            Self::Busy => "busy",
            Self::Away => "away",
            Self::ExtendedAway => "extended away",
            Self::Offline => "offline",
        }
    }
}

/// Presence aggregated over all of a contact's accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPresence {
    pub state: PresenceState,
    pub custom_message: String,
    pub nickname: String,
}
