use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric card-type id as assigned by the server catalog.
pub type CardId = u64;

/// Sentinel channel name used for whispers.
pub const WHISPER: &str = "WHISPER";

/// A player's display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Player(pub String);

/// A canonical card name from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Card(pub String);

macro_rules! string_newtype {
    ($ty:ident) => {
        impl $ty {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_newtype!(Player);
string_newtype!(Card);

/// Where a chat message was seen: a named room or a private whisper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Room(String),
    Whisper,
}

impl Channel {
    pub fn room(name: impl Into<String>) -> Self {
        Self::Room(name.into())
    }

    pub fn is_whisper(&self) -> bool {
        matches!(self, Self::Whisper)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Room(name) => name,
            Self::Whisper => WHISPER,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Channel {
    fn from(s: &str) -> Self {
        if s == WHISPER {
            Self::Whisper
        } else {
            Self::Room(s.to_string())
        }
    }
}
