use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::{
    error::{Error, Result},
    util::serialize_datetime,
};

/// Highest selectable profile picture.
pub const MAX_PROFILE_PICTURE_ID: u32 = 99;

/// The four playable monkeys, stored and sent as their number.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type)]
#[serde(try_from = "u8", into = "u8")]
#[repr(i32)]
pub enum Monkey {
    AiAi = 1,
    MeeMee = 2,
    Baby = 3,
    GonGon = 4,
}

impl Monkey {
    pub const ALL: [Monkey; 4] = [Monkey::AiAi, Monkey::MeeMee, Monkey::Baby, Monkey::GonGon];

    pub fn name(&self) -> &'static str {
        match self {
            Monkey::AiAi => "AiAi",
            Monkey::MeeMee => "MeeMee",
            Monkey::Baby => "Baby",
            Monkey::GonGon => "GonGon",
        }
    }
}

impl TryFrom<u8> for Monkey {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Monkey::AiAi),
            2 => Ok(Monkey::MeeMee),
            3 => Ok(Monkey::Baby),
            4 => Ok(Monkey::GonGon),
            _ => Err(format!("Invalid monkey {}", value)),
        }
    }
}

impl From<Monkey> for u8 {
    fn from(monkey: Monkey) -> Self {
        monkey as u8
    }
}

impl fmt::Display for Monkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A registered league player
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct Player {
    /// Unique player tag
    pub player_tag: String,

    pub real_name: String,

    /// The monkey this player would rather play
    pub monkey_preference: Monkey,

    pub profile_picture_id: u32,

    #[serde(serialize_with = "serialize_datetime")]
    pub date_added: time::OffsetDateTime,
}

/// Json struct for a player registration
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewPlayer {
    #[serde(default)]
    pub player_tag: String,
    #[serde(default)]
    pub real_name: String,
    pub monkey_preference: Monkey,
    #[serde(default)]
    pub profile_picture_id: u32,
}

impl NewPlayer {
    /// Trims the text fields and checks the ranges the registry accepts.
    pub fn validate(mut self) -> Result<Self> {
        self.player_tag = self.player_tag.trim().to_string();
        self.real_name = self.real_name.trim().to_string();

        if self.player_tag.is_empty() || self.real_name.is_empty() {
            return Err(Error::validation("Player tag and real name are required"));
        }

        if self.profile_picture_id > MAX_PROFILE_PICTURE_ID {
            return Err(Error::validation("Invalid profile picture ID"));
        }

        Ok(self)
    }
}
