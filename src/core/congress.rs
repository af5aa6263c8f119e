use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::{
    error::{Error, Result},
    util::{deserialize_date, serialize_date},
};

/// A tournament event and the players on its roster
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct Congress {
    pub congress_id: i64,
    pub name: String,

    #[serde(serialize_with = "serialize_date")]
    pub date: time::Date,

    pub location: Option<String>,
    pub notes: Option<String>,

    /// Player tags on the roster
    #[sqlx(skip)]
    pub players: Vec<String>,
}

impl Congress {
    pub fn has_player(&self, tag: &str) -> bool {
        self.players.iter().any(|p| p == tag)
    }
}

/// Json struct for a congress registration
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewCongress {
    #[serde(default)]
    pub name: String,

    #[serde(serialize_with = "serialize_date", deserialize_with = "deserialize_date")]
    pub date: time::Date,

    pub location: Option<String>,
    pub notes: Option<String>,

    #[serde(default)]
    pub player_tags: Vec<String>,
}

/// Empty optional text is stored as null.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewCongress {
    pub fn validate(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        self.location = non_empty(self.location);
        self.notes = non_empty(self.notes);

        if self.name.is_empty() || self.player_tags.is_empty() {
            return Err(Error::validation(
                "Name, date, and at least one player are required",
            ));
        }

        let mut seen = HashSet::new();
        for tag in &self.player_tags {
            if !seen.insert(tag.as_str()) {
                return Err(Error::validation(format!(
                    "Player {} is listed more than once",
                    tag
                )));
            }
        }

        Ok(self)
    }
}
