use std::{cmp::Ordering, collections::HashSet};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;

use crate::{
    core::player::Monkey,
    error::{Error, Result},
};

pub const MIN_ROUND_PLAYERS: usize = 2;
pub const MAX_ROUND_PLAYERS: usize = 4;

/// Difficulty tier of a round
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type)]
pub enum Difficulty {
    Beginner,
    Advanced,
    Expert,
    Master,
}

impl Difficulty {
    /// Extra stages are capped the same on every difficulty.
    pub const EXTRA_STAGES: u32 = 10;

    /// Highest reachable main stage.
    pub fn main_stages(&self) -> u32 {
        match self {
            Difficulty::Beginner => 10,
            Difficulty::Advanced => 30,
            Difficulty::Expert => 50,
            Difficulty::Master => 10,
        }
    }
}

/// Whether a stored round has been played out
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundState {
    #[default]
    Live,
    Finished,
}

/// A player's performance as entered by the operator
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_tag: String,
    #[serde(default)]
    pub stage_reached: u32,
    #[serde(default)]
    pub lives_lost: u32,
    #[serde(default)]
    pub extra_stages: u32,
    pub monkey_used: Monkey,
    #[serde(default)]
    pub tiebreaker_points: Option<i32>,
}

/// A stored result row of a round
#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct RoundPlayer {
    pub player_tag: String,
    pub stage_reached: u32,
    pub lives_lost: u32,
    pub extra_stages: u32,
    pub monkey_used: Monkey,
    pub tiebreaker_points: Option<i32>,

    /// Null while the round is live
    pub final_rank: Option<u32>,
}

#[derive(PartialEq, Eq, Debug, FromRow, Clone, Serialize)]
pub struct Round {
    pub round_id: i64,
    pub congress_id: i64,
    pub difficulty: Difficulty,
    pub round_order: u32,

    #[sqlx(skip)]
    pub players: Vec<RoundPlayer>,

    /// Derived from `players` when the round is loaded
    #[sqlx(skip)]
    pub state: RoundState,
}

impl Round {
    pub fn with_players(mut self, players: Vec<RoundPlayer>) -> Self {
        self.state = round_state(&players);
        self.players = players;
        self
    }
}

/// Json struct for a new round
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NewRound {
    pub difficulty: Difficulty,
    pub players: Vec<PlayerResult>,
}

/// Json struct for replacing the results of a round
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateRound {
    pub players: Vec<PlayerResult>,
}

/// Orders two results, better result first.
///
/// Stage reached, then extra stages, then fewer lives lost, then tiebreaker
/// points with a missing value counting as zero.
pub fn compare_results(a: &PlayerResult, b: &PlayerResult) -> Ordering {
    b.stage_reached
        .cmp(&a.stage_reached)
        .then_with(|| b.extra_stages.cmp(&a.extra_stages))
        .then_with(|| a.lives_lost.cmp(&b.lives_lost))
        .then_with(|| {
            b.tiebreaker_points
                .unwrap_or(0)
                .cmp(&a.tiebreaker_points.unwrap_or(0))
        })
}

/// Ranks results 1..N. Fully tied results keep their submission order.
pub fn rank_results(results: &[PlayerResult]) -> Vec<(PlayerResult, u32)> {
    let mut sorted = results.to_vec();
    sorted.sort_by(compare_results);

    sorted
        .into_iter()
        .enumerate()
        .map(|(i, r)| (r, i as u32 + 1))
        .collect()
}

/// A round is live while none of its rows carries a rank.
pub fn is_live(players: &[RoundPlayer]) -> bool {
    players.iter().all(|p| p.final_rank.is_none())
}

pub fn round_state(players: &[RoundPlayer]) -> RoundState {
    if is_live(players) {
        RoundState::Live
    } else {
        RoundState::Finished
    }
}

/// Turns submitted results into the rows to store.
///
/// Results where nobody has reached a stage yet are stored unranked, so the
/// round can be created before it is played. Anything else is ranked.
pub fn prepare_new_round(results: &[PlayerResult]) -> Vec<RoundPlayer> {
    if results.iter().all(|r| r.stage_reached == 0) {
        results.iter().map(|r| to_row(r, None)).collect()
    } else {
        finish_round(results)
    }
}

/// Ranks every result. Used when a round is created with outcomes and
/// whenever an existing round is edited.
pub fn finish_round(results: &[PlayerResult]) -> Vec<RoundPlayer> {
    rank_results(results)
        .iter()
        .map(|(r, rank)| to_row(r, Some(*rank)))
        .collect()
}

fn to_row(result: &PlayerResult, final_rank: Option<u32>) -> RoundPlayer {
    RoundPlayer {
        player_tag: result.player_tag.clone(),
        stage_reached: result.stage_reached,
        lives_lost: result.lives_lost,
        extra_stages: result.extra_stages,
        monkey_used: result.monkey_used,
        tiebreaker_points: result.tiebreaker_points,
        final_rank,
    }
}

/// Checks player count, duplicate tags and stage ranges for a difficulty.
pub fn validate_results(difficulty: Difficulty, results: &[PlayerResult]) -> Result<()> {
    if results.len() < MIN_ROUND_PLAYERS || results.len() > MAX_ROUND_PLAYERS {
        return Err(Error::validation(format!(
            "A round needs {} to {} players",
            MIN_ROUND_PLAYERS, MAX_ROUND_PLAYERS
        )));
    }

    let mut seen = HashSet::new();
    for r in results {
        if r.player_tag.trim().is_empty() {
            return Err(Error::validation("Player tag is required"));
        }

        if !seen.insert(r.player_tag.as_str()) {
            return Err(Error::validation(format!(
                "Player {} is listed more than once",
                r.player_tag
            )));
        }

        if r.stage_reached > difficulty.main_stages() {
            return Err(Error::validation(format!(
                "Stage reached for {} must be between 0 and {}",
                r.player_tag,
                difficulty.main_stages()
            )));
        }

        if r.extra_stages > Difficulty::EXTRA_STAGES {
            return Err(Error::validation(format!(
                "Extra stages for {} must be between 0 and {}",
                r.player_tag,
                Difficulty::EXTRA_STAGES
            )));
        }

        if r.tiebreaker_points.is_some_and(|p| p < 0) {
            return Err(Error::validation(format!(
                "Tiebreaker points for {} cannot be negative",
                r.player_tag
            )));
        }
    }

    Ok(())
}
