use std::{convert::Infallible, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use warp::http::StatusCode;

use crate::{
    core::{
        congress::NewCongress,
        db::LeagueDb,
        distribution::{distribute_monkeys, Distribution},
        player::Player,
        round::{MAX_ROUND_PLAYERS, MIN_ROUND_PLAYERS},
        settings::Settings,
    },
    error::{Error, Result},
};

/// A Json struct returned after creating a congress
#[derive(Serialize, Deserialize, Debug)]
pub struct CreatedCongress {
    pub congress_id: i64,
    pub message: String,
}

/// A Json struct naming the players of a distribution
#[derive(Serialize, Deserialize, Debug)]
pub struct DistributionRequest {
    pub player_tags: Vec<String>,
}

#[derive(Serialize, Debug)]
struct ErrorBody {
    error: String,
}

pub fn error_reply(error: &Error) -> warp::reply::WithStatus<warp::reply::Json> {
    match error {
        Error::Validation(_) | Error::NotFound(_) => log::warn!("{}", error),
        _ => log::error!("{}", error),
    }

    warp::reply::with_status(
        warp::reply::json(&ErrorBody {
            error: error.public_message(),
        }),
        error.status(),
    )
}

pub fn to_http_output<T: Serialize>(
    result: Result<T>,
    status: StatusCode,
) -> std::result::Result<impl warp::Reply, Infallible> {
    match result {
        Ok(data) => Ok(warp::reply::with_status(warp::reply::json(&data), status)),
        Err(e) => Ok(error_reply(&e)),
    }
}

/// Picks the requested players out of a congress roster, in request order.
pub fn select_roster(roster: Vec<Player>, tags: &[String]) -> Result<Vec<Player>> {
    if tags.len() < MIN_ROUND_PLAYERS || tags.len() > MAX_ROUND_PLAYERS {
        return Err(Error::validation(format!(
            "Select {} to {} players",
            MIN_ROUND_PLAYERS, MAX_ROUND_PLAYERS
        )));
    }

    tags.iter()
        .map(|tag| {
            roster
                .iter()
                .find(|p| &p.player_tag == tag)
                .cloned()
                .ok_or_else(|| Error::validation(format!("Player {} is not part of this congress", tag)))
        })
        .collect()
}

async fn roll_distribution(
    congress_id: i64,
    request: DistributionRequest,
    db: &LeagueDb,
    settings: &Settings,
) -> Result<Distribution> {
    db.get_congress(congress_id).await?;
    let roster = select_roster(db.get_congress_players(congress_id).await?, &request.player_tags)?;

    if let Some(delay) = settings.distribution_delay_ms {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let distribution = distribute_monkeys(&roster, &mut rand::thread_rng())?;
    log::info!(
        "Distributed monkeys for congress {}: {}",
        congress_id,
        distribution.message
    );
    Ok(distribution)
}

pub async fn create_congress(
    congress: NewCongress,
    db: Arc<LeagueDb>,
) -> std::result::Result<impl warp::Reply, Infallible> {
    let created = db.add_congress(congress).await.map(|congress_id| CreatedCongress {
        congress_id,
        message: "Congress created successfully".to_string(),
    });
    to_http_output(created, StatusCode::CREATED)
}

pub async fn distribute(
    congress_id: i64,
    request: DistributionRequest,
    db: Arc<LeagueDb>,
    settings: Arc<Settings>,
) -> std::result::Result<impl warp::Reply, Infallible> {
    to_http_output(
        roll_distribution(congress_id, request, &db, &settings).await,
        StatusCode::OK,
    )
}
