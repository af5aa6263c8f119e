use std::{convert::Infallible, sync::Arc};

use warp::{http::StatusCode, reject::Rejection, Filter};

use crate::core::{
    db::LeagueDb,
    player::NewPlayer,
    round::{NewRound, UpdateRound},
    settings::Settings,
};

use super::handlers::{create_congress, distribute, to_http_output};

pub fn with_db(
    db: Arc<LeagueDb>,
) -> impl Filter<Extract = (Arc<LeagueDb>,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}

pub fn with_settings(
    settings: Arc<Settings>,
) -> impl Filter<Extract = (Arc<Settings>,), Error = Infallible> + Clone {
    warp::any().map(move || settings.clone())
}

fn player_filters(
    db: Arc<LeagueDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let list_players = warp::path!("players")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<LeagueDb>| async move {
            to_http_output(db.get_players().await, StatusCode::OK)
        });

    let create_player = warp::path!("players")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|player: NewPlayer, db: Arc<LeagueDb>| async move {
            to_http_output(db.add_player(player).await, StatusCode::CREATED)
        });

    list_players.or(create_player)
}

fn congress_filters(
    db: Arc<LeagueDb>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let list_congresses = warp::path!("congresses")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|db: Arc<LeagueDb>| async move {
            to_http_output(db.get_congresses().await, StatusCode::OK)
        });

    let create_congress = warp::path!("congresses")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(create_congress);

    let read_congress = warp::path!("congresses" / i64)
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|congress_id: i64, db: Arc<LeagueDb>| async move {
            to_http_output(db.get_congress(congress_id).await, StatusCode::OK)
        });

    list_congresses.or(create_congress).or(read_congress)
}

fn round_filters(
    db: Arc<LeagueDb>,
    settings: Arc<Settings>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    let list_rounds = warp::path!("congresses" / i64 / "rounds")
        .and(warp::get())
        .and(with_db(db.clone()))
        .and_then(|congress_id: i64, db: Arc<LeagueDb>| async move {
            to_http_output(db.get_rounds(congress_id).await, StatusCode::OK)
        });

    let create_round = warp::path!("congresses" / i64 / "rounds")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(|congress_id: i64, round: NewRound, db: Arc<LeagueDb>| async move {
            to_http_output(db.add_round(congress_id, round).await, StatusCode::CREATED)
        });

    let update_round = warp::path!("congresses" / i64 / "rounds" / i64)
        .and(warp::put())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and_then(
            |congress_id: i64, round_id: i64, update: UpdateRound, db: Arc<LeagueDb>| async move {
                to_http_output(
                    db.update_round(congress_id, round_id, update).await,
                    StatusCode::OK,
                )
            },
        );

    let distribution = warp::path!("congresses" / i64 / "distribution")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_db(db.clone()))
        .and(with_settings(settings))
        .and_then(distribute);

    list_rounds
        .or(create_round)
        .or(update_round)
        .or(distribution)
}

pub fn api_filters(
    db: Arc<LeagueDb>,
    settings: Arc<Settings>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Rejection> + Clone {
    player_filters(db.clone())
        .or(congress_filters(db.clone()))
        .or(round_filters(db, settings))
}
