use crate::core::settings::Settings;
use std::{convert::Infallible, path::PathBuf, sync::Arc};

use filters::api_filters;
use warp::{http::Method, reject::Rejection, Filter};

use crate::core::db::LeagueDb;

pub mod filters;
pub mod handlers;

async fn handle_rejection(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, msg) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(err) = err.find::<warp::filters::body::BodyDeserializeError>() {
        log::error!("{}", err);
        (warp::http::StatusCode::BAD_REQUEST, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::MethodNotAllowed>() {
        log::error!("Method Not Allowed: {}", err);
        (warp::http::StatusCode::METHOD_NOT_ALLOWED, err.to_string())
    } else if let Some(err) = err.find::<warp::reject::UnsupportedMediaType>() {
        log::error!("Unsupported Media Type: {}", err);
        (warp::http::StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string())
    } else {
        log::error!("Unhandled Rejection: {:?}", err);
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({ "error": msg })),
        code,
    ))
}

pub fn routes(
    db: Arc<LeagueDb>,
    settings: Arc<Settings>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
    let static_dir = settings
        .static_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("web/"));
    let dashboard = warp::get().and(warp::fs::dir(static_dir));

    api_filters(db, settings)
        .or(dashboard)
        .recover(handle_rejection)
}

fn cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_header("Content-Type")
        .allow_methods(&[Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
}

pub async fn run_http_server(db: Arc<LeagueDb>, settings: Arc<Settings>) -> anyhow::Result<()> {
    let port = settings.port();
    log::info!("Listening on port {}", port);

    warp::serve(routes(db, settings).with(cors()))
        .run(([0, 0, 0, 0], port))
        .await;

    Ok(())
}
