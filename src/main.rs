#![allow(unused)]
use crate::api::*;
use crate::db::SQLite;
use crate::guard::RetryPolicy;
use crate::pronostico::{PositionError, Pronostico};
use crate::settings::Settings;
use crate::settlement::resolve;
use crate::vote::VoteError;
use anyhow::Result;
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, trace};
use std::sync::Arc;
use tokio::task::JoinHandle;

mod api;
#[cfg(test)]
mod client;
mod db;
mod event_result;
mod guard;
mod pronostico;
mod selection;
mod settings;
mod settlement;
#[cfg(test)]
mod testkit;
mod vote;

fn map_position_err(e: anyhow::Error) -> (StatusCode, String) {
    let code = match e.downcast_ref::<PositionError>() {
        Some(
            PositionError::UnknownPosition(_)
            | PositionError::UnknownComment(_)
            | PositionError::NoResult(_),
        ) => StatusCode::NOT_FOUND,
        Some(PositionError::ResultAlreadyRecorded(_)) => StatusCode::CONFLICT,
        Some(_) => StatusCode::BAD_REQUEST,
        None => return map_any_err_and_code(e),
    };
    (code, map_any_err(e))
}
fn map_vote_err(e: VoteError) -> (StatusCode, String) {
    debug!("Error: {}", e);
    let code = match e {
        VoteError::InvalidVoteDirection(_) => StatusCode::BAD_REQUEST,
        VoteError::TargetNotFound { .. } => StatusCode::NOT_FOUND,
        VoteError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
        VoteError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, e.to_string())
}

#[debug_handler]
async fn new_position(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<NewPositionRequest>,
) -> Result<(StatusCode, Json<RowId>), (StatusCode, String)> {
    let id = state
        .new_position(request)
        .await
        .map_err(map_position_err)?;
    Ok((StatusCode::CREATED, id.into()))
}
#[debug_handler]
async fn get_positions(
    State(state): State<Arc<Pronostico>>,
) -> Result<Json<Vec<Position>>, (StatusCode, String)> {
    let positions = state.get_positions().await.map_err(map_any_err_and_code)?;
    Ok(Json(positions))
}
#[debug_handler]
async fn get_position(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<PositionRequest>,
) -> Result<Json<Position>, (StatusCode, String)> {
    let position = state
        .get_position(request.position)
        .await
        .map_err(map_position_err)?;
    Ok(Json(position))
}
#[debug_handler]
async fn delete_position(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<PositionRequest>,
) -> Result<(), (StatusCode, String)> {
    state
        .delete_position(request.position)
        .await
        .map_err(map_position_err)?;
    debug!("Deleted position {}", request.position);
    Ok(())
}
#[debug_handler]
async fn new_comment(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<NewCommentRequest>,
) -> Result<(StatusCode, Json<RowId>), (StatusCode, String)> {
    let id = state.new_comment(request).await.map_err(map_position_err)?;
    Ok((StatusCode::CREATED, id.into()))
}
#[debug_handler]
async fn get_comments(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<PositionRequest>,
) -> Result<Json<Vec<Comment>>, (StatusCode, String)> {
    let comments = state
        .get_comments(request.position)
        .await
        .map_err(map_position_err)?;
    Ok(Json(comments))
}
#[debug_handler]
async fn delete_comment(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<CommentRequest>,
) -> Result<(), (StatusCode, String)> {
    state
        .delete_comment(request.comment)
        .await
        .map_err(map_position_err)?;
    Ok(())
}
#[debug_handler]
async fn vote(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteOutcome>, (StatusCode, String)> {
    let outcome = state.vote(request).await.map_err(map_vote_err)?;
    Ok(Json(outcome))
}
#[debug_handler]
async fn get_vote(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<VoteLookupRequest>,
) -> Result<Json<Option<VoteDirection>>, (StatusCode, String)> {
    let direction = state.get_vote(request).await.map_err(map_any_err_and_code)?;
    Ok(Json(direction))
}
#[debug_handler]
async fn record_event_result(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<EventResultRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .record_event_result(request.event, request.result)
        .await
        .map_err(map_position_err)?;
    Ok(StatusCode::CREATED)
}
#[debug_handler]
async fn settle_event(
    State(state): State<Arc<Pronostico>>,
    Json(request): Json<SettleEventRequest>,
) -> Result<Json<Vec<SettlementResponse>>, (StatusCode, String)> {
    let settled = state
        .settle_event(request.event)
        .await
        .map_err(map_position_err)?;
    Ok(Json(settled))
}
async fn resolve_selection(Json(request): Json<ResolveRequest>) -> Json<SettlementOutcome> {
    trace!("Resolving {} \"{}\"", request.market, request.selection);
    Json(resolve(request.market, &request.selection, &request.result))
}

#[derive(Parser)]
struct Args {
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    db: Option<String>,
    /// Settings file, `pronostico.toml` in the working directory if omitted
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.port = port;
    }
    if let Some(db) = cli.db {
        settings.db = db;
    }
    Builder::default()
        .filter_level(settings.level_filter())
        .write_style(WriteStyle::Always)
        .init();
    let (_port, handle) = run_server(
        Some(settings.port),
        Some(settings.db.clone()),
        settings.retry_policy(),
    )
    .await?;
    handle.await?;
    Ok(())
}

async fn run_server(
    port: Option<u16>,
    db_conn: Option<String>,
    policy: RetryPolicy,
) -> Result<(u16, JoinHandle<()>)> {
    let state = Arc::new(Pronostico::new(SQLite::new(db_conn).await?, policy));
    let app = Router::new()
        .route("/new_position", post(new_position))
        .route("/get_positions", get(get_positions))
        .route("/get_position", post(get_position))
        .route("/delete_position", post(delete_position))
        .route("/new_comment", post(new_comment))
        .route("/get_comments", post(get_comments))
        .route("/delete_comment", post(delete_comment))
        .route("/vote", post(vote))
        .route("/get_vote", post(get_vote))
        .route("/record_event_result", post(record_event_result))
        .route("/settle_event", post(settle_event))
        .route("/resolve", post(resolve_selection))
        .with_state(state);

    let addr = "127.0.0.1:".to_string() + port.unwrap_or(0).to_string().as_str();
    let server = axum::Server::try_bind(&addr.parse()?)?.serve(app.into_make_service());
    let port = server.local_addr().port();
    debug!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Server stopped: {}", e);
        }
    });
    Ok((port, handle))
}
