use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ballotbox_core::{poll, results, AppState};
use ballotbox_models::{NewPollOption, Poll, PollResults};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::{JsonBody, QueryParams};

const DEFAULT_LIST_LIMIT: usize = 20;
const MAX_LIST_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct CreatePollRequest {
    pub question: String,
    #[serde(default)]
    pub options: Vec<NewPollOption>,
}

#[derive(Deserialize)]
pub struct ListPollsParams {
    pub limit: Option<usize>,
}

pub async fn create_poll(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreatePollRequest>,
) -> Result<(StatusCode, Json<Poll>), ApiError> {
    // Forms submit untouched trailing rows; those are not options.
    let options: Vec<NewPollOption> = body
        .options
        .into_iter()
        .filter(|option| !option.is_blank())
        .collect();

    let poll = poll::create_poll(&state.store, &body.question, &options).await?;
    Ok((StatusCode::CREATED, Json(poll)))
}

pub async fn list_polls(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListPollsParams>,
) -> Result<Json<Value>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let polls = state.store.list_polls(limit).await?;
    Ok(Json(json!({ "polls": polls })))
}

async fn load_poll(state: &AppState, poll_id: &str) -> Result<Poll, ApiError> {
    state
        .store
        .get_poll(poll_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Poll not found.".to_string()))
}

pub async fn get_poll(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> Result<Json<Poll>, ApiError> {
    Ok(Json(load_poll(&state, &poll_id).await?))
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
) -> Result<Json<PollResults>, ApiError> {
    let poll = load_poll(&state, &poll_id).await?;
    Ok(Json(results::project(&poll, state.config.winner_policy)))
}
