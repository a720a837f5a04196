use axum::{
    extract::{Path, State},
    Json,
};
use ballotbox_core::{vote, AppState};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::Voter;

#[derive(Deserialize)]
pub struct CastVoteRequest {
    pub option_index: i64,
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Path(poll_id): Path<String>,
    Voter(voter): Voter,
    JsonBody(body): JsonBody<CastVoteRequest>,
) -> Result<Json<Value>, ApiError> {
    let poll = vote::record_vote(
        &state.store,
        &state.config.voting,
        &poll_id,
        body.option_index,
        &voter,
    )
    .await?;

    Ok(Json(json!({ "success": true, "poll": poll })))
}
