use axum::{extract::State, Json};
use ballotbox_core::AppState;
use ballotbox_models::Suggestion;
use serde::Deserialize;

use crate::extract::JsonBody;

#[derive(Deserialize)]
pub struct SuggestRequest {
    #[serde(default)]
    pub topic: String,
}

/// Answers 200 for any well-formed body; an unavailable suggester just means
/// no suggestion.
pub async fn suggest_question(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SuggestRequest>,
) -> Json<Suggestion> {
    Json(state.suggester.suggest(&body.topic).await)
}
