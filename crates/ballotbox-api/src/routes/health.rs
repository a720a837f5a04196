use axum::{extract::State, Json};
use ballotbox_core::{observability, AppState};
use serde_json::{json, Map, Value};

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let metrics = observability::metrics_snapshot();
    let rejections: Map<String, Value> = metrics
        .rejections_by_reason
        .into_iter()
        .map(|(reason, count)| (reason, Value::from(count)))
        .collect();

    Json(json!({
        "status": "ok",
        "storage": state.store.backend_name(),
        "suggestions_enabled": state.suggester.is_enabled(),
        "polls_created": metrics.polls_created,
        "votes_recorded": metrics.votes_recorded,
        "votes_rejected": metrics.votes_rejected,
        "votes_rejected_by_reason": rejections,
        "suggestions_degraded": metrics.suggestions_degraded,
    }))
}
