pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use ballotbox_core::AppState;

pub fn build_router() -> Router<AppState> {
    let api = Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/polls",
            get(routes::polls::list_polls).post(routes::polls::create_poll),
        )
        .route("/polls/{id}", get(routes::polls::get_poll))
        .route("/polls/{id}/results", get(routes::polls::get_results))
        .route("/polls/{id}/votes", post(routes::votes::cast_vote))
        .route("/suggestions", post(routes::suggestions::suggest_question));

    Router::new().nest("/api/v1", api)
}
