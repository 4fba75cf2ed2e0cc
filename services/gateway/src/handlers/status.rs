use axum::{Json, extract::State};
use market_feed::status::FeedStatus;

use crate::state::AppState;

/// `GET /status`
pub async fn get_status(State(state): State<AppState>) -> Json<FeedStatus> {
    Json(state.feed.get_status())
}
