use axum::{
    extract::{Query, State},
    Json,
};

use crate::dto::quick_apply_dto::{TrackQuery, TrackResponse};
use crate::error::Result;
use crate::AppState;

#[axum::debug_handler]
pub async fn track_application(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> Result<Json<TrackResponse>> {
    let token = query.token.unwrap_or_default();
    let email = query.email.unwrap_or_default();
    let application = state.tracking_service.lookup(&token, &email).await?;
    Ok(Json(TrackResponse {
        success: true,
        application,
    }))
}
