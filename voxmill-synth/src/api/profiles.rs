//! Speaker profile endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::ApiResult;
use crate::speakers::SpeakerProfile;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ProfilesResponse {
    pub profiles: Vec<SpeakerProfile>,
}

/// GET /api/v1/profiles
pub async fn list_profiles(State(state): State<AppState>) -> Json<ProfilesResponse> {
    Json(ProfilesResponse {
        profiles: state.speakers.list_profiles(),
    })
}

/// GET /api/v1/profiles/:id
pub async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SpeakerProfile>> {
    Ok(Json(state.speakers.get(&id)?))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/profiles", get(list_profiles))
        .route("/profiles/:id", get(get_profile))
}
