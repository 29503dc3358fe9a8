use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use crate::{error::AppResult, services::short_link_service, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/s/{code}", get(follow_short_link))
}

#[utoipa::path(
    get,
    path = "/s/{code}",
    params(
        ("code" = String, Path, description = "Short code issued by get-link")
    ),
    responses(
        (status = 302, description = "Redirect to the recipe page"),
        (status = 404, description = "Unknown short code")
    ),
    tag = "Recipes"
)]
pub async fn follow_short_link(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<impl IntoResponse> {
    let recipe_id = short_link_service::resolve(&state, &code).await?;
    let location = state.config.recipe_page_url(recipe_id);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}
