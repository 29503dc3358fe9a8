use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::admin::{AdminRecipeList, CreateIngredientRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Ingredient,
    response::ApiResponse,
    routes::params::{AdminRecipeQuery, Pagination},
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_all_recipes))
        .route("/ingredients", post(create_ingredient))
        .route("/ingredients/{id}", delete(delete_ingredient))
}

#[utoipa::path(
    get,
    path = "/api/admin/recipes",
    params(Pagination, AdminRecipeQuery),
    responses(
        (status = 200, description = "Search recipes by name, author username or email (admin only)", body = ApiResponse<AdminRecipeList>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_recipes(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
    Query(query): Query<AdminRecipeQuery>,
) -> AppResult<Json<ApiResponse<AdminRecipeList>>> {
    let resp = admin_service::list_recipes(&state, &user, pagination, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/ingredients",
    request_body = CreateIngredientRequest,
    responses(
        (status = 201, description = "Ingredient created (admin only)", body = ApiResponse<Ingredient>),
        (status = 400, description = "Validation failed or duplicate"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateIngredientRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Ingredient>>)> {
    let resp = admin_service::create_ingredient(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/ingredients/{id}",
    params(
        ("id" = Uuid, Path, description = "Ingredient ID")
    ),
    responses(
        (status = 204, description = "Ingredient deleted (admin only)"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Ingredient not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    admin_service::delete_ingredient(&state, &user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
