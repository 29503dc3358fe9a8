use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    entity::{
        Favorites,
        favorites::{ActiveModel as FavoriteActive, Column as FavCol},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::RecipeMinified,
    response::{ApiResponse, Meta},
    services::recipe_service::{find_recipe, minified_from_entity},
    state::AppState,
};

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<ApiResponse<RecipeMinified>> {
    let recipe = find_recipe(&state.orm, recipe_id).await?;

    let existing = Favorites::find()
        .filter(FavCol::UserId.eq(user.user_id))
        .filter(FavCol::RecipeId.eq(recipe.id))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::bad_request("Recipe is already in favorites"));
    }

    FavoriteActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        recipe_id: Set(recipe.id),
        added_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_add",
        "favorites",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to favorites",
        minified_from_entity(&state.config, &recipe),
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(state: &AppState, user: &AuthUser, recipe_id: Uuid) -> AppResult<()> {
    let recipe = find_recipe(&state.orm, recipe_id).await?;

    let result = Favorites::delete_many()
        .filter(FavCol::UserId.eq(user.user_id))
        .filter(FavCol::RecipeId.eq(recipe.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::bad_request("Recipe is not in favorites"));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "favorite_remove",
        "favorites",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;
    Ok(())
}
