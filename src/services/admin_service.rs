use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    audit,
    db::escape_like,
    dto::admin::{AdminRecipeList, AdminRecipeRow, CreateIngredientRequest},
    entity::{
        Ingredients,
        ingredients::{ActiveModel as IngredientActive, Column as IngredientCol},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Ingredient,
    response::{ApiResponse, Meta},
    routes::params::{AdminRecipeQuery, Pagination},
    services::ingredient_service::ingredient_from_entity,
    state::AppState,
    validation::validate_ingredient_fields,
};

fn like_pattern(search: &str) -> String {
    format!("%{}%", escape_like(search))
}

pub async fn list_recipes(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    query: AdminRecipeQuery,
) -> AppResult<ApiResponse<AdminRecipeList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();
    let pattern = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern);

    let items = sqlx::query_as::<_, AdminRecipeRow>(
        r#"
        SELECT r.id, r.name, u.username AS author_username, u.email AS author_email,
               r.cooking_time, r.pub_date,
               (SELECT COUNT(*) FROM favorites f WHERE f.recipe_id = r.id) AS favorites_count
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE $1::TEXT IS NULL
           OR r.name ILIKE $1 OR u.username ILIKE $1 OR u.email ILIKE $1
        ORDER BY r.pub_date DESC, r.id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(pattern.as_deref())
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM recipes r
        JOIN users u ON u.id = r.author_id
        WHERE $1::TEXT IS NULL
           OR r.name ILIKE $1 OR u.username ILIKE $1 OR u.email ILIKE $1
        "#,
    )
    .bind(pattern.as_deref())
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::page(
        "Recipes",
        AdminRecipeList { items },
        page,
        limit,
        total.0,
    ))
}

pub async fn create_ingredient(
    state: &AppState,
    user: &AuthUser,
    payload: CreateIngredientRequest,
) -> AppResult<ApiResponse<Ingredient>> {
    ensure_admin(user)?;
    let name = payload.name.trim().to_string();
    let measurement_unit = payload.measurement_unit.trim().to_string();
    validate_ingredient_fields(&name, &measurement_unit)?;

    let duplicate = Ingredients::find()
        .filter(IngredientCol::Name.eq(name.as_str()))
        .filter(IngredientCol::MeasurementUnit.eq(measurement_unit.as_str()))
        .count(&state.orm)
        .await?;
    if duplicate > 0 {
        return Err(AppError::bad_request(
            "An ingredient with this name and measurement unit already exists",
        ));
    }

    let ingredient = IngredientActive {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        measurement_unit: Set(measurement_unit),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "ingredient_create",
        "ingredients",
        serde_json::json!({ "ingredient_id": ingredient.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Ingredient created",
        ingredient_from_entity(ingredient),
        Some(Meta::empty()),
    ))
}

pub async fn delete_ingredient(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    ensure_admin(user)?;
    let result = Ingredients::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "ingredient_delete",
        "ingredients",
        serde_json::json!({ "ingredient_id": id }),
    )
    .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("soup"), "%soup%");
        assert_eq!(like_pattern("100%_"), "%100\\%\\_%");
    }
}
