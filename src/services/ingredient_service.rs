use sea_orm::{
    EntityTrait, QueryFilter, QueryOrder,
    sea_query::{Expr, LikeExpr},
};
use uuid::Uuid;

use crate::{
    db::escape_like,
    dto::recipes::IngredientList,
    entity::{
        Ingredients,
        ingredients::{Column as IngredientCol, Model as IngredientModel},
    },
    error::{AppError, AppResult},
    models::Ingredient,
    response::{ApiResponse, Meta},
    routes::params::IngredientQuery,
    state::AppState,
};

pub fn ingredient_from_entity(model: IngredientModel) -> Ingredient {
    Ingredient {
        id: model.id,
        name: model.name,
        measurement_unit: model.measurement_unit,
    }
}

/// Unpaginated; the catalog is small enough for autocomplete use.
pub async fn list_ingredients(
    state: &AppState,
    query: IngredientQuery,
) -> AppResult<ApiResponse<IngredientList>> {
    let mut finder = Ingredients::find();
    if let Some(prefix) = query.name.as_deref().filter(|s| !s.is_empty()) {
        let pattern = LikeExpr::new(format!("{}%", escape_like(prefix))).escape('\\');
        finder = finder.filter(Expr::col((Ingredients, IngredientCol::Name)).like(pattern));
    }

    let items = finder
        .order_by_asc(IngredientCol::Name)
        .order_by_asc(IngredientCol::MeasurementUnit)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ingredient_from_entity)
        .collect();

    Ok(ApiResponse::success("Ingredients", IngredientList { items }, Some(Meta::empty())))
}

pub async fn get_ingredient(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Ingredient>> {
    let model = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Ingredient",
        ingredient_from_entity(model),
        Some(Meta::empty()),
    ))
}
