use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    entity::{
        ShoppingCarts,
        shopping_carts::{ActiveModel as CartActive, Column as CartCol},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::RecipeMinified,
    response::{ApiResponse, Meta},
    services::recipe_service::{find_recipe, minified_from_entity},
    state::AppState,
};

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// Summed amount of one ingredient across every recipe in the cart.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ShoppingListRecipe {
    pub name: String,
    pub author_username: String,
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<ApiResponse<RecipeMinified>> {
    let recipe = find_recipe(&state.orm, recipe_id).await?;

    let existing = ShoppingCarts::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::RecipeId.eq(recipe.id))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::bad_request("Recipe is already in the shopping cart"));
    }

    CartActive {
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
        "cart_add",
        "shopping_carts",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to shopping cart",
        minified_from_entity(&state.config, &recipe),
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<()> {
    let recipe = find_recipe(&state.orm, recipe_id).await?;

    let result = ShoppingCarts::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::RecipeId.eq(recipe.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::bad_request("Recipe is not in the shopping cart"));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "shopping_carts",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;
    Ok(())
}

pub async fn shopping_list_items(pool: &DbPool, user_id: Uuid) -> AppResult<Vec<ShoppingListItem>> {
    let items = sqlx::query_as::<_, ShoppingListItem>(
        r#"
        SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS total_amount
        FROM shopping_carts sc
        JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

pub async fn shopping_list_recipes(
    pool: &DbPool,
    user_id: Uuid,
) -> AppResult<Vec<ShoppingListRecipe>> {
    let recipes = sqlx::query_as::<_, ShoppingListRecipe>(
        r#"
        SELECT DISTINCT r.name, u.username AS author_username
        FROM shopping_carts sc
        JOIN recipes r ON r.id = sc.recipe_id
        JOIN users u ON u.id = r.author_id
        WHERE sc.user_id = $1
        ORDER BY r.name, u.username
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(recipes)
}

pub async fn download_shopping_list(state: &AppState, user: &AuthUser) -> AppResult<String> {
    let items = shopping_list_items(&state.pool, user.user_id).await?;
    let recipes = shopping_list_recipes(&state.pool, user.user_id).await?;
    tracing::debug!(
        user_id = %user.user_id,
        ingredients = items.len(),
        recipes = recipes.len(),
        "rendering shopping list"
    );
    Ok(render_shopping_list(
        Utc::now().date_naive(),
        &items,
        &recipes,
    ))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub fn render_shopping_list(
    date: NaiveDate,
    items: &[ShoppingListItem],
    recipes: &[ShoppingListRecipe],
) -> String {
    let mut lines = vec![
        format!("Shopping list for {}", date.format("%d.%m.%Y")),
        String::new(),
        "Ingredients:".to_string(),
    ];
    lines.extend(items.iter().enumerate().map(|(i, item)| {
        format!(
            "{}. {} ({}) - {}",
            i + 1,
            capitalize(&item.name),
            item.measurement_unit,
            item.total_amount
        )
    }));
    lines.push(String::new());
    lines.push("Recipes:".to_string());
    lines.extend(
        recipes
            .iter()
            .map(|r| format!("* {} (by {})", r.name, r.author_username)),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, unit: &str, total: i64) -> ShoppingListItem {
        ShoppingListItem {
            name: name.into(),
            measurement_unit: unit.into(),
            total_amount: total,
        }
    }

    #[test]
    fn renders_numbered_ingredients_and_recipes() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let text = render_shopping_list(
            date,
            &[item("flour", "g", 700), item("яйца", "шт", 3)],
            &[ShoppingListRecipe {
                name: "Pancakes".into(),
                author_username: "chef".into(),
            }],
        );
        assert_eq!(
            text,
            "Shopping list for 16.10.2026\n\nIngredients:\n1. Flour (g) - 700\n2. Яйца (шт) - 3\n\nRecipes:\n* Pancakes (by chef)"
        );
    }

    #[test]
    fn empty_cart_keeps_headers() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let text = render_shopping_list(date, &[], &[]);
        assert_eq!(text, "Shopping list for 02.01.2026\n\nIngredients:\n\nRecipes:");
    }

    #[test]
    fn capitalize_lowercases_the_tail() {
        assert_eq!(capitalize("sOY SAUCE"), "Soy sauce");
        assert_eq!(capitalize(""), "");
    }
}
