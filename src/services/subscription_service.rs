use std::collections::HashMap;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, sea_query::Query,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::users::SubscriptionList,
    entity::{
        Recipes, Subscriptions, Users,
        recipes::Column as RecipeCol,
        subscriptions::{ActiveModel as SubscriptionActive, Column as SubCol},
        users::{Column as UserCol, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{RecipeMinified, UserWithRecipes},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::{
        recipe_service::minified_from_entity,
        user_service::{find_user, user_from_entity},
    },
    state::AppState,
};

/// Renders followed authors with their newest recipes, optionally truncated.
async fn authors_with_recipes<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    authors: Vec<UserModel>,
    recipes_limit: Option<u64>,
) -> AppResult<Vec<UserWithRecipes>> {
    let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let mut by_author: HashMap<Uuid, Vec<RecipeMinified>> = HashMap::new();
    if !ids.is_empty() {
        let recipes = Recipes::find()
            .filter(RecipeCol::AuthorId.is_in(ids.iter().copied()))
            .order_by_desc(RecipeCol::PubDate)
            .order_by_desc(RecipeCol::Id)
            .all(conn)
            .await?;
        for recipe in &recipes {
            by_author
                .entry(recipe.author_id)
                .or_default()
                .push(minified_from_entity(config, recipe));
        }
    }

    Ok(authors
        .into_iter()
        .map(|author| {
            let mut recipes = by_author.remove(&author.id).unwrap_or_default();
            let recipes_count = recipes.len() as i64;
            if let Some(limit) = recipes_limit {
                recipes.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
            }
            UserWithRecipes {
                user: user_from_entity(config, author, true),
                recipes,
                recipes_count,
            }
        })
        .collect())
}

pub async fn list_subscriptions(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
    recipes_limit: Option<u64>,
) -> AppResult<ApiResponse<SubscriptionList>> {
    let (page, limit, offset) = pagination.normalize();

    let followed = Query::select()
        .column(SubCol::AuthorId)
        .from(Subscriptions)
        .and_where(SubCol::UserId.eq(user.user_id))
        .to_owned();
    let finder = Users::find()
        .filter(UserCol::Id.in_subquery(followed))
        .order_by_asc(UserCol::Email);

    let total = finder.clone().count(&state.orm).await? as i64;
    let authors = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = authors_with_recipes(&state.orm, &state.config, authors, recipes_limit).await?;
    Ok(ApiResponse::page(
        "Subscriptions",
        SubscriptionList { items },
        page,
        limit,
        total,
    ))
}

pub async fn subscribe(
    state: &AppState,
    user: &AuthUser,
    author_id: Uuid,
    recipes_limit: Option<u64>,
) -> AppResult<ApiResponse<UserWithRecipes>> {
    let author = find_user(&state.orm, author_id).await?;
    if author.id == user.user_id {
        return Err(AppError::bad_request("You cannot subscribe to yourself"));
    }

    let existing = Subscriptions::find()
        .filter(SubCol::UserId.eq(user.user_id))
        .filter(SubCol::AuthorId.eq(author.id))
        .count(&state.orm)
        .await?;
    if existing > 0 {
        return Err(AppError::bad_request("You are already subscribed to this author"));
    }

    SubscriptionActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        author_id: Set(author.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "subscribe",
        "subscriptions",
        serde_json::json!({ "author_id": author.id }),
    )
    .await;

    let rendered = authors_with_recipes(&state.orm, &state.config, vec![author], recipes_limit)
        .await?
        .pop()
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Subscribed", rendered, Some(Meta::empty())))
}

pub async fn unsubscribe(state: &AppState, user: &AuthUser, author_id: Uuid) -> AppResult<()> {
    let author = find_user(&state.orm, author_id).await?;

    let result = Subscriptions::delete_many()
        .filter(SubCol::UserId.eq(user.user_id))
        .filter(SubCol::AuthorId.eq(author.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::bad_request("You are not subscribed to this author"));
    }

    audit::record(
        &state.pool,
        user.user_id,
        "unsubscribe",
        "subscriptions",
        serde_json::json!({ "author_id": author.id }),
    )
    .await;
    Ok(())
}
