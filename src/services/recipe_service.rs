use std::collections::{HashMap, HashSet};

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
    sea_query::{Query, SimpleExpr},
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::recipes::{CreateRecipeRequest, IngredientAmount, RecipeList, UpdateRecipeRequest},
    entity::{
        Favorites, Ingredients, RecipeIngredients, Recipes, ShoppingCarts, Users,
        favorites::Column as FavCol,
        ingredients::Column as IngredientCol,
        recipe_ingredients::{ActiveModel as LineActive, Column as LineCol},
        recipes::{ActiveModel as RecipeActive, Column as RecipeCol, Model as RecipeModel},
        shopping_carts::Column as CartCol,
        users::Column as UserCol,
    },
    error::{AppError, AppResult},
    media::{self, DecodedImage, RECIPE_IMAGE_DIR},
    middleware::auth::AuthUser,
    models::{Recipe, RecipeIngredient, RecipeMinified},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, RecipeQuery, RelationFilter},
    services::user_service::{subscribed_author_ids, user_from_entity},
    state::AppState,
    validation::{
        validate_cooking_time, validate_ingredient_lines, validate_recipe_name,
        validate_recipe_text,
    },
};

/// Per-viewer flags for a batch of recipes.
#[derive(Debug, Default)]
struct ViewerFlags {
    favorited: HashSet<Uuid>,
    in_cart: HashSet<Uuid>,
}

async fn viewer_flags<C: ConnectionTrait>(
    conn: &C,
    viewer: Option<Uuid>,
    recipe_ids: &[Uuid],
) -> AppResult<ViewerFlags> {
    let Some(viewer) = viewer else {
        return Ok(ViewerFlags::default());
    };
    if recipe_ids.is_empty() {
        return Ok(ViewerFlags::default());
    }

    let favorited = Favorites::find()
        .select_only()
        .column(FavCol::RecipeId)
        .filter(FavCol::UserId.eq(viewer))
        .filter(FavCol::RecipeId.is_in(recipe_ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;

    let in_cart = ShoppingCarts::find()
        .select_only()
        .column(CartCol::RecipeId)
        .filter(CartCol::UserId.eq(viewer))
        .filter(CartCol::RecipeId.is_in(recipe_ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;

    Ok(ViewerFlags {
        favorited: favorited.into_iter().collect(),
        in_cart: in_cart.into_iter().collect(),
    })
}

pub fn minified_from_entity(config: &AppConfig, model: &RecipeModel) -> RecipeMinified {
    RecipeMinified {
        id: model.id,
        name: model.name.clone(),
        image: config.media_url(&model.image),
        cooking_time: model.cooking_time,
    }
}

/// Renders full recipes with a fixed number of queries regardless of page size.
async fn render_recipes<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    viewer: Option<Uuid>,
    recipes: Vec<RecipeModel>,
) -> AppResult<Vec<Recipe>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }

    let recipe_ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<Uuid> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<Uuid, _> = Users::find()
        .filter(UserCol::Id.is_in(author_ids.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let subscribed = subscribed_author_ids(conn, viewer, &author_ids).await?;

    let mut lines: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    let rows = RecipeIngredients::find()
        .filter(LineCol::RecipeId.is_in(recipe_ids.iter().copied()))
        .find_also_related(Ingredients)
        .order_by_asc(IngredientCol::Name)
        .all(conn)
        .await?;
    for (line, ingredient) in rows {
        let Some(ingredient) = ingredient else {
            continue;
        };
        lines.entry(line.recipe_id).or_default().push(RecipeIngredient {
            id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
            amount: line.amount,
        });
    }

    let flags = viewer_flags(conn, viewer, &recipe_ids).await?;

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("author {} missing", recipe.author_id))
            })?;
            let is_subscribed = subscribed.contains(&author.id);
            Ok(Recipe {
                id: recipe.id,
                author: user_from_entity(config, author, is_subscribed),
                ingredients: lines.remove(&recipe.id).unwrap_or_default(),
                is_favorited: flags.favorited.contains(&recipe.id),
                is_in_shopping_cart: flags.in_cart.contains(&recipe.id),
                image: config.media_url(&recipe.image),
                name: recipe.name,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect()
}

async fn render_one<C: ConnectionTrait>(
    conn: &C,
    config: &AppConfig,
    viewer: Option<Uuid>,
    recipe: RecipeModel,
) -> AppResult<Recipe> {
    render_recipes(conn, config, viewer, vec![recipe])
        .await?
        .pop()
        .ok_or(AppError::NotFound)
}

pub async fn find_recipe<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<RecipeModel> {
    Recipes::find_by_id(id).one(conn).await?.ok_or(AppError::NotFound)
}

fn relation_condition(
    filter: RelationFilter,
    recipe_ids: sea_orm::sea_query::SelectStatement,
) -> SimpleExpr {
    match filter {
        RelationFilter::Only => RecipeCol::Id.in_subquery(recipe_ids),
        RelationFilter::Exclude => RecipeCol::Id.not_in_subquery(recipe_ids),
    }
}

pub async fn list_recipes(
    state: &AppState,
    viewer: Option<Uuid>,
    pagination: Pagination,
    query: RecipeQuery,
) -> AppResult<ApiResponse<RecipeList>> {
    let (page, limit, offset) = pagination.normalize();
    let mut condition = Condition::all();

    if let Some(author) = query.author {
        condition = condition.add(RecipeCol::AuthorId.eq(author));
    }

    // Relation filters only make sense for a known viewer.
    if let Some(viewer) = viewer {
        if let Some(filter) = query.favorited() {
            let favorited = Query::select()
                .column(FavCol::RecipeId)
                .from(Favorites)
                .and_where(FavCol::UserId.eq(viewer))
                .to_owned();
            condition = condition.add(relation_condition(filter, favorited));
        }
        if let Some(filter) = query.in_shopping_cart() {
            let in_cart = Query::select()
                .column(CartCol::RecipeId)
                .from(ShoppingCarts)
                .and_where(CartCol::UserId.eq(viewer))
                .to_owned();
            condition = condition.add(relation_condition(filter, in_cart));
        }
    }

    let finder = Recipes::find()
        .filter(condition)
        .order_by_desc(RecipeCol::PubDate)
        .order_by_desc(RecipeCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = render_recipes(&state.orm, &state.config, viewer, models).await?;
    Ok(ApiResponse::page("Recipes", RecipeList { items }, page, limit, total))
}

pub async fn get_recipe(
    state: &AppState,
    viewer: Option<Uuid>,
    id: Uuid,
) -> AppResult<ApiResponse<Recipe>> {
    let model = find_recipe(&state.orm, id).await?;
    let recipe = render_one(&state.orm, &state.config, viewer, model).await?;
    Ok(ApiResponse::success("Recipe", recipe, Some(Meta::empty())))
}

/// Every referenced ingredient must exist.
async fn ensure_ingredients_exist<C: ConnectionTrait>(
    conn: &C,
    lines: &[IngredientAmount],
) -> AppResult<()> {
    let ids: Vec<Uuid> = lines.iter().map(|l| l.id).collect();
    let found: HashSet<Uuid> = Ingredients::find()
        .select_only()
        .column(IngredientCol::Id)
        .filter(IngredientCol::Id.is_in(ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect();

    if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
        return Err(AppError::bad_request(format!(
            "ingredient with id={missing} does not exist"
        )));
    }
    Ok(())
}

async fn write_lines<C: ConnectionTrait>(
    conn: &C,
    recipe_id: Uuid,
    lines: &[IngredientAmount],
) -> AppResult<()> {
    let actives = lines.iter().map(|line| LineActive {
        id: Set(Uuid::new_v4()),
        recipe_id: Set(recipe_id),
        ingredient_id: Set(line.id),
        amount: Set(line.amount),
    });
    RecipeIngredients::insert_many(actives).exec(conn).await?;
    Ok(())
}

pub async fn create_recipe(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    validate_recipe_name(&payload.name)?;
    validate_recipe_text(&payload.text)?;
    validate_cooking_time(payload.cooking_time)?;
    validate_ingredient_lines(&payload.ingredients)?;
    let image: DecodedImage = media::decode_data_uri(&payload.image)?;
    ensure_ingredients_exist(&state.orm, &payload.ingredients).await?;

    let stored = media::save_image(&state.config.media_root, RECIPE_IMAGE_DIR, &image).await?;

    let recipe_id = Uuid::new_v4();
    let insert = async {
        let txn = state.orm.begin().await?;
        let recipe = RecipeActive {
            id: Set(recipe_id),
            author_id: Set(user.user_id),
            name: Set(payload.name.trim().to_string()),
            image: Set(stored.clone()),
            text: Set(payload.text),
            cooking_time: Set(payload.cooking_time),
            pub_date: NotSet,
        }
        .insert(&txn)
        .await?;
        write_lines(&txn, recipe.id, &payload.ingredients).await?;
        txn.commit().await?;
        Ok::<_, AppError>(recipe)
    };

    let recipe = match insert.await {
        Ok(recipe) => recipe,
        Err(err) => {
            media::remove_file(&state.config.media_root, &stored).await;
            return Err(err);
        }
    };

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_create",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let rendered = render_one(&state.orm, &state.config, Some(user.user_id), recipe).await?;
    Ok(ApiResponse::success(
        "Recipe created",
        rendered,
        Some(Meta::empty()),
    ))
}

pub async fn update_recipe(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    let existing = find_recipe(&state.orm, id).await?;
    if existing.author_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let lines = payload
        .ingredients
        .ok_or_else(|| AppError::bad_request("ingredients: this field is required"))?;
    validate_ingredient_lines(&lines)?;
    if let Some(name) = payload.name.as_deref() {
        validate_recipe_name(name)?;
    }
    if let Some(text) = payload.text.as_deref() {
        validate_recipe_text(text)?;
    }
    if let Some(minutes) = payload.cooking_time {
        validate_cooking_time(minutes)?;
    }
    let image = payload
        .image
        .as_deref()
        .map(media::decode_data_uri)
        .transpose()?;
    ensure_ingredients_exist(&state.orm, &lines).await?;

    let new_image = match &image {
        Some(image) => {
            Some(media::save_image(&state.config.media_root, RECIPE_IMAGE_DIR, image).await?)
        }
        None => None,
    };
    let previous_image = existing.image.clone();

    let update = async {
        let txn = state.orm.begin().await?;
        let mut active: RecipeActive = existing.into();
        if let Some(name) = payload.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(text) = payload.text {
            active.text = Set(text);
        }
        if let Some(minutes) = payload.cooking_time {
            active.cooking_time = Set(minutes);
        }
        if let Some(path) = &new_image {
            active.image = Set(path.clone());
        }
        let recipe = active.update(&txn).await?;

        RecipeIngredients::delete_many()
            .filter(LineCol::RecipeId.eq(recipe.id))
            .exec(&txn)
            .await?;
        write_lines(&txn, recipe.id, &lines).await?;
        txn.commit().await?;
        Ok::<_, AppError>(recipe)
    };

    let recipe = match update.await {
        Ok(recipe) => recipe,
        Err(err) => {
            if let Some(path) = &new_image {
                media::remove_file(&state.config.media_root, path).await;
            }
            return Err(err);
        }
    };

    if new_image.is_some() {
        media::remove_file(&state.config.media_root, &previous_image).await;
    }

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_update",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let rendered = render_one(&state.orm, &state.config, Some(user.user_id), recipe).await?;
    Ok(ApiResponse::success("Updated", rendered, Some(Meta::empty())))
}

pub async fn delete_recipe(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let existing = find_recipe(&state.orm, id).await?;
    if existing.author_id != user.user_id {
        return Err(AppError::Forbidden);
    }

    let result = Recipes::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    media::remove_file(&state.config.media_root, &existing.image).await;

    audit::record(
        &state.pool,
        user.user_id,
        "recipe_delete",
        "recipes",
        serde_json::json!({ "recipe_id": id }),
    )
    .await;
    Ok(())
}
