mod common;

use foodgram_api::{
    dto::recipes::{CreateRecipeRequest, IngredientAmount, UpdateRecipeRequest},
    entity::ingredients::ActiveModel as IngredientActive,
    error::AppError,
    routes::params::{IngredientQuery, Pagination, RecipeQuery},
    services::{cart_service, favorite_service, ingredient_service, recipe_service},
    state::AppState,
};
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use common::{PNG_DATA_URI, db_state, ingredient, register};

fn recipe_request(name: &str, lines: Vec<(Uuid, i32)>) -> CreateRecipeRequest {
    CreateRecipeRequest {
        ingredients: lines
            .into_iter()
            .map(|(id, amount)| IngredientAmount { id, amount })
            .collect(),
        image: PNG_DATA_URI.into(),
        name: name.into(),
        text: "Mix everything and bake.".into(),
        cooking_time: 25,
    }
}

async fn create(
    state: &AppState,
    author: &foodgram_api::middleware::auth::AuthUser,
    name: &str,
    lines: Vec<(Uuid, i32)>,
) -> anyhow::Result<Uuid> {
    let recipe = recipe_service::create_recipe(state, author, recipe_request(name, lines))
        .await?
        .into_data()
        .expect("created recipe");
    Ok(recipe.id)
}

#[tokio::test]
async fn create_update_and_delete_recipe() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let author = register(&state, "author").await?;
    let stranger = register(&state, "stranger").await?;
    let flour = ingredient(&state, "flour", "g").await?;
    let eggs = ingredient(&state, "eggs", "pcs").await?;

    let created = recipe_service::create_recipe(
        &state,
        &author,
        recipe_request("Pancakes", vec![(flour, 200), (eggs, 2)]),
    )
    .await?
    .into_data()
    .expect("recipe");
    assert_eq!(created.author.id, author.user_id);
    assert_eq!(created.ingredients.len(), 2);
    assert!(!created.is_favorited);
    assert!(created.image.starts_with("http://foodgram.test/media/recipes/images/"));

    // Duplicate ingredient lines are rejected before anything is written.
    let err = recipe_service::create_recipe(
        &state,
        &author,
        recipe_request("Broken", vec![(flour, 1), (flour, 2)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    // Unknown ingredient ids are a validation error too.
    let err = recipe_service::create_recipe(
        &state,
        &author,
        recipe_request("Ghost", vec![(Uuid::new_v4(), 1)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let update = UpdateRecipeRequest {
        ingredients: Some(vec![IngredientAmount { id: eggs, amount: 3 }]),
        image: None,
        name: Some("Omelette".into()),
        text: None,
        cooking_time: Some(10),
    };
    let err = recipe_service::update_recipe(&state, &stranger, created.id, update.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let updated = recipe_service::update_recipe(&state, &author, created.id, update)
        .await?
        .into_data()
        .expect("updated");
    assert_eq!(updated.name, "Omelette");
    assert_eq!(updated.cooking_time, 10);
    assert_eq!(updated.ingredients.len(), 1);
    assert_eq!(updated.ingredients[0].amount, 3);
    assert_eq!(updated.text, created.text);

    // Ingredients are mandatory on update.
    let err = recipe_service::update_recipe(
        &state,
        &author,
        created.id,
        UpdateRecipeRequest {
            ingredients: None,
            image: None,
            name: Some("No lines".into()),
            text: None,
            cooking_time: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = recipe_service::delete_recipe(&state, &stranger, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    recipe_service::delete_recipe(&state, &author, created.id).await?;
    let err = recipe_service::get_recipe(&state, None, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn favorites_and_cart_drive_list_flags_and_filters() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let author = register(&state, "chef").await?;
    let reader = register(&state, "reader").await?;
    let salt = ingredient(&state, "salt", "g").await?;

    let soup = create(&state, &author, "Soup", vec![(salt, 5)]).await?;
    let salad = create(&state, &author, "Salad", vec![(salt, 1)]).await?;

    let added = favorite_service::add_favorite(&state, &reader, soup)
        .await?
        .into_data()
        .expect("minified");
    assert_eq!(added.id, soup);

    let err = favorite_service::add_favorite(&state, &reader, soup)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    cart_service::add_to_cart(&state, &reader, salad).await?;
    let err = cart_service::add_to_cart(&state, &reader, salad)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let detail = recipe_service::get_recipe(&state, Some(reader.user_id), soup)
        .await?
        .into_data()
        .expect("detail");
    assert!(detail.is_favorited);
    assert!(!detail.is_in_shopping_cart);

    // Anonymous viewers never see flags set.
    let anonymous = recipe_service::get_recipe(&state, None, soup)
        .await?
        .into_data()
        .expect("detail");
    assert!(!anonymous.is_favorited);

    let favorites = recipe_service::list_recipes(
        &state,
        Some(reader.user_id),
        Pagination::new(1, 100),
        RecipeQuery {
            author: Some(author.user_id),
            is_favorited: Some("1".into()),
            is_in_shopping_cart: None,
        },
    )
    .await?
    .into_data()
    .expect("list");
    let ids: Vec<Uuid> = favorites.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![soup]);

    let not_in_cart = recipe_service::list_recipes(
        &state,
        Some(reader.user_id),
        Pagination::new(1, 100),
        RecipeQuery {
            author: Some(author.user_id),
            is_favorited: None,
            is_in_shopping_cart: Some("0".into()),
        },
    )
    .await?
    .into_data()
    .expect("list");
    let ids: Vec<Uuid> = not_in_cart.items.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![soup]);

    favorite_service::remove_favorite(&state, &reader, soup).await?;
    let err = favorite_service::remove_favorite(&state, &reader, soup)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    cart_service::remove_from_cart(&state, &reader, salad).await?;
    let err = cart_service::remove_from_cart(&state, &reader, salad)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = favorite_service::add_favorite(&state, &reader, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn shopping_list_sums_shared_ingredients() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let author = register(&state, "baker").await?;
    let shopper = register(&state, "shopper").await?;
    let flour = ingredient(&state, "flour", "g").await?;
    let milk = ingredient(&state, "milk", "ml").await?;

    let bread = create(&state, &author, "Bread", vec![(flour, 500)]).await?;
    let crepes = create(&state, &author, "Crepes", vec![(flour, 150), (milk, 300)]).await?;
    cart_service::add_to_cart(&state, &shopper, bread).await?;
    cart_service::add_to_cart(&state, &shopper, crepes).await?;

    let items = cart_service::shopping_list_items(&state.pool, shopper.user_id).await?;
    assert_eq!(items.len(), 2);
    let flour_line = items
        .iter()
        .find(|i| i.measurement_unit == "g")
        .expect("flour line");
    assert_eq!(flour_line.total_amount, 650);
    let milk_line = items
        .iter()
        .find(|i| i.measurement_unit == "ml")
        .expect("milk line");
    assert_eq!(milk_line.total_amount, 300);

    let text = cart_service::download_shopping_list(&state, &shopper).await?;
    assert!(text.starts_with("Shopping list for "));
    assert!(text.contains("(g) - 650"));
    assert!(text.contains("* Bread (by baker_"));
    assert!(text.contains("* Crepes (by baker_"));

    // An empty cart still renders the headings.
    let text = cart_service::download_shopping_list(&state, &author).await?;
    assert!(text.contains("Ingredients:"));
    assert!(text.contains("Recipes:"));

    Ok(())
}

#[tokio::test]
async fn ingredient_prefix_treats_wildcards_literally() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let tag = &Uuid::new_v4().simple().to_string()[..10];
    for name in [format!("{tag}_x"), format!("{tag}yx")] {
        IngredientActive {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            measurement_unit: Set("g".into()),
        }
        .insert(&state.orm)
        .await?;
    }

    let names = |prefix: String| {
        let state = state.clone();
        async move {
            let list = ingredient_service::list_ingredients(
                &state,
                IngredientQuery { name: Some(prefix) },
            )
            .await?
            .into_data()
            .expect("ingredients");
            anyhow::Ok(list.items.into_iter().map(|i| i.name).collect::<Vec<_>>())
        }
    };

    assert_eq!(names(tag.to_string()).await?.len(), 2);
    assert_eq!(names(format!("{tag}_")).await?, vec![format!("{tag}_x")]);
    assert!(names(format!("{tag}%")).await?.is_empty());

    Ok(())
}
