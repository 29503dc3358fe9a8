mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use foodgram_api::{
    dto::{
        admin::CreateIngredientRequest,
        auth::LoginRequest,
        recipes::{CreateRecipeRequest, IngredientAmount},
        users::{RegisterRequest, SetAvatarRequest, SetPasswordRequest},
    },
    entity::{AuditLogs, Users, audit_logs::Column as AuditCol},
    error::AppError,
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_USER},
    response::Meta,
    routes::{
        create_app,
        params::{AdminRecipeQuery, Pagination},
    },
    services::{
        admin_service, auth_service, recipe_service, short_link_service, subscription_service,
        user_service,
    },
    state::AppState,
};
use http_body_util::BodyExt;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tower::ServiceExt;
use uuid::Uuid;

use common::{PNG_DATA_URI, db_state, ingredient, register};

async fn publish(state: &AppState, author: &AuthUser, name: &str) -> anyhow::Result<Uuid> {
    let salt = ingredient(state, "salt", "g").await?;
    let recipe = recipe_service::create_recipe(
        state,
        author,
        CreateRecipeRequest {
            ingredients: vec![IngredientAmount { id: salt, amount: 1 }],
            image: PNG_DATA_URI.into(),
            name: name.into(),
            text: "Season to taste.".into(),
            cooking_time: 5,
        },
    )
    .await?
    .into_data()
    .expect("recipe");
    Ok(recipe.id)
}

#[tokio::test]
async fn subscription_rules() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let follower = register(&state, "follower").await?;
    let author = register(&state, "writer").await?;
    for name in ["First", "Second", "Third"] {
        publish(&state, &author, name).await?;
    }

    let err = subscription_service::subscribe(&state, &follower, follower.user_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let subscribed = subscription_service::subscribe(&state, &follower, author.user_id, Some(2))
        .await?
        .into_data()
        .expect("author");
    assert!(subscribed.user.is_subscribed);
    assert_eq!(subscribed.recipes.len(), 2);
    assert_eq!(subscribed.recipes_count, 3);

    let trail = AuditLogs::find()
        .filter(AuditCol::UserId.eq(follower.user_id))
        .filter(AuditCol::Action.eq("subscribe"))
        .count(&state.orm)
        .await?;
    assert_eq!(trail, 1);

    let err = subscription_service::subscribe(&state, &follower, author.user_id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let list = subscription_service::list_subscriptions(&state, &follower, Pagination::new(1, 10), Some(1))
        .await?
        .into_data()
        .expect("subscriptions");
    assert_eq!(list.items.len(), 1);
    assert_eq!(list.items[0].user.id, author.user_id);
    assert_eq!(list.items[0].recipes.len(), 1);

    let profile = user_service::get_user(&state, Some(follower.user_id), author.user_id)
        .await?
        .into_data()
        .expect("profile");
    assert!(profile.is_subscribed);

    subscription_service::unsubscribe(&state, &follower, author.user_id).await?;
    let err = subscription_service::unsubscribe(&state, &follower, author.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = subscription_service::subscribe(&state, &follower, Uuid::new_v4(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn short_links_are_stable_and_redirect() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let author = register(&state, "linker").await?;
    let recipe_id = publish(&state, &author, "Linked").await?;

    let first = short_link_service::ensure_short_code(&state, recipe_id).await?;
    let second = short_link_service::ensure_short_code(&state, recipe_id).await?;
    assert_eq!(first, second);
    assert_eq!(short_link_service::resolve(&state, &first).await?, recipe_id);

    let link = short_link_service::get_link(&state, recipe_id)
        .await?
        .into_data()
        .expect("link");
    assert_eq!(link.short_link, format!("http://foodgram.test/s/{first}"));

    let app = create_app(state.clone());
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/s/{first}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        &format!("http://foodgram.test/recipes/{recipe_id}")
    );

    let err = short_link_service::resolve(&state, "nope00").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

#[tokio::test]
async fn token_login_and_logout_over_http() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let username = format!("login_{}", &Uuid::new_v4().simple().to_string()[..12]);
    let email = format!("{username}@example.com");
    auth_service::register_user(
        &state,
        RegisterRequest {
            email: email.clone(),
            username: username.clone(),
            first_name: "Log".into(),
            last_name: "In".into(),
            password: "s3cure-pass".into(),
        },
    )
    .await?;

    let err = auth_service::register_user(
        &state,
        RegisterRequest {
            email: email.clone(),
            username: format!("{username}x"),
            first_name: "Log".into(),
            last_name: "In".into(),
            password: "s3cure-pass".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let app = create_app(state.clone());
    let login = Request::builder()
        .method("POST")
        .uri("/api/auth/token/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::json!({ "email": email, "password": "s3cure-pass" }).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body)?;
    let token = json["data"]["auth_token"].as_str().expect("token").to_string();

    let me = |token: &str| {
        Request::builder()
            .uri("/api/users/me")
            .header(header::AUTHORIZATION, format!("Token {token}"))
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(me(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let logout = Request::builder()
        .method("POST")
        .uri("/api/auth/token/logout")
        .header(header::AUTHORIZATION, format!("Token {token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(logout).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(me(&token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let err = auth_service::login_user(
        &state,
        LoginRequest {
            email,
            password: "wrong-pass".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn admin_manages_ingredients_and_searches_recipes() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let regular = register(&state, "regular").await?;
    let admin = AuthUser::new(register(&state, "boss").await?.user_id, ROLE_ADMIN);
    let marker = Uuid::new_v4().simple().to_string();
    publish(&state, &regular, &format!("Stew {marker}")).await?;

    let request = || CreateIngredientRequest {
        name: format!("saffron {marker}"),
        measurement_unit: "g".into(),
    };

    let err = admin_service::create_ingredient(&state, &regular, request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let created = admin_service::create_ingredient(&state, &admin, request())
        .await?
        .into_data()
        .expect("ingredient");
    let err = admin_service::create_ingredient(&state, &admin, request())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let found = admin_service::list_recipes(
        &state,
        &admin,
        Pagination::new(1, 10),
        AdminRecipeQuery {
            q: Some(marker.to_uppercase()),
        },
    )
    .await?;
    assert_eq!(found.meta.as_ref().and_then(|m| m.total), Some(1));
    let rows = found.into_data().expect("rows").items;
    assert_eq!(rows[0].favorites_count, 0);

    admin_service::delete_ingredient(&state, &admin, created.id).await?;
    let err = admin_service::delete_ingredient(&state, &admin, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound));

    Ok(())
}

async fn stored_avatar(state: &AppState, user: &AuthUser) -> anyhow::Result<Option<String>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .expect("user row");
    Ok(model.avatar)
}

#[tokio::test]
async fn avatar_replace_and_delete_clean_up_files() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let user = register(&state, "avatar").await?;
    let on_disk = |rel: &str| std::path::Path::new(&state.config.media_root).join(rel);

    for avatar in [None, Some(String::new())] {
        let err = user_service::set_avatar(&state, &user, SetAvatarRequest { avatar })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    let set = || SetAvatarRequest {
        avatar: Some(PNG_DATA_URI.into()),
    };
    let first = user_service::set_avatar(&state, &user, set())
        .await?
        .into_data()
        .expect("avatar");
    let first_path = stored_avatar(&state, &user).await?.expect("avatar path");
    assert!(first.avatar.ends_with(&first_path));
    assert!(on_disk(&first_path).exists());

    user_service::set_avatar(&state, &user, set()).await?;
    let second_path = stored_avatar(&state, &user).await?.expect("avatar path");
    assert_ne!(first_path, second_path);
    assert!(!on_disk(&first_path).exists());
    assert!(on_disk(&second_path).exists());

    user_service::delete_avatar(&state, &user).await?;
    assert_eq!(stored_avatar(&state, &user).await?, None);
    assert!(!on_disk(&second_path).exists());
    let me = user_service::me(&state, &user).await?.into_data().expect("me");
    assert_eq!(me.avatar, None);

    Ok(())
}

#[tokio::test]
async fn password_change_requires_current_password() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let user = register(&state, "passwd").await?;
    let me = user_service::me(&state, &user).await?;
    assert_eq!(me.meta, Some(Meta::empty()));
    let email = me.into_data().expect("me").email;

    let err = user_service::set_password(
        &state,
        &user,
        SetPasswordRequest {
            current_password: "not-my-pass".into(),
            new_password: "fresh-pass-42".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    user_service::set_password(
        &state,
        &user,
        SetPasswordRequest {
            current_password: "s3cure-pass".into(),
            new_password: "fresh-pass-42".into(),
        },
    )
    .await?;

    let login = |password: &str| LoginRequest {
        email: email.clone(),
        password: password.into(),
    };
    let token = auth_service::login_user(&state, login("fresh-pass-42"))
        .await?
        .into_data()
        .expect("token")
        .auth_token;
    assert!(!token.is_empty());
    let err = auth_service::login_user(&state, login("s3cure-pass"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    Ok(())
}

#[tokio::test]
async fn user_list_marks_followed_authors() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let viewer = register(&state, "viewer").await?;
    let followed = register(&state, "followed").await?;
    let other = register(&state, "other").await?;
    subscription_service::subscribe(&state, &viewer, followed.user_id, None).await?;

    let mut flags = std::collections::HashMap::new();
    let mut page = 1;
    loop {
        let resp =
            user_service::list_users(&state, Some(viewer.user_id), Pagination::new(page, 100))
                .await?;
        let total_pages = resp.meta.as_ref().and_then(|m| m.total_pages).unwrap_or(1);
        for user in resp.into_data().expect("users").items {
            flags.insert(user.id, user.is_subscribed);
        }
        if page >= total_pages {
            break;
        }
        page += 1;
    }

    assert_eq!(flags.get(&followed.user_id), Some(&true));
    assert_eq!(flags.get(&other.user_id), Some(&false));
    assert_eq!(flags.get(&viewer.user_id), Some(&false));

    let anonymous = user_service::list_users(&state, None, Pagination::new(1, 100))
        .await?
        .into_data()
        .expect("users");
    assert!(anonymous.items.iter().all(|u| !u.is_subscribed));

    Ok(())
}

#[tokio::test]
async fn role_changes_apply_to_existing_tokens() -> anyhow::Result<()> {
    let Some(state) = db_state().await? else {
        return Ok(());
    };
    let user = register(&state, "promoted").await?;
    let email = user_service::me(&state, &user)
        .await?
        .into_data()
        .expect("me")
        .email;
    let token = auth_service::login_user(
        &state,
        LoginRequest {
            email,
            password: "s3cure-pass".into(),
        },
    )
    .await?
    .into_data()
    .expect("token")
    .auth_token;

    let app = create_app(state.clone());
    let delete_missing = || {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/admin/ingredients/{}", Uuid::new_v4()))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };
    let set_role = |role: &'static str| {
        sqlx::query("UPDATE users SET role = $1 WHERE id = $2")
            .bind(role)
            .bind(user.user_id)
            .execute(&state.pool)
    };

    let response = app.clone().oneshot(delete_missing()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    set_role(ROLE_ADMIN).await?;
    let response = app.clone().oneshot(delete_missing()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    set_role(ROLE_USER).await?;
    let response = app.oneshot(delete_missing()).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    Ok(())
}
