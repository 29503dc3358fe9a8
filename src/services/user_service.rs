use std::collections::HashSet;

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use password_hash::rand_core::OsRng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::users::{AvatarResponse, SetAvatarRequest, SetPasswordRequest, UserList},
    entity::{
        Subscriptions, Users,
        subscriptions::Column as SubCol,
        users::{ActiveModel as UserActive, Column as UserCol, Model as UserModel},
    },
    error::{AppError, AppResult},
    media::{self, AVATAR_DIR},
    middleware::auth::AuthUser,
    models::User,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
    validation::validate_password,
};

pub fn user_from_entity(config: &AppConfig, model: UserModel, is_subscribed: bool) -> User {
    User {
        id: model.id,
        email: model.email,
        username: model.username,
        first_name: model.first_name,
        last_name: model.last_name,
        is_subscribed,
        avatar: model.avatar.as_deref().map(|path| config.media_url(path)),
    }
}

/// Which of `author_ids` the viewer follows, in one query.
pub async fn subscribed_author_ids<C: ConnectionTrait>(
    conn: &C,
    viewer: Option<Uuid>,
    author_ids: &[Uuid],
) -> AppResult<HashSet<Uuid>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let ids = Subscriptions::find()
        .select_only()
        .column(SubCol::AuthorId)
        .filter(SubCol::UserId.eq(viewer))
        .filter(SubCol::AuthorId.is_in(author_ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(ids.into_iter().collect())
}

pub async fn find_user<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<UserModel> {
    Users::find_by_id(id).one(conn).await?.ok_or(AppError::NotFound)
}

pub async fn list_users(
    state: &AppState,
    viewer: Option<Uuid>,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Users::find().order_by_asc(UserCol::Email);
    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = models.iter().map(|u| u.id).collect();
    let subscribed = subscribed_author_ids(&state.orm, viewer, &ids).await?;

    let items = models
        .into_iter()
        .map(|model| {
            let is_subscribed = subscribed.contains(&model.id);
            user_from_entity(&state.config, model, is_subscribed)
        })
        .collect();

    Ok(ApiResponse::page("Users", UserList { items }, page, limit, total))
}

pub async fn get_user(
    state: &AppState,
    viewer: Option<Uuid>,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    let model = find_user(&state.orm, id).await?;
    let subscribed = subscribed_author_ids(&state.orm, viewer, &[model.id]).await?;
    let is_subscribed = subscribed.contains(&model.id);
    Ok(ApiResponse::success(
        "User",
        user_from_entity(&state.config, model, is_subscribed),
        Some(Meta::empty()),
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    // Deleted accounts keep valid tokens until expiry.
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(ApiResponse::success(
        "Current user",
        user_from_entity(&state.config, model, false),
        Some(Meta::empty()),
    ))
}

pub async fn set_avatar(
    state: &AppState,
    user: &AuthUser,
    payload: SetAvatarRequest,
) -> AppResult<ApiResponse<AvatarResponse>> {
    let raw = payload
        .avatar
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| AppError::bad_request("avatar: this field is required"))?;
    let image = media::decode_data_uri(&raw)?;

    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let previous = existing.avatar.clone();

    let stored = media::save_image(&state.config.media_root, AVATAR_DIR, &image).await?;
    let mut active: UserActive = existing.into();
    active.avatar = Set(Some(stored.clone()));
    if let Err(err) = active.update(&state.orm).await {
        media::remove_file(&state.config.media_root, &stored).await;
        return Err(err.into());
    }

    if let Some(old) = previous {
        media::remove_file(&state.config.media_root, &old).await;
    }

    audit::record(
        &state.pool,
        user.user_id,
        "avatar_set",
        "users",
        serde_json::json!({ "avatar": stored }),
    )
    .await;

    Ok(ApiResponse::success(
        "Avatar updated",
        AvatarResponse {
            avatar: state.config.media_url(&stored),
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_avatar(state: &AppState, user: &AuthUser) -> AppResult<()> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let Some(previous) = existing.avatar.clone() else {
        return Ok(());
    };

    let mut active: UserActive = existing.into();
    active.avatar = Set(None);
    active.update(&state.orm).await?;
    media::remove_file(&state.config.media_root, &previous).await;

    audit::record(
        &state.pool,
        user.user_id,
        "avatar_delete",
        "users",
        serde_json::json!({}),
    )
    .await;
    Ok(())
}

pub async fn set_password(
    state: &AppState,
    user: &AuthUser,
    payload: SetPasswordRequest,
) -> AppResult<()> {
    let existing = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&payload.current_password, &existing.password_hash)? {
        return Err(AppError::bad_request("current_password is incorrect"));
    }
    validate_password(&payload.new_password)?;

    let mut active: UserActive = existing.into();
    active.password_hash = Set(hash_password(&payload.new_password)?);
    active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "password_change",
        "users",
        serde_json::json!({}),
    )
    .await;
    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("pea-soup-42").unwrap();
        assert!(verify_password("pea-soup-42", &hash).unwrap());
        assert!(!verify_password("pea-soup-43", &hash).unwrap());
    }

    #[test]
    fn avatar_is_rendered_as_absolute_url() {
        let config = AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "s".into(),
            jwt_ttl_hours: 24,
            base_url: "http://localhost:3000".into(),
            media_root: "media".into(),
        };
        let model = UserModel {
            id: Uuid::new_v4(),
            email: "cook@example.com".into(),
            username: "cook".into(),
            first_name: "Ada".into(),
            last_name: "Cook".into(),
            avatar: Some("users/avatars/x.png".into()),
            password_hash: String::new(),
            role: "user".into(),
            created_at: chrono::Utc::now().into(),
        };
        let user = user_from_entity(&config, model, true);
        assert_eq!(
            user.avatar.as_deref(),
            Some("http://localhost:3000/media/users/avatars/x.png")
        );
        assert!(user.is_subscribed);
    }
}
