use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set,
    sea_query::OnConflict,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit,
    config::AppConfig,
    dto::auth::{Claims, LoginRequest, LoginResponse},
    dto::users::RegisterRequest,
    entity::{
        RevokedTokens, Users,
        revoked_tokens::{ActiveModel as RevokedActive, Column as RevokedCol},
        users::{ActiveModel as UserActive, Column as UserCol, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_USER},
    models::User,
    response::{ApiResponse, Meta},
    services::user_service::{hash_password, user_from_entity, verify_password},
    state::AppState,
    validation::{validate_email, validate_password, validate_person_name, validate_username},
};

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        username,
        first_name,
        last_name,
        password,
    } = payload;

    validate_email(&email)?;
    validate_username(&username)?;
    validate_person_name("first_name", &first_name)?;
    validate_person_name("last_name", &last_name)?;
    validate_password(&password)?;

    let clashes = Users::find()
        .filter(
            Condition::any()
                .add(UserCol::Email.eq(email.as_str()))
                .add(UserCol::Username.eq(username.as_str())),
        )
        .all(&state.orm)
        .await?;
    if clashes.iter().any(|u| u.email == email) {
        return Err(AppError::bad_request("A user with this email already exists"));
    }
    if clashes.iter().any(|u| u.username == username) {
        return Err(AppError::bad_request("A user with this username already exists"));
    }

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        username: Set(username),
        first_name: Set(first_name),
        last_name: Set(last_name),
        avatar: Set(None),
        password_hash: Set(hash_password(&password)?),
        role: Set(ROLE_USER.to_string()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "User created",
        user_from_entity(&state.config, user, false),
        Some(Meta::empty()),
    ))
}

pub fn issue_token(config: &AppConfig, user: &UserModel) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(config.jwt_ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user.id.to_string(),
        role: user.role.clone(),
        jti: Uuid::new_v4().to_string(),
        exp: usize::try_from(expiration.timestamp())
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let user = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::bad_request("Unable to log in with provided credentials")),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::bad_request("Unable to log in with provided credentials"));
    }

    let auth_token = issue_token(&state.config, &user)?;

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse { auth_token },
        Some(Meta::empty()),
    ))
}

/// Revokes the presented token until its natural expiry.
pub async fn logout_user(state: &AppState, user: &AuthUser) -> AppResult<()> {
    RevokedTokens::insert(RevokedActive {
        jti: Set(user.token_id),
        expires_at: Set(user.expires_at.into()),
    })
    .on_conflict(OnConflict::column(RevokedCol::Jti).do_nothing().to_owned())
    .do_nothing()
    .exec(&state.orm)
    .await?;

    // Expired entries can no longer authenticate anything.
    RevokedTokens::delete_many()
        .filter(RevokedCol::ExpiresAt.lt(Utc::now()))
        .exec(&state.orm)
        .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "user_logout",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;
    Ok(())
}
