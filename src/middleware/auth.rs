use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sea_orm::{EntityTrait, QuerySelect};
use uuid::Uuid;

use crate::{
    dto::auth::Claims,
    entity::{RevokedTokens, Users, users::Column as UserCol},
    error::AppError,
    state::AppState,
};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl AuthUser {
    /// Builds an identity without a token, for calling services directly.
    pub fn new(user_id: Uuid, role: &str) -> Self {
        Self {
            user_id,
            role: role.to_string(),
            token_id: Uuid::nil(),
            expires_at: Utc::now(),
        }
    }
}

/// Caller identity on endpoints that also serve anonymous readers.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|u| u.user_id)
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

/// Accepts both `Bearer <jwt>` and the `Token <jwt>` scheme older clients send.
fn extract_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthorized)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .or_else(|| auth_str.strip_prefix("Token "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;
    Ok(Some(token))
}

pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

async fn authenticate(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = decode_claims(token, &state.config.jwt_secret)?;

    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    let token_id = Uuid::parse_str(&claims.jti).map_err(|_| AppError::Unauthorized)?;
    let expires_at = i64::try_from(claims.exp)
        .ok()
        .and_then(|exp| DateTime::<Utc>::from_timestamp(exp, 0))
        .ok_or(AppError::Unauthorized)?;

    let revoked = RevokedTokens::find_by_id(token_id).one(&state.orm).await?;
    if revoked.is_some() {
        return Err(AppError::Unauthorized);
    }

    // The stored role wins over the claim so promotions and demotions apply to live tokens.
    let role = Users::find_by_id(user_id)
        .select_only()
        .column(UserCol::Role)
        .into_tuple::<String>()
        .one(&state.orm)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id,
        role,
        token_id,
        expires_at,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts)?.ok_or(AppError::Unauthorized)?;
        authenticate(token, state).await
    }
}

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match extract_token(parts)? {
            Some(token) => Ok(MaybeAuthUser(Some(authenticate(token, state).await?))),
            None => Ok(MaybeAuthUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/users/me");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn token_schemes() {
        assert_eq!(extract_token(&parts_with(None)).unwrap(), None);
        assert_eq!(
            extract_token(&parts_with(Some("Bearer abc"))).unwrap(),
            Some("abc")
        );
        assert_eq!(
            extract_token(&parts_with(Some("Token abc"))).unwrap(),
            Some("abc")
        );
        assert!(extract_token(&parts_with(Some("Basic abc"))).is_err());
        assert!(extract_token(&parts_with(Some("Bearer "))).is_err());
    }

    #[test]
    fn decode_claims_checks_signature() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            role: ROLE_USER.into(),
            jti: Uuid::new_v4().to_string(),
            exp: (Utc::now().timestamp() + 3600) as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"right"),
        )
        .unwrap();

        assert_eq!(decode_claims(&token, "right").unwrap().sub, claims.sub);
        assert!(matches!(
            decode_claims(&token, "wrong"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn admin_guard() {
        let admin = AuthUser::new(Uuid::new_v4(), ROLE_ADMIN);
        let user = AuthUser::new(Uuid::new_v4(), ROLE_USER);
        assert!(ensure_admin(&admin).is_ok());
        assert!(matches!(ensure_admin(&user), Err(AppError::Forbidden)));
    }
}
