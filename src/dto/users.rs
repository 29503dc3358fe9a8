use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Deserialize, Debug, Clone, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SetAvatarRequest {
    /// `data:image/<ext>;base64,<payload>`
    pub avatar: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct AvatarResponse {
    pub avatar: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<crate::models::User>)]
    pub items: Vec<crate::models::User>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SubscriptionList {
    #[schema(value_type = Vec<crate::models::UserWithRecipes>)]
    pub items: Vec<crate::models::UserWithRecipes>,
}
