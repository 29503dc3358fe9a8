use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct AdminRecipeRow {
    pub id: Uuid,
    pub name: String,
    pub author_username: String,
    pub author_email: String,
    pub cooking_time: i32,
    pub pub_date: chrono::DateTime<chrono::Utc>,
    pub favorites_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct AdminRecipeList {
    #[schema(value_type = Vec<AdminRecipeRow>)]
    pub items: Vec<AdminRecipeRow>,
}
