use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

pub const DEFAULT_PER_PAGE: i64 = 6;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct Pagination {
    pub page: Option<i64>,
    #[serde(alias = "limit")]
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
        }
    }

    /// Returns `(page, per_page, offset)`.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

/// Three-state filter on a per-viewer relation (`1` keep, `0` exclude).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationFilter {
    Only,
    Exclude,
}

impl RelationFilter {
    /// Anything other than `0` or `1` disables the filter.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            Some("1") => Some(RelationFilter::Only),
            Some("0") => Some(RelationFilter::Exclude),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipeQuery {
    pub author: Option<Uuid>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

impl RecipeQuery {
    pub fn favorited(&self) -> Option<RelationFilter> {
        RelationFilter::parse(self.is_favorited.as_deref())
    }

    pub fn in_shopping_cart(&self) -> Option<RelationFilter> {
        RelationFilter::parse(self.is_in_shopping_cart.as_deref())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipesLimitQuery {
    pub recipes_limit: Option<String>,
}

impl RecipesLimitQuery {
    pub fn limit(&self) -> Option<u64> {
        self.recipes_limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IngredientQuery {
    /// Case-sensitive name prefix.
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminRecipeQuery {
    pub q: Option<String>,
}
