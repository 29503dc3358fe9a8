use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        admin::{AdminRecipeList, AdminRecipeRow, CreateIngredientRequest},
        auth::{LoginRequest, LoginResponse},
        recipes::{
            CreateRecipeRequest, IngredientAmount, IngredientList, RecipeList, ShortLinkResponse,
            UpdateRecipeRequest,
        },
        users::{
            AvatarResponse, RegisterRequest, SetAvatarRequest, SetPasswordRequest,
            SubscriptionList, UserList,
        },
    },
    models::{Ingredient, Recipe, RecipeIngredient, RecipeMinified, User, UserWithRecipes},
    response::{ApiResponse, Meta},
    routes::{admin, auth, health, ingredients, params, recipes, short_links, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        users::register,
        users::list_users,
        users::get_user,
        users::me,
        users::set_avatar,
        users::delete_avatar,
        users::set_password,
        users::list_subscriptions,
        users::subscribe,
        users::unsubscribe,
        ingredients::list_ingredients,
        ingredients::get_ingredient,
        recipes::list_recipes,
        recipes::create_recipe,
        recipes::get_recipe,
        recipes::update_recipe,
        recipes::delete_recipe,
        recipes::add_favorite,
        recipes::remove_favorite,
        recipes::add_to_shopping_cart,
        recipes::remove_from_shopping_cart,
        recipes::download_shopping_cart,
        recipes::get_link,
        short_links::follow_short_link,
        admin::list_all_recipes,
        admin::create_ingredient,
        admin::delete_ingredient
    ),
    components(
        schemas(
            User,
            UserWithRecipes,
            Ingredient,
            RecipeIngredient,
            Recipe,
            RecipeMinified,
            LoginRequest,
            LoginResponse,
            RegisterRequest,
            SetPasswordRequest,
            SetAvatarRequest,
            AvatarResponse,
            UserList,
            SubscriptionList,
            IngredientAmount,
            CreateRecipeRequest,
            UpdateRecipeRequest,
            ShortLinkResponse,
            RecipeList,
            IngredientList,
            CreateIngredientRequest,
            AdminRecipeRow,
            AdminRecipeList,
            params::Pagination,
            params::RecipeQuery,
            params::RecipesLimitQuery,
            params::IngredientQuery,
            params::AdminRecipeQuery,
            Meta,
            ApiResponse<User>,
            ApiResponse<Recipe>,
            ApiResponse<RecipeList>,
            ApiResponse<UserList>,
            ApiResponse<SubscriptionList>,
            ApiResponse<AdminRecipeList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Token login and logout"),
        (name = "Users", description = "Registration, profiles and avatars"),
        (name = "Subscriptions", description = "Following other authors"),
        (name = "Ingredients", description = "Ingredient catalog"),
        (name = "Recipes", description = "Recipe endpoints"),
        (name = "Favorites", description = "Favorite endpoints"),
        (name = "Shopping cart", description = "Shopping cart and list download"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/token/login",
            "/api/users/{id}/subscribe",
            "/api/recipes/download_shopping_cart",
            "/api/recipes/{id}/get-link",
            "/s/{code}",
            "/api/admin/ingredients/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
