pub mod audit_logs;
pub mod favorites;
pub mod ingredients;
pub mod recipe_ingredients;
pub mod recipes;
pub mod revoked_tokens;
pub mod shopping_carts;
pub mod short_links;
pub mod subscriptions;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use favorites::Entity as Favorites;
pub use ingredients::Entity as Ingredients;
pub use recipe_ingredients::Entity as RecipeIngredients;
pub use recipes::Entity as Recipes;
pub use revoked_tokens::Entity as RevokedTokens;
pub use shopping_carts::Entity as ShoppingCarts;
pub use short_links::Entity as ShortLinks;
pub use subscriptions::Entity as Subscriptions;
pub use users::Entity as Users;
