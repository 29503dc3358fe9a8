use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    dto::recipes::ShortLinkResponse,
    entity::{
        ShortLinks,
        short_links::{ActiveModel as ShortLinkActive, Column as LinkCol, Model as ShortLinkModel},
    },
    error::{AppError, AppResult},
    response::{ApiResponse, Meta},
    services::recipe_service::find_recipe,
    state::AppState,
};

pub const SHORT_CODE_LEN: usize = 6;
const MAX_ATTEMPTS: usize = 10;

pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

async fn link_for_recipe(state: &AppState, recipe_id: Uuid) -> AppResult<Option<ShortLinkModel>> {
    Ok(ShortLinks::find()
        .filter(LinkCol::RecipeId.eq(recipe_id))
        .one(&state.orm)
        .await?)
}

/// Returns the recipe's code, creating it on first use.
pub async fn ensure_short_code(state: &AppState, recipe_id: Uuid) -> AppResult<String> {
    let recipe = find_recipe(&state.orm, recipe_id).await?;
    if let Some(link) = link_for_recipe(state, recipe.id).await? {
        return Ok(link.short_code);
    }

    for attempt in 1..=MAX_ATTEMPTS {
        let code = generate_code();
        let taken = ShortLinks::find()
            .filter(LinkCol::ShortCode.eq(code.as_str()))
            .count(&state.orm)
            .await?;
        if taken > 0 {
            tracing::debug!(attempt, "short code collision");
            continue;
        }

        let inserted = ShortLinkActive {
            id: Set(Uuid::new_v4()),
            recipe_id: Set(recipe.id),
            short_code: Set(code),
            created_at: NotSet,
        }
        .insert(&state.orm)
        .await;

        match inserted {
            Ok(link) => return Ok(link.short_code),
            Err(err) => {
                // Either a concurrent request linked this recipe first, or the code
                // was taken between the check and the insert.
                if let Some(link) = link_for_recipe(state, recipe.id).await? {
                    return Ok(link.short_code);
                }
                tracing::debug!(attempt, error = %err, "short link insert failed, retrying");
            }
        }
    }

    Err(AppError::Internal(anyhow::anyhow!(
        "could not allocate a short code after {MAX_ATTEMPTS} attempts"
    )))
}

pub async fn get_link(state: &AppState, recipe_id: Uuid) -> AppResult<ApiResponse<ShortLinkResponse>> {
    let code = ensure_short_code(state, recipe_id).await?;
    Ok(ApiResponse::success(
        "Short link",
        ShortLinkResponse {
            short_link: state.config.short_link_url(&code),
        },
        Some(Meta::empty()),
    ))
}

/// Recipe id behind a short code.
pub async fn resolve(state: &AppState, code: &str) -> AppResult<Uuid> {
    ShortLinks::find()
        .filter(LinkCol::ShortCode.eq(code))
        .one(&state.orm)
        .await?
        .map(|link| link.recipe_id)
        .ok_or(AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_fixed_length_alphanumeric() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), SHORT_CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}
