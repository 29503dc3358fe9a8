use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::{
    dto::recipes::IngredientAmount,
    error::{AppError, AppResult},
};

pub const EMAIL_MAX_LEN: usize = 254;
pub const NAME_MAX_LEN: usize = 150;
pub const RECIPE_NAME_MAX_LEN: usize = 256;
pub const INGREDIENT_NAME_MAX_LEN: usize = 128;
pub const MEASUREMENT_UNIT_MAX_LEN: usize = 64;
pub const PASSWORD_MIN_LEN: usize = 8;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

pub fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() || username.chars().count() > NAME_MAX_LEN {
        return Err(AppError::bad_request(format!(
            "username must be 1 to {NAME_MAX_LEN} characters"
        )));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::bad_request(
            "username may only contain letters, digits and @/./+/-/_",
        ));
    }
    if username.eq_ignore_ascii_case("me") {
        return Err(AppError::bad_request("username 'me' is reserved"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if email.chars().count() > EMAIL_MAX_LEN || !EMAIL_RE.is_match(email) {
        return Err(AppError::bad_request("enter a valid email address"));
    }
    Ok(())
}

pub fn validate_person_name(field: &str, value: &str) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len == 0 || len > NAME_MAX_LEN {
        return Err(AppError::bad_request(format!(
            "{field} must be 1 to {NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AppError::bad_request(format!(
            "password must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::bad_request("password cannot be entirely numeric"));
    }
    Ok(())
}

pub fn validate_cooking_time(minutes: i32) -> AppResult<()> {
    if minutes < 1 {
        return Err(AppError::bad_request(
            "cooking_time must be at least 1 minute",
        ));
    }
    Ok(())
}

pub fn validate_recipe_name(name: &str) -> AppResult<()> {
    let len = name.trim().chars().count();
    if len == 0 || len > RECIPE_NAME_MAX_LEN {
        return Err(AppError::bad_request(format!(
            "name must be 1 to {RECIPE_NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_recipe_text(text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::bad_request("text must not be empty"));
    }
    Ok(())
}

/// Checks shape only; existence of each ingredient is checked against the database.
pub fn validate_ingredient_lines(lines: &[IngredientAmount]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::bad_request("add at least one ingredient"));
    }

    let mut seen = HashSet::with_capacity(lines.len());
    let mut duplicates = Vec::new();
    for line in lines {
        if line.amount < 1 {
            return Err(AppError::bad_request(format!(
                "amount for ingredient {} must be at least 1",
                line.id
            )));
        }
        if !seen.insert(line.id) && !duplicates.contains(&line.id) {
            duplicates.push(line.id);
        }
    }

    if !duplicates.is_empty() {
        let ids = duplicates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(AppError::bad_request(format!(
            "ingredients must not repeat, duplicates: {ids}"
        )));
    }
    Ok(())
}

pub fn validate_ingredient_fields(name: &str, measurement_unit: &str) -> AppResult<()> {
    let name_len = name.trim().chars().count();
    if name_len == 0 || name_len > INGREDIENT_NAME_MAX_LEN {
        return Err(AppError::bad_request(format!(
            "name must be 1 to {INGREDIENT_NAME_MAX_LEN} characters"
        )));
    }
    let unit_len = measurement_unit.trim().chars().count();
    if unit_len == 0 || unit_len > MEASUREMENT_UNIT_MAX_LEN {
        return Err(AppError::bad_request(format!(
            "measurement_unit must be 1 to {MEASUREMENT_UNIT_MAX_LEN} characters"
        )));
    }
    Ok(())
}
