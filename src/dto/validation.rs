//! Validation helpers for DTOs.

use validator::ValidationError;

/// Shortest accepted game name, counted in characters after trimming.
pub const MIN_GAME_NAME_LEN: usize = 3;

/// Validates that a game name has at least [`MIN_GAME_NAME_LEN`] non-whitespace-bounded characters.
///
/// # Examples
///
/// ```ignore
/// validate_game_name("Heist")  // Ok
/// validate_game_name("  ab  ") // Err - too short once trimmed
/// ```
pub fn validate_game_name(name: &str) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length < MIN_GAME_NAME_LEN {
        let mut err = ValidationError::new("game_name_length");
        err.message = Some(
            format!("Game name must be at least {MIN_GAME_NAME_LEN} characters (got {length})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

/// Validates that a text field contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }

    Ok(())
}
