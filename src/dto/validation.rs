//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest player or server name accepted from the host.
const MAX_NAME_LENGTH: usize = 128;

/// Validates that a player id is set (the host uses `0` for "no player").
pub fn validate_player_id(id: u64) -> Result<(), ValidationError> {
    if id == 0 {
        let mut err = ValidationError::new("player_id_zero");
        err.message = Some("Player ID must be non-zero".into());
        return Err(err);
    }
    Ok(())
}

/// Validates that a display name holds between 1 and 128 characters.
///
/// # Examples
///
/// ```ignore
/// validate_display_name("alice")   // Ok
/// validate_display_name("")        // Err - empty
/// ```
pub fn validate_display_name(name: &str) -> Result<(), ValidationError> {
    let length = name.chars().count();
    if length == 0 || length > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("name_length");
        err.message = Some(
            format!("Name must hold between 1 and {MAX_NAME_LENGTH} characters (got {length})")
                .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Validates that a chat command name is a single non-empty word.
pub fn validate_command_name(command: &str) -> Result<(), ValidationError> {
    if command.is_empty() || command.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("command_format");
        err.message = Some("Command must be a single non-empty word".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_player_id() {
        assert!(validate_player_id(76561198000000001).is_ok());
        assert!(validate_player_id(u64::MAX).is_ok());
        assert!(validate_player_id(0).is_err());
    }

    #[test]
    fn test_validate_display_name() {
        assert!(validate_display_name("alice").is_ok());
        assert!(validate_display_name("ß").is_ok()); // one char, two bytes
        assert!(validate_display_name(&"é".repeat(128)).is_ok());
        assert!(validate_display_name("").is_err());
        assert!(validate_display_name(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_validate_command_name() {
        assert!(validate_command_name("mvp").is_ok());
        assert!(validate_command_name("mvp_fetch").is_ok());
        assert!(validate_command_name("").is_err());
        assert!(validate_command_name("mvp fetch").is_err());
    }
}
