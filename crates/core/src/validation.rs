//! Local validation of user input, applied before any request is sent.

use crate::error::CoreError;
use crate::task::Priority;

/// Maximum length of a task name.
const MAX_NAME_LEN: usize = 200;

/// Validate a task name for creation.
///
/// Rules:
/// - Must not be blank.
/// - Must not exceed `MAX_NAME_LEN` characters.
pub fn validate_task_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Task name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Task name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Admin-created tasks require a description.
pub fn validate_description(description: &str) -> Result<(), CoreError> {
    if description.trim().is_empty() {
        return Err(CoreError::Validation(
            "Task description must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Accepts 1..=5 and returns the typed priority.
pub fn validate_priority(value: u8) -> Result<Priority, CoreError> {
    Priority::new(value).map_err(|_| {
        CoreError::Validation(format!("Priority must be between 1 and 5, got {value}"))
    })
}

/// Progress is a percentage.
pub fn validate_progress(value: u8) -> Result<(), CoreError> {
    if value > 100 {
        return Err(CoreError::Validation(format!(
            "Progress must be between 0 and 100, got {value}"
        )));
    }
    Ok(())
}

/// Completing or failing a task requires a non-blank comment.
pub fn validate_comment(comment: &str, purpose: &str) -> Result<(), CoreError> {
    if comment.trim().is_empty() {
        return Err(CoreError::Validation(format!(
            "Please provide {purpose} before submitting"
        )));
    }
    Ok(())
}
