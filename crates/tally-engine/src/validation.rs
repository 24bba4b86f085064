//! Input checks run before any store access.
//!
//! Each check returns the normalized value on success so callers persist
//! exactly what was validated.

use std::collections::BTreeSet;

use tally_types::{MIN_OPTIONS, UserId};

use crate::error::VotingError;

/// Trim a poll title and reject it if nothing is left.
pub fn title(raw: &str) -> Result<String, VotingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VotingError::Validation("title must not be empty".to_owned()));
    }
    Ok(trimmed.to_owned())
}

/// Trim every option label and require at least two distinct, non-empty
/// labels. Order is preserved.
pub fn options(raw: Vec<String>) -> Result<Vec<String>, VotingError> {
    let mut seen = BTreeSet::new();
    let mut labels = Vec::with_capacity(raw.len());

    for (position, option) in raw.into_iter().enumerate() {
        let label = option.trim();
        if label.is_empty() {
            return Err(VotingError::Validation(format!(
                "option {} must not be empty",
                position.saturating_add(1)
            )));
        }
        if !seen.insert(label.to_owned()) {
            return Err(VotingError::Validation(format!(
                "option `{label}` is listed more than once"
            )));
        }
        labels.push(label.to_owned());
    }

    if labels.len() < MIN_OPTIONS {
        return Err(VotingError::Validation(
            "a poll needs at least 2 options".to_owned(),
        ));
    }
    Ok(labels)
}

/// Reject a blank caller identifier. `role` names it in the message.
pub fn user(id: &UserId, role: &str) -> Result<(), VotingError> {
    if id.as_str().trim().is_empty() {
        return Err(VotingError::Validation(format!("{role} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn title_is_trimmed() {
        assert_eq!(title("  Lunch?  ").ok().as_deref(), Some("Lunch?"));
        assert!(matches!(title("   "), Err(VotingError::Validation(_))));
    }

    #[test]
    fn single_option_is_rejected() {
        assert!(matches!(
            options(labels(&["A"])),
            Err(VotingError::Validation(_))
        ));
    }

    #[test]
    fn options_are_trimmed_in_order() {
        let result = options(labels(&[" B ", "A", "C  "]));
        assert_eq!(result.ok(), Some(labels(&["B", "A", "C"])));
    }

    #[test]
    fn blank_option_is_rejected() {
        assert!(matches!(
            options(labels(&["A", "  ", "B"])),
            Err(VotingError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_after_trim_is_rejected() {
        assert!(matches!(
            options(labels(&["A", " A", "B"])),
            Err(VotingError::Validation(_))
        ));
    }

    #[test]
    fn blank_user_is_rejected() {
        assert!(user(&UserId::new("u1"), "user id").is_ok());
        assert!(matches!(
            user(&UserId::new(" "), "user id"),
            Err(VotingError::Validation(_))
        ));
    }
}
