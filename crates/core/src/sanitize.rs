//! Boundary clean-up for user-entered text and role keys.

use crate::errors::DomainError;

pub const TITLE_MAX_CHARS: usize = 500;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

const STRIPPED: &[char] = &['<', '>', '"', '\'', '`'];

/// Removes markup delimiters, collapses whitespace runs to one space, trims,
/// and truncates to `max_chars` characters.
pub fn sanitize_text(value: &str, max_chars: usize) -> String {
    let mut output = String::with_capacity(value.len());
    let mut pending_space = false;

    for ch in value.chars().filter(|ch| !STRIPPED.contains(ch)) {
        if ch.is_whitespace() {
            pending_space = !output.is_empty();
            continue;
        }
        if pending_space {
            output.push(' ');
            pending_space = false;
        }
        output.push(ch);
    }

    match output.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            output.truncate(cut);
            output.truncate(output.trim_end().len());
            output
        }
        None => output,
    }
}

/// Role keys are trimmed but stay case-sensitive: "Dev" and "dev" are
/// distinct roles.
pub fn normalize_role(role: &str) -> Result<String, DomainError> {
    let trimmed = role.trim();
    if trimmed.is_empty() {
        return Err(DomainError::InvalidRole(role.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_role, sanitize_text};
    use crate::errors::DomainError;

    #[test]
    fn strips_markup_delimiters_and_collapses_whitespace() {
        let cleaned = sanitize_text("  <b>Landing\n\n  page</b> \"v2\" ", 500);
        assert_eq!(cleaned, "bLanding page/b v2");
    }

    #[test]
    fn truncates_on_character_boundaries() {
        let cleaned = sanitize_text("Évolutions graphiques", 4);
        assert_eq!(cleaned, "Évol");
    }

    #[test]
    fn truncation_does_not_leave_trailing_space() {
        assert_eq!(sanitize_text("ab cd", 3), "ab");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(sanitize_text("   ", 10), "");
        assert_eq!(sanitize_text("", 10), "");
    }

    #[test]
    fn roles_are_trimmed_but_case_preserved() {
        assert_eq!(normalize_role("  Dev ").expect("role"), "Dev");
        assert_ne!(normalize_role("dev").expect("role"), normalize_role("Dev").expect("role"));
    }

    #[test]
    fn blank_roles_are_rejected() {
        let error = normalize_role("   ").expect_err("blank role");
        assert!(matches!(error, DomainError::InvalidRole(_)));
    }
}
