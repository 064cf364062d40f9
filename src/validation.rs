//! Input checks that run before any remote call is issued.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Name cannot be empty.")]
    EmptyName,

    #[error("Email cannot be empty.")]
    EmptyEmail,

    #[error("Invalid email format. Example: email@example.com")]
    MalformedEmail,

    #[error("Password must be at least {} characters.", MIN_PASSWORD_LENGTH)]
    ShortPassword,

    #[error("Title cannot be empty.")]
    EmptyTitle,

    #[error("Author cannot be empty.")]
    EmptyAuthor,

    #[error("A reading goal must be at least one book.")]
    EmptyGoal,
}

pub const MIN_PASSWORD_LENGTH: usize = 6;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("EMAIL_REGEX is valid"))
}

/// Trims and lowercases a well-formed address.
pub fn email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        Err(ValidationError::EmptyEmail)
    } else if !email_regex().is_match(email) {
        Err(ValidationError::MalformedEmail)
    } else {
        Ok(email.to_lowercase())
    }
}

pub fn name(name: &str) -> Result<&str, ValidationError> {
    non_empty(name, ValidationError::EmptyName)
}

pub fn password(password: &str) -> Result<&str, ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        Err(ValidationError::ShortPassword)
    } else {
        Ok(password)
    }
}

pub fn title(title: &str) -> Result<&str, ValidationError> {
    non_empty(title, ValidationError::EmptyTitle)
}

pub fn author(author: &str) -> Result<&str, ValidationError> {
    non_empty(author, ValidationError::EmptyAuthor)
}

pub fn goal(goal: u32) -> Result<u32, ValidationError> {
    if goal == 0 {
        Err(ValidationError::EmptyGoal)
    } else {
        Ok(goal)
    }
}

fn non_empty(text: &str, error: ValidationError) -> Result<&str, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        Err(error)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails() {
        assert_eq!(email("  Reader@Example.COM "), Ok("reader@example.com".to_owned()));
        assert_eq!(email("   "), Err(ValidationError::EmptyEmail));
        assert_eq!(email("reader@example"), Err(ValidationError::MalformedEmail));
        assert_eq!(email("two words@example.com"), Err(ValidationError::MalformedEmail));
    }

    #[test]
    fn passwords_and_names() {
        assert_eq!(password("12345"), Err(ValidationError::ShortPassword));
        assert_eq!(password("123456"), Ok("123456"));
        assert_eq!(name(" \t"), Err(ValidationError::EmptyName));
        assert_eq!(title(" Dune "), Ok("Dune"));
        assert_eq!(author(""), Err(ValidationError::EmptyAuthor));
        assert_eq!(goal(0), Err(ValidationError::EmptyGoal));
    }

    #[test]
    fn messages_match_the_forms() {
        assert_eq!(
            ValidationError::ShortPassword.to_string(),
            "Password must be at least 6 characters."
        );
    }
}
