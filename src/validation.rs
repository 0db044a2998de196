//! # Input Validation
//!
//! Per-field format, length, and charset rules. Every violation produces a
//! `BAD_REQUEST` with a human-readable reason; the reasons are part of the
//! user-facing contract, so keep them stable.
//!
//! | Field            | Rule                                                  |
//! |------------------|-------------------------------------------------------|
//! | email            | non-empty, ≤254 chars, RFC-ish address shape          |
//! | name/department  | trimmed, 2–100 chars                                   |
//! | username         | trimmed, 3–50 chars, `[A-Za-z0-9_-]+`                  |
//! | password         | 8–128 chars, at least one letter and one digit         |
//! | poll title       | 5–200 chars                                            |
//! | poll description | 10–1000 chars                                          |
//! | poll options     | 2–20 entries, each 1–100 chars, case-insensitively distinct |
//! | duration hours   | 1–8760                                                 |
//! | voter id         | `[a-f0-9]{16}`                                         |
//! | poll id          | lowercase hyphenated UUID                              |
//!
//! The sanitiser is the canonicalisation step: it strips NUL and
//! non-printable control characters (tab and newline survive) and trims
//! surrounding whitespace. Validate the sanitised form, store the
//! sanitised form.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, VotingError};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap());

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap());

static VOTER_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-f0-9]{16}$").unwrap());

static POLL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$").unwrap()
});

fn bad(reason: impl Into<String>) -> VotingError {
    VotingError::BadRequest(reason.into())
}

/// Strip NUL and non-printable controls (tab and newline survive), then
/// trim surrounding whitespace.
pub fn sanitize(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || (c >= ' ' && c != '\u{7f}'))
        .collect();
    kept.trim().to_string()
}

pub fn validate_email(email: &str) -> Result<()> {
    if email.is_empty() {
        return Err(bad("email is required"));
    }
    let email = email.trim();
    if email.chars().count() > 254 {
        return Err(bad("email is too long (max 254 characters)"));
    }
    if !EMAIL_RE.is_match(email) {
        return Err(bad("invalid email format"));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<()> {
    bounded_text(name, "name", 2, 100)
}

pub fn validate_department(department: &str) -> Result<()> {
    bounded_text(department, "department", 2, 100)
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(bad("username is required"));
    }
    let username = username.trim();
    let len = username.chars().count();
    if len < 3 {
        return Err(bad("username must be at least 3 characters"));
    }
    if len > 50 {
        return Err(bad("username is too long (max 50 characters)"));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(bad(
            "username can only contain letters, numbers, underscores, and hyphens",
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(bad("password is required"));
    }
    let len = password.chars().count();
    if len < 8 {
        return Err(bad("password must be at least 8 characters"));
    }
    if len > 128 {
        return Err(bad("password is too long (max 128 characters)"));
    }
    let has_letter = password.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(bad(
            "password must contain at least one letter and one number",
        ));
    }
    Ok(())
}

pub fn validate_poll_title(title: &str) -> Result<()> {
    bounded_text(title, "poll title", 5, 200)
}

pub fn validate_poll_description(description: &str) -> Result<()> {
    bounded_text(description, "poll description", 10, 1000)
}

/// 2–20 options, each 1–100 chars after trimming, pairwise distinct after
/// case-folding.
pub fn validate_poll_options(options: &[String]) -> Result<()> {
    if options.len() < 2 {
        return Err(bad("poll must have at least 2 options"));
    }
    if options.len() > 20 {
        return Err(bad("poll cannot have more than 20 options"));
    }
    let mut seen = std::collections::HashSet::new();
    for (i, option) in options.iter().enumerate() {
        let option = option.trim();
        if option.is_empty() {
            return Err(bad(format!("option {} is empty", i + 1)));
        }
        if option.chars().count() > 100 {
            return Err(bad(format!("option {} is too long (max 100 characters)", i + 1)));
        }
        if !seen.insert(option.to_lowercase()) {
            return Err(bad(format!("duplicate option: {option}")));
        }
    }
    Ok(())
}

pub fn validate_duration_hours(hours: u32) -> Result<()> {
    if hours < 1 {
        return Err(bad("poll duration must be at least 1 hour"));
    }
    if hours > 8760 {
        return Err(bad("poll duration cannot exceed 1 year (8760 hours)"));
    }
    Ok(())
}

pub fn validate_voter_id(voter_id: &str) -> Result<()> {
    if voter_id.is_empty() {
        return Err(bad("voter ID is required"));
    }
    if !VOTER_ID_RE.is_match(voter_id) {
        return Err(bad("invalid voter ID format"));
    }
    Ok(())
}

pub fn validate_poll_id(poll_id: &str) -> Result<()> {
    if poll_id.is_empty() {
        return Err(bad("poll ID is required"));
    }
    if !POLL_ID_RE.is_match(poll_id) {
        return Err(bad("invalid poll ID format"));
    }
    Ok(())
}

fn bounded_text(value: &str, field: &str, min: usize, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(bad(format!("{field} is required")));
    }
    let len = value.trim().chars().count();
    if len < min {
        return Err(bad(format!("{field} must be at least {min} characters")));
    }
    if len > max {
        return Err(bad(format!("{field} is too long (max {max} characters)")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_rules() {
        assert!(validate_email("alice@x.io").is_ok());
        assert!(validate_email("a.b+c_d%e@sub.domain.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email(&format!("{}@x.io", "a".repeat(260))).is_err());
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("op_erator-1").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
    }

    #[test]
    fn password_needs_letter_and_digit() {
        assert!(validate_password("hunter42x").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("allletters").is_err());
        assert!(validate_password("1234567890").is_err());
    }

    #[test]
    fn option_rules() {
        let ok = vec!["Go".to_string(), "Rust".to_string()];
        assert!(validate_poll_options(&ok).is_ok());

        let one = vec!["Go".to_string()];
        assert!(validate_poll_options(&one).is_err());

        let dup = vec!["Go".to_string(), "go".to_string()];
        assert!(validate_poll_options(&dup).is_err());

        let empty_entry = vec!["Go".to_string(), "   ".to_string()];
        assert!(validate_poll_options(&empty_entry).is_err());

        let many: Vec<String> = (0..21).map(|i| format!("opt{i}")).collect();
        assert!(validate_poll_options(&many).is_err());
    }

    #[test]
    fn duration_bounds() {
        assert!(validate_duration_hours(1).is_ok());
        assert!(validate_duration_hours(8760).is_ok());
        assert!(validate_duration_hours(0).is_err());
        assert!(validate_duration_hours(8761).is_err());
    }

    #[test]
    fn id_formats() {
        assert!(validate_voter_id("a1b2c3d4e5f60718").is_ok());
        assert!(validate_voter_id("A1B2C3D4E5F60718").is_err());
        assert!(validate_voter_id("a1b2").is_err());

        assert!(validate_poll_id("123e4567-e89b-42d3-a456-426614174000").is_ok());
        assert!(validate_poll_id("123e4567e89b42d3a456426614174000").is_err());
    }

    #[test]
    fn sanitize_strips_controls_and_trims() {
        assert_eq!(sanitize("  hello\u{0}world\u{1}  "), "helloworld");
        assert_eq!(sanitize("line1\nline2\tend"), "line1\nline2\tend");
        assert_eq!(sanitize("del\u{7f}eted"), "deleted");
    }

    #[test]
    fn errors_carry_bad_request_code() {
        let err = validate_email("nope").unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }
}
