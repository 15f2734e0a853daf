//! Form field checks. Each check appends to a `FieldErrors` collector so a
//! whole form is reported at once.

use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Trims `value`, then requires it to be non-empty and at most `max` chars.
pub fn required_text(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else {
        max_length(errors, field, value, max);
    }
}

pub fn max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        errors.add(
            field,
            format!("Ensure this value has at most {max} characters (it has {len})."),
        );
    }
}

pub fn is_valid_email(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !s.chars().any(char::is_whitespace)
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
        && domain.contains('.')
}

pub fn email(errors: &mut FieldErrors, field: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if !is_valid_email(value) {
        errors.add(field, "Enter a valid email address.");
    } else {
        max_length(errors, field, value, 254);
    }
}

pub fn is_valid_username(s: &str) -> bool {
    let len = s.chars().count();
    (1..=150).contains(&len)
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

pub fn username(errors: &mut FieldErrors, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.add(field, "This field is required.");
    } else if !is_valid_username(value) {
        errors.add(
            field,
            "Enter a valid username of at most 150 letters, digits and @/./+/-/_ characters.",
        );
    }
}

/// Strength rules for a new password; `username` may not be reused as-is.
pub fn new_password(
    errors: &mut FieldErrors,
    field: &str,
    password: &str,
    confirm_field: &str,
    confirm: &str,
    username: &str,
) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("This password is too short. It must contain at least {MIN_PASSWORD_LEN} characters."),
        );
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "This password is entirely numeric.");
    }
    if !username.is_empty() && password.eq_ignore_ascii_case(username) {
        errors.add(field, "The password is too similar to the username.");
    }
    if password != confirm {
        errors.add(confirm_field, "The two password fields didn't match.");
    }
}
