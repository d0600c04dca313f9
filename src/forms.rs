// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Registration, login and profile form validation.
//!
//! Validation is field-level and collects every error so the client can
//! show them all at once. Uniqueness of username and email is checked by
//! the account directory, not here.

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const MAX_USERNAME_LEN: usize = 150;
const MAX_NAME_LEN: usize = 30;
const MAX_ACCOUNT_NAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_BIO_LEN: usize = 500;
const MAX_AVATAR_URL_LEN: usize = 300;
const MAX_LOCATION_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("This field is required.")]
    Required(&'static str),

    #[error("Ensure this value has at most {max} characters.")]
    TooLong { field: &'static str, max: usize },

    #[error("Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.")]
    InvalidUsername,

    #[error("Enter a valid email address.")]
    InvalidEmail,

    #[error("The two password fields didn't match.")]
    PasswordMismatch,

    #[error("This password is too short. It must contain at least {0} characters.")]
    PasswordTooShort(usize),

    #[error("This password is entirely numeric.")]
    PasswordNumeric,

    #[error("Enter a valid phone number (7-15 digits, optional leading +).")]
    InvalidPhone,

    #[error("Enter a valid URL.")]
    InvalidUrl(&'static str),
}

impl ValidationError {
    /// Form field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::Required(field) | Self::TooLong { field, .. } | Self::InvalidUrl(field) => *field,
            Self::InvalidUsername => "username",
            Self::InvalidEmail => "email",
            Self::PasswordMismatch => "password2",
            Self::PasswordTooShort(_) | Self::PasswordNumeric => "password1",
            Self::InvalidPhone => "phone",
        }
    }
}

/// Account registration form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(err) = validate_username(&self.username) {
            errors.push(err);
        }
        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if let Err(err) = validate_name(field, value) {
                errors.push(err);
            }
        }
        if let Err(err) = validate_email(&self.email) {
            errors.push(err);
        }
        errors.extend(validate_passwords(&self.password1, &self.password2));

        if errors.is_empty() {
            Ok(())
        } else {
            debug!(username = %self.username, errors = errors.len(), "Registration form invalid");
            Err(errors)
        }
    }
}

/// Login form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Page to return to after logging in
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    /// Local path from `next`, if it is one.
    ///
    /// Anything that could leave the site (absolute URLs, `//host`, `/\host`)
    /// is ignored.
    pub fn next_path(&self) -> Option<&str> {
        self.next
            .as_deref()
            .filter(|next| next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\"))
    }

    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        if self.username.trim().is_empty() {
            errors.push(ValidationError::Required("username"));
        }
        if self.password.is_empty() {
            errors.push(ValidationError::Required("password"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Profile page form: account names and email plus the profile fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub phone: String,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            if let Err(err) = max_len(field, value.trim(), MAX_ACCOUNT_NAME_LEN) {
                errors.push(err);
            }
        }
        if let Err(err) = validate_email(&self.email) {
            errors.push(err);
        }
        errors.extend(self.patch().validate().err().unwrap_or_default());

        if errors.is_empty() {
            Ok(())
        } else {
            debug!(errors = errors.len(), "Profile form invalid");
            Err(errors)
        }
    }

    /// The profile half of the form, every field present.
    pub fn patch(&self) -> ProfilePatch {
        ProfilePatch {
            bio: Some(self.bio.trim().to_string()),
            avatar_url: Some(self.avatar_url.trim().to_string()),
            location: Some(self.location.trim().to_string()),
            phone: Some(self.phone.trim().to_string()),
        }
    }
}

/// Profile fields to change. Absent fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfilePatch {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub phone: Option<String>,
}

impl ProfilePatch {
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Some(bio) = &self.bio {
            errors.extend(max_len("bio", bio, MAX_BIO_LEN).err());
        }
        if let Some(url) = &self.avatar_url {
            errors.extend(validate_avatar_url(url).err());
        }
        if let Some(location) = &self.location {
            errors.extend(max_len("location", location, MAX_LOCATION_LEN).err());
        }
        if let Some(phone) = &self.phone {
            match max_len("phone", phone, MAX_PHONE_LEN) {
                Ok(()) => errors.extend(validate_phone(phone).err()),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        Err(ValidationError::TooLong { field, max })
    } else {
        Ok(())
    }
}

/// Avatar URLs are empty or absolute `http`/`https` URLs with a host.
pub fn validate_avatar_url(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Ok(());
    }
    max_len("avatar_url", value, MAX_AVATAR_URL_LEN)?;
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => Ok(()),
        _ => Err(ValidationError::InvalidUrl("avatar_url")),
    }
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Required("username"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ValidationError::TooLong {
            field: "username",
            max: MAX_USERNAME_LEN,
        });
    }
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if !username.chars().all(allowed) {
        return Err(ValidationError::InvalidUsername);
    }
    Ok(())
}

fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_NAME_LEN,
        });
    }
    Ok(())
}

/// Check an email address has a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required("email"));
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    let domain_ok = domain
        .split('.')
        .all(|label| !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-'))
        && domain.contains('.');
    if local.is_empty() || local.contains('@') || email.contains(char::is_whitespace) || !domain_ok {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

fn validate_passwords(password1: &str, password2: &str) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if password1.is_empty() {
        errors.push(ValidationError::Required("password1"));
    }
    if password2.is_empty() {
        errors.push(ValidationError::Required("password2"));
    }
    if !errors.is_empty() {
        return errors;
    }
    if password1 != password2 {
        errors.push(ValidationError::PasswordMismatch);
        return errors;
    }
    if password1.chars().count() < MIN_PASSWORD_LEN {
        errors.push(ValidationError::PasswordTooShort(MIN_PASSWORD_LEN));
    }
    if password1.chars().all(|c| c.is_ascii_digit()) {
        errors.push(ValidationError::PasswordNumeric);
    }
    errors
}

/// Phone numbers are 7-15 digits with an optional leading `+`. Empty is allowed.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() {
        return Ok(());
    }
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if (7..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone)
    }
}
