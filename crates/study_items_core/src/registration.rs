//! crates/study_items_core/src/registration.rs
//!
//! Client-side checks run before an account registration is sent to the
//! identity provider.

use crate::domain::SignUpRequest;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Enter your name")]
    MissingName,
}

/// The fields a person fills in to register.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
}

impl RegistrationForm {
    /// Checks the form in display order and returns the first problem found.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if !self.email.contains('@') {
            return Err(RegistrationError::InvalidEmail);
        }
        if self.password != self.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort);
        }
        if self.name.trim().is_empty() {
            return Err(RegistrationError::MissingName);
        }
        Ok(())
    }

    /// Validates the form and converts it into a provider request.
    pub fn into_request(self) -> Result<SignUpRequest, RegistrationError> {
        self.validate()?;
        Ok(SignUpRequest {
            email: self.email.trim().to_string(),
            password: self.password,
            name: self.name.trim().to_string(),
        })
    }
}
