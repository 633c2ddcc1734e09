//! Authentication inputs such as login credentials and signup payloads.
//!
//! Constructors validate raw strings before any network call is attempted so
//! malformed input short-circuits with [`ErrorCode::InvalidRequest`].
//!
//! [`ErrorCode::InvalidRequest`]: crate::domain::ErrorCode::InvalidRequest

use std::fmt;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::domain::Error;

/// Domain error returned when authentication inputs are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthInputError {
    /// Username was missing or blank once trimmed.
    EmptyUsername,
    /// Password was blank.
    EmptyPassword,
    /// Email was blank or lacked an `@`.
    InvalidEmail,
    /// A required name field was blank.
    EmptyName { field: &'static str },
    /// Password reset link parts were missing.
    MissingResetToken,
}

impl fmt::Display for AuthInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
            Self::InvalidEmail => write!(f, "email must be a valid address"),
            Self::EmptyName { field } => write!(f, "{field} must not be empty"),
            Self::MissingResetToken => write!(f, "reset link is missing its uid or token"),
        }
    }
}

impl std::error::Error for AuthInputError {}

impl From<AuthInputError> for Error {
    fn from(value: AuthInputError) -> Self {
        Error::invalid_request(value.to_string())
    }
}

fn required_password(password: &str) -> Result<Zeroizing<String>, AuthInputError> {
    if password.is_empty() {
        return Err(AuthInputError::EmptyPassword);
    }
    Ok(Zeroizing::new(password.to_owned()))
}

fn required_trimmed(value: &str, error: AuthInputError) -> Result<String, AuthInputError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(error);
    }
    Ok(normalized.to_owned())
}

/// Validated login credentials sent to the authenticate endpoint.
///
/// ## Invariants
/// - `username` is trimmed and must not be empty after trimming.
/// - `password` is required to be non-empty but retains caller-provided
///   whitespace to avoid surprising credential comparisons.
///
/// # Examples
/// ```
/// use client::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("  ada ", "pw").unwrap();
/// assert_eq!(creds.username(), "ada");
/// assert_eq!(creds.password(), "pw");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    username: String,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw username/password inputs.
    pub fn try_from_parts(username: &str, password: &str) -> Result<Self, AuthInputError> {
        Ok(Self {
            username: required_trimmed(username, AuthInputError::EmptyUsername)?,
            password: required_password(password)?,
        })
    }

    /// Username string sent to the service.
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated account registration payload.
///
/// Serialises to the field names the signup endpoint expects.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    username: String,
    email: String,
    first_name: String,
    last_name: String,
    #[serde(serialize_with = "serialize_secret")]
    password: Zeroizing<String>,
}

/// Raw signup fields as typed by the user.
#[derive(Debug, Clone, Copy)]
pub struct SignupFields<'a> {
    /// Desired username.
    pub username: &'a str,
    /// Contact email address.
    pub email: &'a str,
    /// Given name.
    pub first_name: &'a str,
    /// Family name.
    pub last_name: &'a str,
    /// Account password.
    pub password: &'a str,
}

impl SignupRequest {
    /// Validate raw signup fields.
    ///
    /// # Examples
    /// ```
    /// use client::domain::{AuthInputError, SignupFields, SignupRequest};
    ///
    /// let fields = SignupFields {
    ///     username: "ada",
    ///     email: "not-an-email",
    ///     first_name: "Ada",
    ///     last_name: "Lovelace",
    ///     password: "pw",
    /// };
    /// assert_eq!(SignupRequest::try_from_fields(fields), Err(AuthInputError::InvalidEmail));
    /// ```
    pub fn try_from_fields(fields: SignupFields<'_>) -> Result<Self, AuthInputError> {
        let email = required_trimmed(fields.email, AuthInputError::InvalidEmail)?;
        if !email.contains('@') {
            return Err(AuthInputError::InvalidEmail);
        }
        Ok(Self {
            username: required_trimmed(fields.username, AuthInputError::EmptyUsername)?,
            email,
            first_name: required_trimmed(
                fields.first_name,
                AuthInputError::EmptyName {
                    field: "first name",
                },
            )?,
            last_name: required_trimmed(
                fields.last_name,
                AuthInputError::EmptyName { field: "last name" },
            )?,
            password: required_password(fields.password)?,
        })
    }

    /// Normalised username.
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Normalised email address.
    pub fn email(&self) -> &str {
        self.email.as_str()
    }
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Parameters carried by a password reset link plus the new password.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct PasswordResetConfirmation {
    uid: String,
    token: String,
    #[serde(serialize_with = "serialize_secret")]
    new_password: Zeroizing<String>,
}

impl PasswordResetConfirmation {
    /// Validate the reset link parts and the replacement password.
    pub fn try_from_parts(
        uid: &str,
        token: &str,
        new_password: &str,
    ) -> Result<Self, AuthInputError> {
        Ok(Self {
            uid: required_trimmed(uid, AuthInputError::MissingResetToken)?,
            token: required_trimmed(token, AuthInputError::MissingResetToken)?,
            new_password: required_password(new_password)?,
        })
    }
}

impl fmt::Debug for PasswordResetConfirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetConfirmation")
            .field("uid", &self.uid)
            .field("token", &"<redacted>")
            .field("new_password", &"<redacted>")
            .finish()
    }
}

/// Validate an email address for the reset request endpoint.
pub fn normalize_email(email: &str) -> Result<String, AuthInputError> {
    let email = required_trimmed(email, AuthInputError::InvalidEmail)?;
    if email.contains('@') {
        Ok(email)
    } else {
        Err(AuthInputError::InvalidEmail)
    }
}

fn serialize_secret<S>(secret: &Zeroizing<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(secret.as_str())
}
