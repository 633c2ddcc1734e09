//! Session lifecycle notifications.

use std::fmt;

use crate::domain::Identity;

/// Why the client dropped the stored credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user signed out explicitly.
    UserRequested,
    /// Authorization was rejected and no refresh was possible, or the refresh
    /// exchange itself failed.
    AuthFailure,
    /// A refresh succeeded but the replayed call was still rejected.
    RefreshExhausted,
}

impl fmt::Display for LogoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UserRequested => "user requested",
            Self::AuthFailure => "authorization failure",
            Self::RefreshExhausted => "refresh exhausted",
        };
        f.write_str(text)
    }
}

/// Published whenever the signed-in state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials were issued by authenticate or signup.
    SignedIn(Identity),
    /// The token pair was replaced by a refresh.
    Refreshed,
    /// Credentials were cleared.
    LoggedOut {
        /// What triggered the logout.
        reason: LogoutReason,
    },
}
