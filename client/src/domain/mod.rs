//! Domain primitives, services, and ports.
//!
//! Purpose: hold everything that does not depend on a concrete transport or
//! storage medium. Adapters live in `crate::outbound`; the CLI composes them.
//!
//! Public surface:
//! - Error / ErrorCode: tagged failure payload returned by every operation.
//! - CredentialStore, TokenRefresher, RequestAuthenticator: the credential
//!   lifecycle and self-healing outbound calls.
//! - TaskPoller, TaskRegistry: background task tracking.
//! - ServiceClient, VideoCatalogue, ProcessingCoordinator: the typed
//!   endpoint surface and the upload workflow built on it.

pub mod error;
pub mod ports;

mod auth;
mod credential_store;
mod credentials;
mod processing_coordinator;
mod request_authenticator;
mod service_client;
mod session;
mod task;
mod task_poller;
mod task_registry;
mod token_refresher;
mod video;
mod video_catalogue;

pub use self::auth::{
    AuthInputError, LoginCredentials, PasswordResetConfirmation, SignupFields, SignupRequest,
    normalize_email,
};
pub use self::credential_store::CredentialStore;
pub use self::credentials::{
    CredentialPair, CredentialPolicy, CredentialValidationError, Identity, StoredSession,
};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::processing_coordinator::ProcessingCoordinator;
pub use self::request_authenticator::RequestAuthenticator;
pub use self::service_client::ServiceClient;
pub use self::session::{LogoutReason, SessionEvent};
pub use self::task::{
    TaskDescriptor, TaskEvent, TaskFailure, TaskId, TaskIdValidationError, TaskProgress,
    TaskStatus, TaskStatusReport,
};
pub use self::task_poller::{
    DEFAULT_POLL_INTERVAL, PollMachine, PollResolution, PollSettings, PollState, PollStep,
    TaskPoller,
};
pub use self::task_registry::TaskRegistry;
pub use self::token_refresher::{RefreshFailed, TokenRefresher};
pub use self::video::{
    UploadReceipt, UploadRequest, VideoDetail, VideoId, VideoItem, VideoList,
};
pub use self::video_catalogue::{CatalogueView, DashboardStats, VideoCatalogue};

/// Convenient result alias for client operations.
///
/// # Examples
/// ```
/// use client::domain::{ApiResult, Error};
///
/// fn guard(signed_in: bool) -> ApiResult<()> {
///     if signed_in { Ok(()) } else { Err(Error::unauthorized("sign in first")) }
/// }
/// assert!(guard(false).is_err());
/// ```
pub type ApiResult<T> = Result<T, Error>;
