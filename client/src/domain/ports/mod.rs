//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod credential_storage;
mod http_transport;
mod task_status_source;

#[cfg(test)]
pub use credential_storage::MockCredentialStorage;
pub use credential_storage::{
    CredentialStorage, CredentialStorageError, InMemoryCredentialStorage,
};
pub use http_transport::{
    ApiRequest, ApiResponse, Endpoint, FilePart, HttpMethod, HttpTransport, HttpTransportError,
    RequestBody,
};
#[cfg(test)]
pub use task_status_source::MockTaskStatusSource;
pub use task_status_source::TaskStatusSource;
