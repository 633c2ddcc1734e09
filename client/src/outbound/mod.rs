//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **http**: reqwest-backed [`HttpTransport`](crate::domain::ports::HttpTransport)
//!   talking to the summarisation service.
//! - **credentials**: cap-std JSON file implementing
//!   [`CredentialStorage`](crate::domain::ports::CredentialStorage).
//!
//! Adapters are thin translators between domain types and infrastructure
//! representations. They contain no business logic.

pub mod credentials;
pub mod http;
