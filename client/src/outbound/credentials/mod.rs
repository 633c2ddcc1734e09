//! Credential storage adapters.
//!
//! This module provides the file-backed implementation of the
//! `CredentialStorage` port.

mod dto;
mod file_storage;

pub use file_storage::FileCredentialStorage;
