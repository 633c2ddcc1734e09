//! Authenticated request and background task coordination for the video
//! summarisation service.
//!
//! - [`domain`]: credential lifecycle, self-healing requests, task polling,
//!   and the typed service surface. No I/O beyond the ports it defines.
//! - [`outbound`]: reqwest transport and cap-std credential file.
//! - [`config`]: OrthoConfig-backed settings.
//! - [`cli`]: the `vidsum` composition root.

pub mod cli;
pub mod config;
pub mod domain;
pub mod outbound;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
