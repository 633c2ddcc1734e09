//! `vidsum` command line: argument parsing and command dispatch.
//!
//! This is the composition root. It is the only layer that names concrete
//! adapters; every command prints one JSON document on stdout.

mod app;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use app::App;

/// `vidsum` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vidsum",
    about = "Upload videos to the summarisation service and track their processing",
    version
)]
pub struct Cli {
    /// Operation to perform.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported operations.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sign in and store the issued credentials.
    Login {
        /// Account name.
        #[arg(long)]
        username: String,
        /// Account password. Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in.
    Signup {
        /// Account name.
        #[arg(long)]
        username: String,
        /// Contact email.
        #[arg(long)]
        email: String,
        /// Given name.
        #[arg(long = "first-name")]
        first_name: String,
        /// Family name.
        #[arg(long = "last-name")]
        last_name: String,
        /// Account password. Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored credentials.
    Logout,
    /// Show the signed-in identity.
    Whoami,
    /// List uploaded videos with dashboard counters.
    Videos,
    /// Show one video with its transcript and summary.
    Show {
        /// Video identifier.
        id: u64,
    },
    /// Delete a video.
    Delete {
        /// Video identifier.
        id: u64,
    },
    /// Upload a video and wait for its processing task.
    Upload {
        /// Title shown in the catalogue.
        title: String,
        /// Video file to upload.
        path: PathBuf,
        /// Return as soon as the upload is accepted.
        #[arg(long = "no-wait")]
        no_wait: bool,
    },
    /// Poll a background task until it finishes.
    Task {
        /// Task identifier returned by an upload.
        task_id: String,
    },
    /// Email a password reset link.
    ResetPassword {
        /// Account email.
        email: String,
    },
    /// Set a new password from the parts of a reset link.
    ConfirmReset {
        /// Encoded user identifier from the link.
        uid: String,
        /// Reset token from the link.
        token: String,
        /// Replacement password.
        new_password: String,
    },
}
