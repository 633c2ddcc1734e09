//! Adapter wiring and command execution.

use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use cap_std::{ambient_authority, fs::Dir};
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use super::Command;
use super::output::{failure_json, resolution_json, write_json};
use crate::config::ClientConfig;
use crate::domain::{
    CredentialStore, LoginCredentials, PasswordResetConfirmation, PollResolution, PollSettings,
    ProcessingCoordinator, ServiceClient, SignupFields, SignupRequest, TaskEvent, TaskId,
    TaskPoller, TaskProgress, TaskRegistry, UploadRequest, VideoCatalogue, VideoId,
};
use crate::outbound::credentials::FileCredentialStorage;
use crate::outbound::http::ReqwestTransport;

/// Wired client plus the polling cadence used by long-running commands.
pub struct App {
    client: ServiceClient,
    poll: PollSettings,
}

impl App {
    /// Wire the reqwest transport and the file-backed credential store.
    ///
    /// # Errors
    ///
    /// Returns an error when the credentials path is unusable or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let storage = FileCredentialStorage::new(&config.credentials_path)
            .wrap_err("invalid credentials path")?;
        let store = Arc::new(CredentialStore::new(
            Arc::new(storage),
            Arc::new(DefaultClock),
            config.policy,
        ));
        let transport = ReqwestTransport::new(config.base_url.clone(), config.request_timeout)
            .wrap_err("failed to build HTTP client")?;
        Ok(Self {
            client: ServiceClient::new(Arc::new(transport), store),
            poll: config.poll,
        })
    }

    /// The wired service client.
    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Run `command`, writing its JSON result to `out`.
    ///
    /// # Errors
    ///
    /// Returns the failure of the underlying operation, or an error when a
    /// tracked task ends in failure.
    pub async fn execute(&self, command: Command, out: &mut dyn Write) -> Result<()> {
        match command {
            Command::Login { username, password } => {
                let password = password_or_stdin(password)?;
                let credentials = LoginCredentials::try_from_parts(&username, &password)?;
                let identity = self.client.authenticate(&credentials).await?;
                write_json(out, &identity)
            }
            Command::Signup {
                username,
                email,
                first_name,
                last_name,
                password,
            } => {
                let password = password_or_stdin(password)?;
                let signup = SignupRequest::try_from_fields(SignupFields {
                    username: &username,
                    email: &email,
                    first_name: &first_name,
                    last_name: &last_name,
                    password: &password,
                })?;
                let identity = self.client.signup(&signup).await?;
                write_json(out, &identity)
            }
            Command::Logout => write_json(out, &json!({ "logged_out": self.client.logout() })),
            Command::Whoami => match self.client.identity() {
                Some(identity) => write_json(out, &identity),
                None => write_json(out, &json!({ "authenticated": false })),
            },
            Command::Videos => {
                let catalogue = VideoCatalogue::new();
                let view = catalogue.reload(&self.client).await?;
                write_json(out, &view)
            }
            Command::Show { id } => {
                let detail = self.client.video_detail(VideoId::new(id)).await?;
                write_json(out, &detail)
            }
            Command::Delete { id } => {
                self.client.delete_video(VideoId::new(id)).await?;
                write_json(out, &json!({ "deleted": id }))
            }
            Command::Upload {
                title,
                path,
                no_wait,
            } => self.upload(&title, &path, no_wait, out).await,
            Command::Task { task_id } => {
                let task_id = TaskId::new(task_id)?;
                self.track(&task_id, out).await
            }
            Command::ResetPassword { email } => {
                let detail = self.client.request_password_reset(&email).await?;
                write_json(out, &json!({ "detail": detail }))
            }
            Command::ConfirmReset {
                uid,
                token,
                new_password,
            } => {
                let confirmation =
                    PasswordResetConfirmation::try_from_parts(&uid, &token, &new_password)?;
                self.client.confirm_password_reset(&confirmation).await?;
                write_json(out, &json!({ "password_reset": true }))
            }
        }
    }

    async fn upload(
        &self,
        title: &str,
        path: &Path,
        no_wait: bool,
        out: &mut dyn Write,
    ) -> Result<()> {
        let (file_name, bytes) = read_upload(path)?;
        let upload = UploadRequest::try_new(title, &file_name, bytes)?;
        let coordinator = ProcessingCoordinator::new(self.client.clone(), self.poll);
        let mut events = coordinator.registry().subscribe();
        let receipt = coordinator.submit(&upload).await?;

        let task = match (&receipt.task_id, no_wait) {
            (Some(task_id), false) => {
                Some(wait_for(&mut events, coordinator.registry(), task_id).await?)
            }
            _ => None,
        };
        let failed = task.as_ref().is_some_and(|value| value["state"] == "failed");
        write_json(out, &json!({ "upload": receipt, "task": task }))?;
        if failed {
            return Err(eyre!("video processing failed"));
        }
        Ok(())
    }

    async fn track(&self, task_id: &TaskId, out: &mut dyn Write) -> Result<()> {
        let poller = TaskPoller::new(Arc::new(self.client.clone()), self.poll);
        let resolution = poller
            .run(task_id, |report| {
                info!(
                    task_id = %report.task_id,
                    status = ?report.status,
                    percent = ?report.progress.as_ref().map(TaskProgress::percent),
                    "task progress"
                );
                ControlFlow::Continue(())
            })
            .await
            .ok_or_else(|| eyre!("polling stopped before task {task_id} finished"))?;
        write_json(out, &resolution_json(&resolution))?;
        match resolution {
            PollResolution::Succeeded(_) => Ok(()),
            PollResolution::Failed(failure) => Err(eyre!("{failure}")),
        }
    }
}

async fn wait_for(
    events: &mut broadcast::Receiver<TaskEvent>,
    registry: &TaskRegistry,
    task_id: &TaskId,
) -> Result<serde_json::Value> {
    loop {
        match events.recv().await {
            Ok(TaskEvent::Succeeded { task, result }) if task.task_id == *task_id => {
                return Ok(json!({
                    "state": "succeeded",
                    "task_id": task.task_id,
                    "result": result,
                }));
            }
            Ok(TaskEvent::Failed { task, failure }) if task.task_id == *task_id => {
                return Ok(failure_json(&failure));
            }
            Ok(TaskEvent::Progressed(task)) if task.task_id == *task_id => {
                info!(task_id = %task.task_id, status = ?task.status, "task progress");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "task events lagged");
                if !registry.contains(task_id) {
                    return Err(eyre!("outcome of task {task_id} was missed"));
                }
            }
            Err(RecvError::Closed) => return Err(eyre!("task tracking stopped unexpectedly")),
        }
    }
}

fn password_or_stdin(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .wrap_err("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("upload path '{}' must name a file", path.display()))?;
    let directory = Dir::open_ambient_dir(parent, ambient_authority())
        .wrap_err_with(|| format!("open upload directory '{}'", parent.display()))?;
    let bytes = directory
        .read(Path::new(file_name))
        .wrap_err_with(|| format!("read upload file '{}'", path.display()))?;
    Ok((file_name.to_string_lossy().into_owned(), bytes))
}
