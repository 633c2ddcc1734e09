//! cap-std JSON file holding the signed-in session.
//!
//! Writes are staged beside the target and renamed into place so a crash
//! mid-write leaves the previous session intact. On Unix the staged file is
//! created owner-only, so the tokens are never readable by others.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cap_std::ambient_authority;
use cap_std::fs::{Dir, OpenOptions};
use tracing::debug;

use super::dto::StoredSessionDto;
use crate::domain::StoredSession;
use crate::domain::ports::{CredentialStorage, CredentialStorageError};

/// Session persisted as one JSON document on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    directory: PathBuf,
    file_name: OsString,
}

impl FileCredentialStorage {
    /// Storage backed by the file at `path`. The parent directory is created
    /// on first write.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStorageError::Unavailable`] when `path` does not
    /// name a file.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, CredentialStorageError> {
        let path = path.into();
        let file_name = path.file_name().map(ToOwned::to_owned).ok_or_else(|| {
            CredentialStorageError::unavailable(format!(
                "'{}' does not name a file",
                path.display()
            ))
        })?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            directory,
            file_name,
        })
    }

    /// Full path of the session file.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }

    fn staging_name(&self) -> OsString {
        let mut name = OsString::from(".");
        name.push(&self.file_name);
        name.push(".tmp");
        name
    }

    fn unavailable(&self, action: &str, error: &io::Error) -> CredentialStorageError {
        CredentialStorageError::unavailable(format!(
            "{action} '{}': {error}",
            self.path().display()
        ))
    }

    fn open_existing_dir(&self) -> Result<Option<Dir>, CredentialStorageError> {
        match Dir::open_ambient_dir(&self.directory, ambient_authority()) {
            Ok(directory) => Ok(Some(directory)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(self.unavailable("open directory for", &error)),
        }
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn read(&self) -> Result<Option<StoredSession>, CredentialStorageError> {
        let Some(directory) = self.open_existing_dir()? else {
            return Ok(None);
        };
        let bytes = match directory.read(Path::new(&self.file_name)) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(self.unavailable("read", &error)),
        };
        let dto: StoredSessionDto = serde_json::from_slice(&bytes).map_err(|error| {
            CredentialStorageError::corrupt(format!("invalid session JSON: {error}"))
        })?;
        dto.into_domain()
            .map(Some)
            .map_err(CredentialStorageError::corrupt)
    }

    fn write(&self, session: &StoredSession) -> Result<(), CredentialStorageError> {
        Dir::create_ambient_dir_all(&self.directory, ambient_authority())
            .map_err(|error| self.unavailable("create directory for", &error))?;
        let directory = Dir::open_ambient_dir(&self.directory, ambient_authority())
            .map_err(|error| self.unavailable("open directory for", &error))?;

        let bytes = serde_json::to_vec_pretty(&StoredSessionDto::from(session)).map_err(|error| {
            CredentialStorageError::unavailable(format!("encode session: {error}"))
        })?;
        let staging = self.staging_name();
        stage(&directory, Path::new(&staging), &bytes)
            .map_err(|error| self.unavailable("stage", &error))?;
        directory
            .rename(Path::new(&staging), &directory, Path::new(&self.file_name))
            .map_err(|error| {
                let _cleanup_result = directory.remove_file(Path::new(&staging));
                self.unavailable("replace", &error)
            })?;
        debug!(path = %self.path().display(), "session file written");
        Ok(())
    }

    fn erase(&self) -> Result<(), CredentialStorageError> {
        let Some(directory) = self.open_existing_dir()? else {
            return Ok(());
        };
        match directory.remove_file(Path::new(&self.file_name)) {
            Ok(()) => {
                debug!(path = %self.path().display(), "session file removed");
                Ok(())
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(self.unavailable("remove", &error)),
        }
    }
}

/// Write `bytes` to a freshly created `path`. A leftover file from an
/// interrupted write is removed first so its mode is never inherited.
fn stage(directory: &Dir, path: &Path, bytes: &[u8]) -> io::Result<()> {
    match directory.remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => return Err(error),
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    owner_only(&mut options);
    let mut file = directory.open_with(path, &options)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(unix)]
fn owner_only(options: &mut OpenOptions) {
    use cap_std::fs::OpenOptionsExt;

    options.mode(0o600);
}

#[cfg(not(unix))]
fn owner_only(_options: &mut OpenOptions) {}

#[cfg(test)]
mod tests {
    //! Round trips through a temporary directory.

    use super::*;
    use crate::domain::{CredentialPair, CredentialPolicy};
    use crate::test_support::test_identity;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn session(access: &str) -> StoredSession {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid time");
        CredentialPolicy::default().stamp(
            CredentialPair::try_new(access, "tok-r").expect("valid pair"),
            test_identity(),
            now,
        )
    }

    #[rstest]
    fn missing_file_and_directory_read_as_empty(temp_dir: TempDir) {
        let storage = FileCredentialStorage::new(temp_dir.path().join("nested/credentials.json"))
            .expect("path names a file");
        assert_eq!(storage.read().expect("read"), None);
        storage.erase().expect("erasing nothing succeeds");
    }

    #[rstest]
    fn write_replaces_previous_session(temp_dir: TempDir) {
        let storage = FileCredentialStorage::new(temp_dir.path().join("vidsum/credentials.json"))
            .expect("path names a file");

        storage.write(&session("tok-a1")).expect("first write");
        storage.write(&session("tok-a2")).expect("second write");

        let stored = storage.read().expect("read").expect("session present");
        assert_eq!(stored, session("tok-a2"));
        assert!(
            !temp_dir.path().join("vidsum/.credentials.json.tmp").exists(),
            "staging file should be renamed away",
        );
    }

    #[rstest]
    fn erase_removes_the_file(temp_dir: TempDir) {
        let path = temp_dir.path().join("credentials.json");
        let storage = FileCredentialStorage::new(&path).expect("path names a file");
        storage.write(&session("tok-a")).expect("write");

        storage.erase().expect("erase");

        assert!(!path.exists());
        assert_eq!(storage.read().expect("read"), None);
    }

    #[rstest]
    #[case::not_json(b"{not json".as_slice())]
    #[case::blank_token(br#"{"version":1,"access_token":" ","refresh_token":"r","identity":{"id":1,"username":"ada"},"issued_at":"2026-03-01T09:00:00Z","access_expires_at":"2026-03-02T09:00:00Z","refresh_expires_at":"2026-03-31T09:00:00Z"}"#.as_slice())]
    #[case::future_version(br#"{"version":9,"access_token":"a","refresh_token":"r","identity":{"id":1,"username":"ada"},"issued_at":"2026-03-01T09:00:00Z","access_expires_at":"2026-03-02T09:00:00Z","refresh_expires_at":"2026-03-31T09:00:00Z"}"#.as_slice())]
    fn undecodable_content_is_corrupt(temp_dir: TempDir, #[case] content: &[u8]) {
        let path = temp_dir.path().join("credentials.json");
        std::fs::write(&path, content).expect("seed file");
        let storage = FileCredentialStorage::new(&path).expect("path names a file");

        let error = storage.read().expect_err("content is invalid");
        assert!(
            matches!(error, CredentialStorageError::Corrupt { .. }),
            "expected Corrupt, got {error:?}",
        );
    }

    #[cfg(unix)]
    #[rstest]
    fn session_file_is_owner_only(temp_dir: TempDir) {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_dir.path().join("credentials.json");
        let storage = FileCredentialStorage::new(&path).expect("path names a file");
        storage.write(&session("tok-a")).expect("write");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[rstest]
    fn staged_file_is_owner_only_from_creation(temp_dir: TempDir) {
        use std::os::unix::fs::PermissionsExt;

        let leftover = temp_dir.path().join(".credentials.json.tmp");
        std::fs::write(&leftover, b"stale").expect("seed leftover");
        std::fs::set_permissions(&leftover, std::fs::Permissions::from_mode(0o644))
            .expect("widen leftover");
        let directory =
            Dir::open_ambient_dir(temp_dir.path(), ambient_authority()).expect("open dir");

        stage(&directory, Path::new(".credentials.json.tmp"), b"{}").expect("stage");

        let mode = std::fs::metadata(&leftover).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o077, 0, "staged mode {mode:o} is readable by others");
        assert_eq!(std::fs::read(&leftover).expect("read staged"), b"{}");
    }

    #[rstest]
    fn rejects_paths_without_a_file_name() {
        let error = FileCredentialStorage::new("/").expect_err("root is a directory");
        assert!(matches!(error, CredentialStorageError::Unavailable { .. }));
    }
}
