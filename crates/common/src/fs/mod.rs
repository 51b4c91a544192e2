//! Exhaustion-aware file opening
//!
//! [`open_scoped`] and friends are drop-in replacements for opening a file
//! directly. The open call runs through a [`RetryExecutor`], so a momentarily
//! full descriptor table is retried instead of failing the caller. The
//! returned [`ScopedHandle`] closes the file exactly once when it goes out of
//! scope, whether the caller succeeds, fails later, or is cancelled.

use std::fmt;
use std::fs::OpenOptions;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::resilience::{RetryError, RetryExecutor, RetryPolicy, RetryResult};

/// Label used for diagnostics of scoped opens
const OPEN_LABEL: &str = "open_scoped";

/// How a scoped file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenMode {
    /// Read an existing file
    #[default]
    Read,
    /// Create or truncate, then write
    Write,
    /// Create if missing, write at the end
    Append,
    /// Create if missing, read and write without truncating
    ReadWrite,
    /// Create a new file, failing if it exists
    CreateNew,
}

impl OpenMode {
    /// Standard library options for this mode
    pub fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            Self::Read => options.read(true),
            Self::Write => options.write(true).create(true).truncate(true),
            Self::Append => options.append(true).create(true),
            Self::ReadWrite => options.read(true).write(true).create(true).truncate(false),
            Self::CreateNew => options.write(true).create_new(true),
        };
        options
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Append => "append",
            Self::ReadWrite => "read_write",
            Self::CreateNew => "create_new",
        };
        f.write_str(name)
    }
}

/// An open handle released when dropped.
///
/// Dereferences to the underlying file.
pub struct ScopedHandle<H> {
    handle: H,
    path: PathBuf,
    mode: OpenMode,
}

/// Async scoped file
pub type ScopedFile = ScopedHandle<tokio::fs::File>;

/// Blocking scoped file
pub type BlockingScopedFile = ScopedHandle<std::fs::File>;

impl<H> ScopedHandle<H> {
    fn new(handle: H, path: PathBuf, mode: OpenMode) -> Self {
        debug!(path = %path.display(), %mode, "Acquired scoped handle");
        Self { handle, path, mode }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }
}

impl<H> Deref for ScopedHandle<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H> DerefMut for ScopedHandle<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.handle
    }
}

impl<H> Drop for ScopedHandle<H> {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), mode = %self.mode, "Released scoped handle");
    }
}

impl<H> fmt::Debug for ScopedHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle").field("path", &self.path).field("mode", &self.mode).finish()
    }
}

/// Opens files through a retry executor with a fixed policy
#[derive(Debug, Clone)]
pub struct ScopedOpener {
    executor: RetryExecutor,
    policy: RetryPolicy,
}

impl Default for ScopedOpener {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ScopedOpener {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { executor: RetryExecutor::new().with_label(OPEN_LABEL), policy }
    }

    /// Use a custom executor (classifier, reclaimer, sleeper)
    pub fn with_executor(mut self, executor: RetryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Open `path`, retrying while descriptors are exhausted
    pub async fn open(
        &self,
        path: impl AsRef<Path>,
        mode: OpenMode,
    ) -> RetryResult<ScopedFile, std::io::Error> {
        let path = path.as_ref();
        let options = tokio::fs::OpenOptions::from(mode.options());
        let file = self.executor.execute(&self.policy, || options.open(path)).await?;
        Ok(ScopedHandle::new(file, path.to_path_buf(), mode))
    }

    /// Blocking form of [`open`](Self::open)
    pub fn open_blocking(
        &self,
        path: impl AsRef<Path>,
        mode: OpenMode,
    ) -> RetryResult<BlockingScopedFile, std::io::Error> {
        let path = path.as_ref();
        let options = mode.options();
        let file = self.executor.execute_blocking(&self.policy, || options.open(path))?;
        Ok(ScopedHandle::new(file, path.to_path_buf(), mode))
    }

    /// Open `path`, run `f` on the file, and close it before returning.
    ///
    /// Errors from `f` come back as [`RetryError::Operation`]; only the open
    /// itself is retried.
    pub fn with_file<T, F>(
        &self,
        path: impl AsRef<Path>,
        mode: OpenMode,
        f: F,
    ) -> RetryResult<T, std::io::Error>
    where
        F: FnOnce(&mut std::fs::File) -> std::io::Result<T>,
    {
        let mut file = self.open_blocking(path, mode)?;
        let result = f(&mut *file).map_err(RetryError::Operation);
        drop(file);
        result
    }
}

/// Open `path` with the default policy
pub async fn open_scoped(
    path: impl AsRef<Path>,
    mode: OpenMode,
) -> RetryResult<ScopedFile, std::io::Error> {
    ScopedOpener::default().open(path, mode).await
}

/// Blocking form of [`open_scoped`]
pub fn open_scoped_blocking(
    path: impl AsRef<Path>,
    mode: OpenMode,
) -> RetryResult<BlockingScopedFile, std::io::Error> {
    ScopedOpener::default().open_blocking(path, mode)
}

/// Open `path` under `policy`, run `f`, and release the file on every path
pub fn with_scoped_file<T, F>(
    path: impl AsRef<Path>,
    mode: OpenMode,
    policy: &RetryPolicy,
    f: F,
) -> RetryResult<T, std::io::Error>
where
    F: FnOnce(&mut std::fs::File) -> std::io::Result<T>,
{
    ScopedOpener::new(policy.clone()).with_file(path, mode, f)
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::sync::Arc;

    use super::*;
    use crate::testing::RecordingSleeper;

    #[test]
    fn test_mode_options_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("evidence.log");

        {
            let mut file = open_scoped_blocking(&path, OpenMode::Write).expect("create");
            file.write_all(b"first").expect("write");
            assert_eq!(file.mode(), OpenMode::Write);
            assert_eq!(file.path(), path.as_path());
        }
        {
            let mut file = open_scoped_blocking(&path, OpenMode::Append).expect("append");
            file.write_all(b" second").expect("write");
        }

        let mut contents = String::new();
        open_scoped_blocking(&path, OpenMode::Read)
            .expect("read")
            .read_to_string(&mut contents)
            .expect("read");
        assert_eq!(contents, "first second");
    }

    #[test]
    fn test_create_new_refuses_existing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("once.bin");
        drop(open_scoped_blocking(&path, OpenMode::CreateNew).expect("first create"));

        let err = open_scoped_blocking(&path, OpenMode::CreateNew).expect_err("exists");
        let io_err = err.into_operation_error().expect("unrelated failure");
        assert_eq!(io_err.kind(), std::io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_missing_file_is_not_retried() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sleeper = RecordingSleeper::new();
        let opener = ScopedOpener::default()
            .with_executor(
                RetryExecutor::new().with_sleeper(Arc::new(sleeper.clone())).without_monitor(),
            );

        let err =
            opener.open_blocking(dir.path().join("missing"), OpenMode::Read).expect_err("missing");
        assert!(!err.is_exhaustion());
        assert!(sleeper.waits().is_empty());
    }

    #[test]
    fn test_with_scoped_file_returns_closure_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("count.txt");
        std::fs::write(&path, "12345").expect("seed");

        let len = with_scoped_file(&path, OpenMode::Read, &RetryPolicy::default(), |file| {
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            Ok(buf.len())
        })
        .expect("read");
        assert_eq!(len, 5);
    }

    #[tokio::test]
    async fn test_async_open_reads_file() {
        use tokio::io::AsyncReadExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("async.txt");
        std::fs::write(&path, "hello").expect("seed");

        let mut file = open_scoped(&path, OpenMode::Read).await.expect("open");
        let mut contents = String::new();
        file.read_to_string(&mut contents).await.expect("read");
        assert_eq!(contents, "hello");
    }

    #[test]
    fn test_open_mode_serde() {
        let json = serde_json::to_string(&OpenMode::ReadWrite).expect("serialize");
        assert_eq!(json, "\"read_write\"");
        assert_eq!(OpenMode::ReadWrite.to_string(), "read_write");
        let mode: OpenMode = serde_json::from_str("\"create_new\"").expect("deserialize");
        assert_eq!(mode, OpenMode::CreateNew);
    }
}
