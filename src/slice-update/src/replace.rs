//! Swap the running executable for a new build.
//!
//! Two protocols, picked by [`ReplaceCapabilities`]:
//!
//! - Staging (Unix): the payload is written to a sibling `.new` file, made
//!   executable, and renamed over the install path. The install path always
//!   holds either the old or the new binary.
//! - Backup (Windows, where a running image cannot be replaced in place):
//!   the install path is renamed to `.old` first and the payload written in
//!   its place. A failed write is rolled back by renaming the backup into
//!   place again; only when that rename also fails can the install path end
//!   up empty, and the error then carries both failures plus the backup
//!   location.
//!
//! A payload stream that fails with `InvalidData` (a corrupt archive entry)
//! is reported as [`UpdateErrorKind::Format`]; every other failure is `Io`.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{UpdateError, UpdateErrorKind, UpdateResult};
use crate::platform::ReplaceCapabilities;

/// Suffix of the backup kept while the new binary is written.
pub const BACKUP_SUFFIX: &str = ".old";

/// Suffix of the staging file used when no backup is taken.
pub const STAGING_SUFFIX: &str = ".new";

/// Paths involved in one replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableSwap {
    /// Install path of the running executable
    pub current_path: PathBuf,
    /// Where the previous binary is parked while the new one is written
    pub backup_path: PathBuf,
    /// Sibling staging path for platforms that skip the backup
    pub new_path: PathBuf,
}

impl ExecutableSwap {
    /// Derive backup and staging paths next to `current_path`.
    pub fn for_path(current_path: &Path) -> Self {
        Self {
            current_path: current_path.to_path_buf(),
            backup_path: with_suffix(current_path, BACKUP_SUFFIX),
            new_path: with_suffix(current_path, STAGING_SUFFIX),
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Installs new executable bytes over an existing install path.
#[derive(Debug, Clone, Copy)]
pub struct BinaryReplacer {
    capabilities: ReplaceCapabilities,
}

impl BinaryReplacer {
    pub fn new(capabilities: ReplaceCapabilities) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> ReplaceCapabilities {
        self.capabilities
    }

    /// Replace `current_path` with the content of the file at `new_binary`.
    pub fn install_file(&self, current_path: &Path, new_binary: &Path) -> UpdateResult<()> {
        let mut file = File::open(new_binary).map_err(|e| {
            UpdateError::io(format!("Failed to open {}", new_binary.display()), e)
        })?;
        self.install(current_path, &mut file)
    }

    /// Replace `current_path` with the bytes read from `payload`.
    pub fn install(&self, current_path: &Path, payload: &mut dyn Read) -> UpdateResult<()> {
        let swap = ExecutableSwap::for_path(current_path);

        if self.capabilities.backup_before_write {
            self.swap_with_backup(&swap, payload)?;

            if self.capabilities.chmod_after_write {
                make_executable(&swap.current_path).map_err(|source| {
                    UpdateError::Permissions {
                        path: swap.current_path.clone(),
                        source,
                    }
                })?;
            }
        } else {
            self.swap_via_staging(&swap, payload)?;
        }

        tracing::info!("Installed new binary at {}", swap.current_path.display());
        Ok(())
    }

    fn swap_with_backup(&self, swap: &ExecutableSwap, payload: &mut dyn Read) -> UpdateResult<()> {
        // A leftover from an earlier update would block the rename on Windows.
        if swap.backup_path.exists() {
            if let Err(e) = fs::remove_file(&swap.backup_path) {
                tracing::debug!(
                    "Could not remove stale backup {}: {}",
                    swap.backup_path.display(),
                    e
                );
            }
        }

        fs::rename(&swap.current_path, &swap.backup_path).map_err(|e| {
            UpdateError::io(
                format!(
                    "Failed to move {} to {}",
                    swap.current_path.display(),
                    swap.backup_path.display()
                ),
                e,
            )
        })?;
        tracing::debug!("Moved current binary to {}", swap.backup_path.display());

        if let Err(forward) = write_payload(&swap.current_path, payload) {
            tracing::warn!(
                "Writing new binary failed ({}), restoring {}",
                forward,
                swap.backup_path.display()
            );
            return Err(rollback(swap, forward));
        }

        if let Err(e) = fs::remove_file(&swap.backup_path) {
            // Expected on Windows while the old image is still running.
            tracing::warn!(
                "Could not remove backup {}: {}",
                swap.backup_path.display(),
                e
            );
        }

        Ok(())
    }

    fn swap_via_staging(&self, swap: &ExecutableSwap, payload: &mut dyn Read) -> UpdateResult<()> {
        if let Err(e) = write_payload(&swap.new_path, payload) {
            let _ = fs::remove_file(&swap.new_path);
            return Err(match e.kind() {
                UpdateErrorKind::Format => UpdateError::Format {
                    message: e.into_inner().to_string(),
                },
                _ => UpdateError::io(
                    format!("Failed to write {}", swap.new_path.display()),
                    e.into_inner(),
                ),
            });
        }

        // The mode goes on before the rename so the install path is never
        // a non-executable file.
        if self.capabilities.chmod_after_write {
            if let Err(e) = make_executable(&swap.new_path) {
                let _ = fs::remove_file(&swap.new_path);
                return Err(UpdateError::io(
                    format!("Failed to mark {} executable", swap.new_path.display()),
                    e,
                ));
            }
        }

        if let Err(e) = fs::rename(&swap.new_path, &swap.current_path) {
            let _ = fs::remove_file(&swap.new_path);
            return Err(UpdateError::io(
                format!(
                    "Failed to move {} to {}",
                    swap.new_path.display(),
                    swap.current_path.display()
                ),
                e,
            ));
        }

        Ok(())
    }
}

/// Put the backup back after a failed write. Always attempted.
fn rollback(swap: &ExecutableSwap, forward: PayloadError) -> UpdateError {
    let cause = forward.kind();
    let forward = forward.into_inner();

    if swap.current_path.exists() {
        if let Err(e) = fs::remove_file(&swap.current_path) {
            tracing::debug!(
                "Could not remove partial binary {}: {}",
                swap.current_path.display(),
                e
            );
        }
    }

    match fs::rename(&swap.backup_path, &swap.current_path) {
        Ok(()) => {
            tracing::info!("Restored previous binary at {}", swap.current_path.display());
            UpdateError::RolledBack {
                path: swap.current_path.clone(),
                cause,
                source: forward,
            }
        }
        Err(rollback) => {
            tracing::error!(
                "Rollback failed: {} (previous binary left at {})",
                rollback,
                swap.backup_path.display()
            );
            UpdateError::Unrecoverable {
                path: swap.current_path.clone(),
                backup: swap.backup_path.clone(),
                forward,
                rollback,
            }
        }
    }
}

/// Which side of the copy failed.
#[derive(Debug)]
enum PayloadError {
    /// The payload stream could not be read
    Read(io::Error),
    /// The destination could not be created or written
    Write(io::Error),
}

impl PayloadError {
    fn kind(&self) -> UpdateErrorKind {
        match self {
            Self::Read(e) if e.kind() == io::ErrorKind::InvalidData => UpdateErrorKind::Format,
            Self::Read(_) | Self::Write(_) => UpdateErrorKind::Io,
        }
    }

    fn into_inner(self) -> io::Error {
        match self {
            Self::Read(e) | Self::Write(e) => e,
        }
    }
}

impl std::fmt::Display for PayloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(e) => write!(f, "reading payload: {}", e),
            Self::Write(e) => write!(f, "writing payload: {}", e),
        }
    }
}

fn write_payload(dest: &Path, payload: &mut dyn Read) -> Result<u64, PayloadError> {
    let mut file = File::create(dest).map_err(PayloadError::Write)?;
    let mut buffer = vec![0u8; 64 * 1024];
    let mut written: u64 = 0;

    loop {
        let n = match payload.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PayloadError::Read(e)),
        };
        file.write_all(&buffer[..n]).map_err(PayloadError::Write)?;
        written += n as u64;
    }

    file.flush().map_err(PayloadError::Write)?;
    file.sync_all().map_err(PayloadError::Write)?;
    Ok(written)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformKey;

    const OLD: &[u8] = b"#!old binary";
    const NEW: &[u8] = b"#!new binary, somewhat longer than the old one";

    fn staging_caps() -> ReplaceCapabilities {
        ReplaceCapabilities {
            backup_before_write: false,
            chmod_after_write: true,
        }
    }

    fn backup_caps() -> ReplaceCapabilities {
        ReplaceCapabilities {
            backup_before_write: true,
            chmod_after_write: true,
        }
    }

    fn install_fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("slice");
        fs::write(&current, OLD).unwrap();
        (dir, current)
    }

    /// Yields some bytes, then fails; optionally sabotages the rollback first.
    struct FailingReader {
        remaining: &'static [u8],
        delete_before_failing: Option<PathBuf>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.remaining.is_empty() {
                let n = self.remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&self.remaining[..n]);
                self.remaining = &self.remaining[n..];
                return Ok(n);
            }
            if let Some(path) = self.delete_before_failing.take() {
                fs::remove_file(path).unwrap();
            }
            Err(io::Error::new(io::ErrorKind::Other, "simulated disk full"))
        }
    }

    /// Fails the way a truncated archive entry does.
    struct CorruptReader;

    impl Read for CorruptReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "archive entry truncated",
            ))
        }
    }

    /// Records what the install path holds while the payload streams.
    struct WatchingReader {
        install_path: PathBuf,
        seen: Option<io::Result<Vec<u8>>>,
        remaining: &'static [u8],
    }

    impl Read for WatchingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.seen.is_none() {
                self.seen = Some(fs::read(&self.install_path));
            }
            let n = self.remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&self.remaining[..n]);
            self.remaining = &self.remaining[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_swap_paths() {
        let swap = ExecutableSwap::for_path(Path::new("/opt/bin/slice"));
        assert_eq!(swap.backup_path, PathBuf::from("/opt/bin/slice.old"));
        assert_eq!(swap.new_path, PathBuf::from("/opt/bin/slice.new"));
    }

    #[test]
    fn test_install_replaces_and_removes_backup() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);

        BinaryReplacer::new(backup_caps())
            .install(&current, &mut &NEW[..])
            .unwrap();

        assert_eq!(fs::read(&current).unwrap(), NEW);
        assert!(!swap.backup_path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&current).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_stale_backup_is_replaced() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);
        fs::write(&swap.backup_path, b"left over from last time").unwrap();

        BinaryReplacer::new(backup_caps())
            .install(&current, &mut &NEW[..])
            .unwrap();

        assert_eq!(fs::read(&current).unwrap(), NEW);
        assert!(!swap.backup_path.exists());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);
        let mut payload = FailingReader {
            remaining: b"partial",
            delete_before_failing: None,
        };

        let err = BinaryReplacer::new(backup_caps())
            .install(&current, &mut payload)
            .unwrap_err();

        assert!(matches!(err, UpdateError::RolledBack { .. }));
        assert!(err.left_working_binary());
        let text = err.to_string();
        assert!(text.contains("simulated disk full"));
        assert!(text.contains("previous binary restored"));

        assert_eq!(fs::read(&current).unwrap(), OLD);
        assert!(!swap.backup_path.exists());
    }

    #[test]
    fn test_failed_rollback_reports_both_errors() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);
        let mut payload = FailingReader {
            remaining: b"",
            delete_before_failing: Some(swap.backup_path.clone()),
        };

        let err = BinaryReplacer::new(backup_caps())
            .install(&current, &mut payload)
            .unwrap_err();

        match &err {
            UpdateError::Unrecoverable {
                forward,
                rollback,
                backup,
                ..
            } => {
                assert_eq!(forward.to_string(), "simulated disk full");
                assert_eq!(rollback.kind(), io::ErrorKind::NotFound);
                assert_eq!(backup, &swap.backup_path);
            }
            other => panic!("expected Unrecoverable, got {other:?}"),
        }
        assert!(!err.left_working_binary());
    }

    #[test]
    fn test_missing_current_binary_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("slice");
        let swap = ExecutableSwap::for_path(&current);

        let err = BinaryReplacer::new(backup_caps())
            .install(&current, &mut &NEW[..])
            .unwrap_err();

        assert_eq!(err.kind(), UpdateErrorKind::Io);
        assert!(!current.exists());
        assert!(!swap.backup_path.exists());
    }

    #[test]
    fn test_windows_capabilities_skip_chmod() {
        let (_dir, current) = install_fixture();
        let replacer = BinaryReplacer::new(ReplaceCapabilities {
            backup_before_write: true,
            chmod_after_write: false,
        });

        replacer.install(&current, &mut &NEW[..]).unwrap();
        assert_eq!(fs::read(&current).unwrap(), NEW);
    }

    #[test]
    fn test_staged_install_without_backup() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);
        let replacer = BinaryReplacer::new(staging_caps());

        replacer.install(&current, &mut &NEW[..]).unwrap();
        assert_eq!(fs::read(&current).unwrap(), NEW);
        assert!(!swap.new_path.exists());

        let mut payload = FailingReader {
            remaining: b"partial",
            delete_before_failing: None,
        };
        let err = replacer.install(&current, &mut payload).unwrap_err();
        assert_eq!(err.kind(), UpdateErrorKind::Io);
        assert_eq!(fs::read(&current).unwrap(), NEW);
        assert!(!swap.new_path.exists());
    }

    #[test]
    fn test_corrupt_payload_rolls_back_as_format() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);

        let err = BinaryReplacer::new(backup_caps())
            .install(&current, &mut CorruptReader)
            .unwrap_err();

        assert!(matches!(err, UpdateError::RolledBack { .. }));
        assert_eq!(err.kind(), UpdateErrorKind::Format);
        assert_eq!(fs::read(&current).unwrap(), OLD);
        assert!(!swap.backup_path.exists());
    }

    #[test]
    fn test_corrupt_payload_staged_is_format() {
        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);

        let err = BinaryReplacer::new(staging_caps())
            .install(&current, &mut CorruptReader)
            .unwrap_err();

        assert_eq!(err.kind(), UpdateErrorKind::Format);
        assert_eq!(fs::read(&current).unwrap(), OLD);
        assert!(!swap.new_path.exists());
    }

    #[test]
    fn test_linux_install_path_stays_runnable_during_write() {
        let (_dir, current) = install_fixture();
        let caps = ReplaceCapabilities::for_platform(&PlatformKey::new("linux", "amd64"));
        let mut payload = WatchingReader {
            install_path: current.clone(),
            seen: None,
            remaining: NEW,
        };

        BinaryReplacer::new(caps)
            .install(&current, &mut payload)
            .unwrap();

        let seen = payload.seen.take().unwrap().unwrap();
        assert_eq!(seen, OLD);
        assert_eq!(fs::read(&current).unwrap(), NEW);
    }

    #[cfg(unix)]
    #[test]
    fn test_staged_binary_is_executable_before_rename() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, current) = install_fixture();
        let swap = ExecutableSwap::for_path(&current);

        BinaryReplacer::new(staging_caps())
            .install(&current, &mut &NEW[..])
            .unwrap();

        assert_eq!(fs::read(&current).unwrap(), NEW);
        assert!(!swap.new_path.exists());
        let mode = fs::metadata(&current).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_install_file() {
        let (dir, current) = install_fixture();
        let download = dir.path().join("slice_windows_amd64.exe");
        fs::write(&download, NEW).unwrap();

        BinaryReplacer::new(backup_caps())
            .install_file(&current, &download)
            .unwrap();
        assert_eq!(fs::read(&current).unwrap(), NEW);
    }
}
