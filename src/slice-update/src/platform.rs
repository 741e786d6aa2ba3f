//! Platform detection and asset selection.
//!
//! Release assets are named after Go's `GOOS`/`GOARCH` pairs
//! (`slice_linux_amd64.tar.gz`, `slice_windows_amd64.exe`), so the Rust
//! target names are translated into that vocabulary here.

use crate::api::{Asset, Release};
use crate::error::{UpdateError, UpdateResult};

/// Suffix of archived assets.
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Suffix of bare Windows executables.
pub const EXE_SUFFIX: &str = ".exe";

/// Operating system and CPU architecture, in release-asset naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformKey {
    pub os_name: String,
    pub arch_name: String,
}

impl PlatformKey {
    pub fn new(os_name: impl Into<String>, arch_name: impl Into<String>) -> Self {
        Self {
            os_name: os_name.into(),
            arch_name: arch_name.into(),
        }
    }

    /// Detect the platform this process is running on.
    pub fn current() -> Self {
        Self::new(
            os_name(std::env::consts::OS),
            arch_name(std::env::consts::ARCH),
        )
    }

    /// Whether this is a Windows target.
    pub fn is_windows(&self) -> bool {
        self.os_name == "windows"
    }

    /// Expected asset-name fragment, e.g. `linux_amd64.tar.gz`.
    ///
    /// Windows assets are bare executables; everything else ships as a
    /// gzip-compressed tarball.
    pub fn asset_fragment(&self) -> String {
        let suffix = if self.is_windows() {
            EXE_SUFFIX
        } else {
            ARCHIVE_SUFFIX
        };
        format!("{}_{}{}", self.os_name, self.arch_name, suffix)
    }
}

impl std::fmt::Display for PlatformKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os_name, self.arch_name)
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Whether an asset name denotes an archive that must be unpacked.
pub fn is_archive(name: &str) -> bool {
    name.ends_with(ARCHIVE_SUFFIX)
}

/// Pick the first asset whose name contains the platform fragment.
pub fn select_asset<'a>(release: &'a Release, platform: &PlatformKey) -> UpdateResult<&'a Asset> {
    let fragment = platform.asset_fragment();
    release
        .assets
        .iter()
        .find(|asset| asset.name.contains(&fragment))
        .ok_or(UpdateError::AssetNotFound { fragment })
}

/// How the binary replacer has to behave on a given platform.
///
/// Picked once per process so the replacement steps read the same on every
/// platform; only these two switches differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceCapabilities {
    /// Move the live executable aside before writing the new one.
    pub backup_before_write: bool,
    /// Set the executable mode bits on the written binary.
    pub chmod_after_write: bool,
}

impl ReplaceCapabilities {
    /// Capabilities for the given platform.
    ///
    /// Windows locks a running image, so it is renamed aside before the new
    /// one is written. Unix stages the new binary next to the old one and
    /// renames it over the install path, which never leaves that path empty.
    /// Only Unix tracks an execute bit.
    pub fn for_platform(platform: &PlatformKey) -> Self {
        Self {
            backup_before_write: platform.is_windows(),
            chmod_after_write: !platform.is_windows(),
        }
    }

    /// Capabilities for the running process.
    pub fn current() -> Self {
        Self::for_platform(&PlatformKey::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(names: &[&str]) -> Release {
        Release {
            tag: "v1.0.0".to_string(),
            assets: names
                .iter()
                .map(|name| Asset {
                    name: name.to_string(),
                    download_url: format!("https://dl/{name}"),
                })
                .collect(),
        }
    }

    #[test]
    fn test_asset_fragment() {
        assert_eq!(
            PlatformKey::new("linux", "amd64").asset_fragment(),
            "linux_amd64.tar.gz"
        );
        assert_eq!(
            PlatformKey::new("windows", "amd64").asset_fragment(),
            "windows_amd64.exe"
        );
        assert_eq!(
            PlatformKey::new("darwin", "arm64").asset_fragment(),
            "darwin_arm64.tar.gz"
        );
    }

    #[test]
    fn test_select_linux_asset() {
        let release = release(&[
            "windows_amd64.exe",
            "linux_amd64.tar.gz",
            "darwin_arm64.tar.gz",
        ]);
        let asset = select_asset(&release, &PlatformKey::new("linux", "amd64")).unwrap();
        assert_eq!(asset.name, "linux_amd64.tar.gz");
    }

    #[test]
    fn test_first_match_wins() {
        let release = release(&[
            "slice_linux_amd64.tar.gz",
            "slice-debug_linux_amd64.tar.gz",
        ]);
        let asset = select_asset(&release, &PlatformKey::new("linux", "amd64")).unwrap();
        assert_eq!(asset.name, "slice_linux_amd64.tar.gz");
    }

    #[test]
    fn test_no_matching_asset() {
        let release = release(&["windows_amd64.exe", "darwin_arm64.tar.gz"]);
        let err = select_asset(&release, &PlatformKey::new("linux", "arm64")).unwrap_err();
        assert!(matches!(
            err,
            UpdateError::AssetNotFound { ref fragment } if fragment == "linux_arm64.tar.gz"
        ));
    }

    #[test]
    fn test_translates_rust_target_names() {
        assert_eq!(os_name("macos"), "darwin");
        assert_eq!(os_name("linux"), "linux");
        assert_eq!(arch_name("x86_64"), "amd64");
        assert_eq!(arch_name("aarch64"), "arm64");
        assert_eq!(arch_name("x86"), "386");
        assert_eq!(arch_name("riscv64"), "riscv64");
    }

    #[test]
    fn test_current_platform_is_named() {
        let key = PlatformKey::current();
        assert!(!key.os_name.is_empty());
        assert!(!key.arch_name.is_empty());
        assert_ne!(key.os_name, "macos");
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive("slice_linux_amd64.tar.gz"));
        assert!(!is_archive("slice_windows_amd64.exe"));
    }

    #[test]
    fn test_capabilities_per_platform() {
        let windows = ReplaceCapabilities::for_platform(&PlatformKey::new("windows", "amd64"));
        assert!(windows.backup_before_write);
        assert!(!windows.chmod_after_write);

        let linux = ReplaceCapabilities::for_platform(&PlatformKey::new("linux", "amd64"));
        assert!(!linux.backup_before_write);
        assert!(linux.chmod_after_write);
    }
}
