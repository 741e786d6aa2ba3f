//! Update manager - main API for update operations.

use std::path::{Path, PathBuf};

use crate::CURRENT_VERSION;
use crate::api::{Asset, Release, ReleaseSource, source_from_config};
use crate::config::UpdateConfig;
use crate::download::{AssetFetcher, DownloadProgress, Downloader};
use crate::error::{UpdateError, UpdateResult};
use crate::extract::with_archived_binary;
use crate::platform::{PlatformKey, ReplaceCapabilities, is_archive, select_asset};
use crate::replace::BinaryReplacer;

/// Steps of one update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Idle,
    ResolvingRelease,
    SelectingAsset,
    Downloading,
    Extracting,
    Replacing,
    /// New binary in place.
    Committed,
    /// Replacement failed, previous binary restored.
    RolledBack,
    /// Replacement and restore both failed.
    FailedUnrecoverable,
}

impl UpdatePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ResolvingRelease => "resolving release",
            Self::SelectingAsset => "selecting asset",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::Replacing => "replacing",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
            Self::FailedUnrecoverable => "failed unrecoverably",
        }
    }
}

impl std::fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a check that does not install anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    /// The latest release tag equals the running version
    UpToDate { version: String },
    /// A different release is published and has an asset for this platform
    Available {
        current: String,
        latest: String,
        asset: Asset,
    },
}

/// Outcome of a successful update operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Already on latest version; nothing was downloaded or touched
    AlreadyLatest { version: String },
    /// Successfully updated
    Updated { from: String, to: String },
}

/// What one attempt is going to install.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    pub selected_asset: Asset,
    pub local_archive_path: PathBuf,
    pub is_archive: bool,
}

/// Manager for update operations.
///
/// Everything the attempt depends on is held here explicitly; nothing is
/// read from process-wide state after construction.
pub struct UpdateManager {
    source: Box<dyn ReleaseSource>,
    fetcher: Box<dyn AssetFetcher>,
    platform: PlatformKey,
    replacer: BinaryReplacer,
    current_version: String,
    current_exe: PathBuf,
    binary_name: String,
}

impl UpdateManager {
    /// Create a new update manager with the config from disk.
    pub fn new() -> UpdateResult<Self> {
        Self::with_config(UpdateConfig::load())
    }

    /// Create with a specific config, for the running process.
    pub fn with_config(config: UpdateConfig) -> UpdateResult<Self> {
        let source = source_from_config(&config)?;
        let fetcher = Box::new(Downloader::new(&config)?);
        let current_exe = current_exe_path()?;
        let platform = PlatformKey::current();

        Ok(Self::from_parts(
            source,
            fetcher,
            platform.clone(),
            ReplaceCapabilities::for_platform(&platform),
            CURRENT_VERSION.to_string(),
            current_exe,
            config.binary_name,
        ))
    }

    /// Assemble a manager from explicit collaborators.
    pub fn from_parts(
        source: Box<dyn ReleaseSource>,
        fetcher: Box<dyn AssetFetcher>,
        platform: PlatformKey,
        capabilities: ReplaceCapabilities,
        current_version: String,
        current_exe: PathBuf,
        binary_name: String,
    ) -> Self {
        Self {
            source,
            fetcher,
            platform,
            replacer: BinaryReplacer::new(capabilities),
            current_version,
            current_exe,
            binary_name,
        }
    }

    pub fn current_version(&self) -> &str {
        &self.current_version
    }

    pub fn current_exe(&self) -> &Path {
        &self.current_exe
    }

    pub fn platform(&self) -> &PlatformKey {
        &self.platform
    }

    /// Where releases are looked up.
    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Check for an update without downloading or touching any file.
    pub fn check(&self) -> UpdateResult<UpdateCheck> {
        let release = self.resolve()?;
        if self.is_current(&release) {
            return Ok(UpdateCheck::UpToDate {
                version: release.tag,
            });
        }

        let asset = self.select(&release)?.clone();
        Ok(UpdateCheck::Available {
            current: self.current_version.clone(),
            latest: release.tag,
            asset,
        })
    }

    /// Full update flow: resolve -> select -> download -> extract -> replace.
    pub fn update<F>(&self, mut on_progress: F) -> UpdateResult<UpdateOutcome>
    where
        F: FnMut(DownloadProgress),
    {
        let release = self.resolve()?;
        if self.is_current(&release) {
            tracing::info!("Already on {}", release.tag);
            return Ok(UpdateOutcome::AlreadyLatest {
                version: release.tag,
            });
        }
        tracing::info!("New version available: {}", release.tag);

        let asset = self.select(&release)?;

        // Dropping the directory removes the download on every exit path.
        let workdir = tempfile::Builder::new()
            .prefix("slice-update-")
            .tempdir()
            .map_err(|e| UpdateError::io("Failed to create temporary directory", e))?;

        // Asset names come from the network; never let one escape the workdir.
        let file_name = Path::new(&asset.name)
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "asset".into());
        let plan = UpdatePlan {
            selected_asset: asset.clone(),
            local_archive_path: workdir.path().join(file_name),
            is_archive: is_archive(&asset.name),
        };

        self.enter(UpdatePhase::Downloading);
        let bytes = self.fetcher.fetch(
            &plan.selected_asset.download_url,
            &plan.local_archive_path,
            &mut on_progress,
        )?;
        tracing::debug!(
            "Downloaded {} ({} bytes) to {}",
            plan.selected_asset.name,
            bytes,
            plan.local_archive_path.display()
        );

        self.install(&plan).inspect_err(|e| {
            if let Some(phase) = e.phase() {
                self.enter(phase);
            }
        })?;
        self.enter(UpdatePhase::Committed);

        Ok(UpdateOutcome::Updated {
            from: self.current_version.clone(),
            to: release.tag,
        })
    }

    fn resolve(&self) -> UpdateResult<Release> {
        self.enter(UpdatePhase::ResolvingRelease);
        let release = self.source.latest_release()?;
        tracing::debug!(
            "Latest release from {}: {} ({} assets)",
            self.source.describe(),
            release.tag,
            release.assets.len()
        );
        Ok(release)
    }

    /// Plain tag equality. Tags are opaque, so no version ordering is implied.
    fn is_current(&self, release: &Release) -> bool {
        release.tag == self.current_version
    }

    fn select<'a>(&self, release: &'a Release) -> UpdateResult<&'a Asset> {
        self.enter(UpdatePhase::SelectingAsset);
        let asset = select_asset(release, &self.platform)?;
        tracing::info!("Selected asset {} for {}", asset.name, self.platform);
        Ok(asset)
    }

    fn install(&self, plan: &UpdatePlan) -> UpdateResult<()> {
        if plan.is_archive {
            self.enter(UpdatePhase::Extracting);
            with_archived_binary(&plan.local_archive_path, &self.binary_name, |payload| {
                self.enter(UpdatePhase::Replacing);
                self.replacer.install(&self.current_exe, payload)
            })
        } else {
            self.enter(UpdatePhase::Replacing);
            self.replacer
                .install_file(&self.current_exe, &plan.local_archive_path)
        }
    }

    fn enter(&self, phase: UpdatePhase) {
        tracing::debug!(phase = %phase, "update phase");
    }
}

/// Resolve the install path of the running executable.
pub fn current_exe_path() -> UpdateResult<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| UpdateError::io("Failed to locate current executable", e))?;
    // Follow symlinks so the real file is replaced, not the link.
    dunce::canonicalize(&exe)
        .map_err(|e| UpdateError::io(format!("Failed to resolve {}", exe.display()), e))
}
