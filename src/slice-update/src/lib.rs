//! Slice Update - self-update system for the slice CLI
//!
//! Replaces the running `slice` executable with the latest published build:
//! - Resolves the latest release from GitHub (or a static JSON manifest)
//! - Picks the asset for the running OS/architecture
//! - Downloads it into a scoped temporary directory
//! - Streams the binary out of `.tar.gz` archives
//! - Swaps the executable with backup and rollback
//!
//! Everything is blocking and runs on the calling thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use slice_update::{UpdateManager, UpdateOutcome};
//!
//! let manager = UpdateManager::new()?;
//! match manager.update(|_| {})? {
//!     UpdateOutcome::AlreadyLatest { version } => println!("Already up to date ({version})"),
//!     UpdateOutcome::Updated { from, to } => println!("Updated {from} -> {to}"),
//! }
//! ```

mod api;
mod config;
mod download;
mod error;
mod extract;
mod http;
mod manager;
mod platform;
mod replace;

pub use api::{
    Asset, GitHubReleaseSource, ManifestReleaseSource, Release, ReleaseSource, parse_github_release,
    parse_manifest, source_from_config,
};
pub use config::UpdateConfig;
pub use download::{AssetFetcher, DownloadProgress, Downloader, format_bytes};
pub use error::{UpdateError, UpdateErrorKind, UpdateResult};
pub use extract::{read_archived_binary, with_archived_binary};
pub use http::{USER_AGENT, create_blocking_client};
pub use manager::{
    UpdateCheck, UpdateManager, UpdateOutcome, UpdatePhase, UpdatePlan, current_exe_path,
};
pub use platform::{PlatformKey, ReplaceCapabilities, is_archive, select_asset};
pub use replace::{BACKUP_SUFFIX, BinaryReplacer, ExecutableSwap};

/// Version string of the running binary, compared verbatim against release tags.
///
/// Release tags look like `v1.2.3`; builds made from a tag can pin the exact
/// string through `SLICE_RELEASE_TAG`.
pub const CURRENT_VERSION: &str = match option_env!("SLICE_RELEASE_TAG") {
    Some(tag) => tag,
    None => concat!("v", env!("CARGO_PKG_VERSION")),
};

/// GitHub account that publishes slice releases
pub const REPO_OWNER: &str = "archangelgroupco";

/// GitHub repository that publishes slice releases
pub const REPO_NAME: &str = "slice";

/// Name of the executable inside release archives
pub const BINARY_NAME: &str = "slice";

/// Default GitHub REST API base URL
pub const GITHUB_API_URL: &str = "https://api.github.com";
