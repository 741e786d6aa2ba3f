//! Update command - replace the running executable with the latest release.

use std::io::{Write, stderr};

use anyhow::{Context, Result};
use clap::Parser;

use slice_update::{
    DownloadProgress, UpdateCheck, UpdateConfig, UpdateError, UpdateManager, UpdateOutcome,
    format_bytes,
};

use crate::styled_output::{print_dim, print_warning, println_info, println_success};

/// Update CLI.
#[derive(Debug, Default, Parser)]
pub struct UpdateCli {
    /// Only check for a newer release without installing it
    #[arg(long, short = 'c')]
    pub check: bool,

    /// Resolve the latest release from a JSON manifest instead of GitHub
    #[arg(long, value_name = "URL")]
    pub manifest: Option<String>,

    /// Deadline for the release query, in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Use a custom GitHub API base URL
    #[arg(long, hide = true)]
    pub url: Option<String>,
}

impl UpdateCli {
    /// Layer the command-line flags over the loaded config.
    pub fn apply_overrides(&self, mut config: UpdateConfig) -> UpdateConfig {
        if let Some(url) = &self.url {
            config.api_url = url.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.manifest_url = Some(manifest.clone());
        }
        if let Some(secs) = self.timeout {
            config.check_timeout_secs = secs;
        }
        config
    }

    /// Run the update command.
    pub fn run(self) -> Result<()> {
        let config = self.apply_overrides(UpdateConfig::load());
        let manager =
            UpdateManager::with_config(config).context("Failed to initialize update manager")?;

        tracing::debug!(
            "Updating {} ({}, {})",
            manager.current_exe().display(),
            manager.current_version(),
            manager.platform()
        );
        print_dim(&format!(
            "Checking {} for releases ({})",
            manager.source_description(),
            manager.platform()
        ));

        if self.check {
            return run_check(&manager);
        }
        run_update(&manager)
    }
}

fn run_check(manager: &UpdateManager) -> Result<()> {
    match manager.check().context("update check failed")? {
        UpdateCheck::UpToDate { version } => {
            println_success(&format!("Already up to date ({})", version));
        }
        UpdateCheck::Available {
            current,
            latest,
            asset,
        } => {
            println_info(&format!("Update available: {} -> {}", current, latest));
            print_dim(&format!("Asset: {}", asset.name));
            print_dim("Run `slice update` to install it.");
        }
    }
    Ok(())
}

fn run_update(manager: &UpdateManager) -> Result<()> {
    let mut progress = ProgressLine::default();
    let result = manager.update(|p| progress.update(p));
    progress.finish();

    match result {
        Ok(UpdateOutcome::AlreadyLatest { version }) => {
            println_success(&format!("Already up to date ({})", version));
            Ok(())
        }
        Ok(UpdateOutcome::Updated { from, to }) => {
            println_success(&format!("Updated {} -> {}", from, to));
            Ok(())
        }
        Err(err) => {
            warn_if_broken(&err);
            Err(err).context("update failed")
        }
    }
}

/// Say loudly when the executable on disk may no longer work.
fn warn_if_broken(err: &UpdateError) {
    if err.left_working_binary() {
        return;
    }
    if let UpdateError::Unrecoverable { path, backup, .. } = err {
        print_warning(&format!(
            "{} may be missing or incomplete; the previous binary is at {}",
            path.display(),
            backup.display()
        ));
        print_warning(&format!(
            "Restore it with: mv \"{}\" \"{}\"",
            backup.display(),
            path.display()
        ));
    }
}

/// Single-line download progress on stderr.
#[derive(Debug, Default)]
struct ProgressLine {
    last_shown: Option<u64>,
    active: bool,
}

impl ProgressLine {
    fn render(progress: &DownloadProgress) -> String {
        match progress.percentage() {
            Some(pct) => format!(
                "  Downloading... {:.0}% ({}/{})",
                pct.min(100.0),
                progress.downloaded_human(),
                progress.total_human()
            ),
            None => format!("  Downloading... {}", format_bytes(progress.downloaded)),
        }
    }

    /// Bucket used to skip redraws: whole percent, or 1 MiB steps when
    /// the size is unknown.
    fn bucket(progress: &DownloadProgress) -> u64 {
        match progress.percentage() {
            Some(pct) => pct as u64,
            None => progress.downloaded / (1024 * 1024),
        }
    }

    fn update(&mut self, progress: DownloadProgress) {
        let bucket = Self::bucket(&progress);
        if self.last_shown == Some(bucket) {
            return;
        }
        self.last_shown = Some(bucket);
        self.active = true;

        let mut err = stderr();
        let _ = write!(err, "\r{}", Self::render(&progress));
        let _ = err.flush();
    }

    fn finish(&mut self) {
        if self.active {
            let _ = writeln!(stderr());
            self.active = false;
        }
    }
}
