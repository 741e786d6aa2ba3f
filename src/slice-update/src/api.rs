//! Release index clients.
//!
//! A release index answers one question: what is the latest published
//! release and which files are attached to it. The GitHub releases API and a
//! static JSON manifest both satisfy that contract, so the orchestrator only
//! sees the [`ReleaseSource`] trait.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::UpdateConfig;
use crate::error::{UpdateError, UpdateResult};
use crate::http::create_blocking_client;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// File name as published (e.g. `slice_linux_amd64.tar.gz`)
    pub name: String,
    /// Direct download URL
    pub download_url: String,
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Opaque version identifier (the git tag)
    pub tag: String,
    /// Attached assets, in the order the index listed them
    pub assets: Vec<Asset>,
}

/// Anything that can report the latest release.
pub trait ReleaseSource {
    /// Fetch the latest published release. Single attempt, no retries.
    fn latest_release(&self) -> UpdateResult<Release>;

    /// Human-readable location, used in log lines and messages.
    fn describe(&self) -> String;
}

/// Build the release source selected by the config.
pub fn source_from_config(config: &UpdateConfig) -> UpdateResult<Box<dyn ReleaseSource>> {
    let client = create_blocking_client(config.check_timeout())
        .map_err(|message| UpdateError::Transient { message })?;

    Ok(match &config.manifest_url {
        Some(url) => Box::new(ManifestReleaseSource::with_client(client, url.clone())),
        None => Box::new(GitHubReleaseSource::with_client(
            client,
            config.api_url.clone(),
            config.owner.clone(),
            config.repo.clone(),
        )),
    })
}

// ============================================================================
// GitHub
// ============================================================================

#[derive(Debug, Deserialize)]
struct GitHubRelease {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    #[serde(default)]
    name: String,
    #[serde(default)]
    browser_download_url: String,
}

/// Client for the GitHub "latest release" endpoint.
pub struct GitHubReleaseSource {
    client: Client,
    api_url: String,
    owner: String,
    repo: String,
}

impl GitHubReleaseSource {
    /// Create a source for `owner/repo` using an existing client.
    pub fn with_client(client: Client, api_url: String, owner: String, repo: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner,
            repo,
        }
    }

    fn latest_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, self.owner, self.repo
        )
    }
}

impl ReleaseSource for GitHubReleaseSource {
    fn latest_release(&self) -> UpdateResult<Release> {
        let body = fetch_text(
            self.client
                .get(self.latest_url())
                .header(reqwest::header::ACCEPT, "application/vnd.github+json"),
        )?;
        parse_github_release(&body)
    }

    fn describe(&self) -> String {
        format!("github.com/{}/{}", self.owner, self.repo)
    }
}

/// Parse a GitHub release payload.
pub fn parse_github_release(body: &str) -> UpdateResult<Release> {
    let raw: GitHubRelease = serde_json::from_str(body).map_err(|e| UpdateError::Protocol {
        message: e.to_string(),
    })?;

    build_release(
        raw.tag_name,
        raw.assets
            .into_iter()
            .map(|a| (a.name, a.browser_download_url)),
    )
}

// ============================================================================
// Static manifest
// ============================================================================

#[derive(Debug, Deserialize)]
struct ManifestRelease {
    #[serde(default)]
    tag: String,
    #[serde(default)]
    assets: Vec<ManifestAsset>,
}

#[derive(Debug, Deserialize)]
struct ManifestAsset {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
}

/// Client for a static JSON manifest: `{"tag": "...", "assets": [{"name", "url"}]}`.
pub struct ManifestReleaseSource {
    client: Client,
    url: String,
}

impl ManifestReleaseSource {
    /// Create a source reading the manifest at `url`.
    pub fn with_client(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

impl ReleaseSource for ManifestReleaseSource {
    fn latest_release(&self) -> UpdateResult<Release> {
        let body = fetch_text(self.client.get(&self.url))?;
        parse_manifest(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Parse a static manifest payload.
pub fn parse_manifest(body: &str) -> UpdateResult<Release> {
    let raw: ManifestRelease = serde_json::from_str(body).map_err(|e| UpdateError::Protocol {
        message: e.to_string(),
    })?;

    build_release(raw.tag, raw.assets.into_iter().map(|a| (a.name, a.url)))
}

// ============================================================================
// Shared
// ============================================================================

/// Send a request and return the body of a successful response.
fn fetch_text(request: reqwest::blocking::RequestBuilder) -> UpdateResult<String> {
    let response = request.send().map_err(|e| UpdateError::Transient {
        message: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        let message = if status.as_u16() == 404 {
            "no published release found (HTTP 404)".to_string()
        } else {
            format!("HTTP {}", status)
        };
        return Err(UpdateError::Transient { message });
    }

    response.text().map_err(|e| UpdateError::Transient {
        message: e.to_string(),
    })
}

fn build_release(
    tag: String,
    assets: impl Iterator<Item = (String, String)>,
) -> UpdateResult<Release> {
    if tag.trim().is_empty() {
        return Err(UpdateError::Protocol {
            message: "release has an empty tag".to_string(),
        });
    }

    let assets = assets
        .filter(|(name, url)| !name.is_empty() && !url.is_empty())
        .map(|(name, download_url)| Asset { name, download_url })
        .collect();

    Ok(Release { tag, assets })
}
