//! Where a catalog comes from

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{HaggleError, Result};

use super::Catalog;

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogSource {
    /// CSV over HTTP (a published spreadsheet or any CSV endpoint)
    Remote(String),
    /// CSV file on disk
    File(PathBuf),
    /// The catalog compiled into the binary
    Builtin,
}

impl CatalogSource {
    pub async fn load(&self) -> Result<Catalog> {
        let catalog = match self {
            CatalogSource::Remote(url) => Catalog::parse_csv(&fetch(url).await?)?,
            CatalogSource::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    HaggleError::CatalogFetch(format!("{}: {}", path.display(), e))
                })?;
                Catalog::parse_csv(&text)?
            }
            CatalogSource::Builtin => Catalog::builtin(),
        };

        if catalog.is_empty() {
            return Err(HaggleError::CatalogParse(format!("{} has no items", self)));
        }
        tracing::info!(source = %self, items = catalog.items().len(), "catalog loaded");
        Ok(catalog)
    }
}

impl std::fmt::Display for CatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogSource::Remote(url) => write!(f, "{}", url),
            CatalogSource::File(path) => write!(f, "{}", path.display()),
            CatalogSource::Builtin => write!(f, "builtin catalog"),
        }
    }
}

async fn fetch(url: &str) -> Result<String> {
    let url = export_url(url);
    tracing::debug!(%url, "fetching catalog");

    let response = reqwest::Client::new()
        .get(&url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(HaggleError::CatalogFetch(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }
    Ok(response.text().await?)
}

/// Rewrite a Google Sheets editor link into its CSV export link.
///
/// `.../spreadsheets/d/<key>/edit?gid=7#gid=7` becomes
/// `.../spreadsheets/d/<key>/export?format=csv&gid=7`. Any other URL is
/// returned unchanged.
pub fn export_url(url: &str) -> String {
    let url = url.trim();
    if !url.contains("docs.google.com/spreadsheets/d/") {
        return url.to_string();
    }
    let Some(edit) = url.find("/edit") else {
        return url.to_string();
    };

    let base = &url[..edit];
    let gid = url[edit..]
        .split(|c: char| c == '?' || c == '&' || c == '#')
        .find_map(|part| part.strip_prefix("gid="))
        .filter(|gid| !gid.is_empty());

    match gid {
        Some(gid) => format!("{}/export?format=csv&gid={}", base, gid),
        None => format!("{}/export?format=csv", base),
    }
}
