use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::config::RetrieverConfig;
use crate::domain::{Bundle, BundleFile, DatasetId};
use crate::error::GoldError;

/// Where gold bundles come from.
pub trait GoldSource: Send + Sync {
    fn fetch_bundle(&self, id: &DatasetId) -> Result<Bundle, GoldError>;
}

impl<S: GoldSource + ?Sized> GoldSource for &S {
    fn fetch_bundle(&self, id: &DatasetId) -> Result<Bundle, GoldError> {
        (**self).fetch_bundle(id)
    }
}

/// JSON view GitHub serves for `/{owner}/{repo}/tree/{ref}/{path}` when asked
/// for `application/json`. Undocumented, so only the fields we need.
#[derive(Debug, Deserialize)]
pub struct TreeListing {
    pub payload: TreePayload,
}

#[derive(Debug, Deserialize)]
pub struct TreePayload {
    pub repo: TreeRepo,
    #[serde(rename = "refInfo")]
    pub ref_info: TreeRef,
    pub tree: Tree,
}

#[derive(Debug, Deserialize)]
pub struct TreeRepo {
    #[serde(rename = "ownerLogin")]
    pub owner_login: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TreeRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct Tree {
    #[serde(default)]
    pub items: Vec<TreeItem>,
}

#[derive(Debug, Deserialize)]
pub struct TreeItem {
    pub path: String,
    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
}

impl TreeItem {
    pub fn is_directory(&self) -> bool {
        self.content_type.as_deref() == Some("directory")
    }

    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Clone)]
pub struct GithubTreeSource {
    client: Client,
    remote_base: Url,
    raw_base: Url,
}

impl GithubTreeSource {
    pub fn new(config: &RetrieverConfig) -> Result<Self, GoldError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("clams-utils/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GoldError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| GoldError::Http(err.to_string()))?;
        Ok(Self {
            client,
            remote_base: parse_base(&config.remote_base)?,
            raw_base: parse_base(&config.raw_base)?,
        })
    }

    pub fn listing_url(&self, id: &DatasetId) -> Result<Url, GoldError> {
        join_segments(&self.remote_base, id.segments())
    }

    pub fn raw_url(&self, payload: &TreePayload, item: &TreeItem) -> Result<Url, GoldError> {
        let prefix = [
            payload.repo.owner_login.as_str(),
            payload.repo.name.as_str(),
            payload.ref_info.name.as_str(),
        ];
        join_segments(
            &self.raw_base,
            prefix.into_iter().chain(item.path.split('/')),
        )
    }

    pub fn fetch_listing(&self, id: &DatasetId) -> Result<TreePayload, GoldError> {
        let url = self.listing_url(id)?;
        debug!(%url, "requesting directory listing");
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|err| GoldError::Http(err.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GoldError::NotFound(id.to_string()));
        }
        let response = handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| GoldError::Http(err.to_string()))?;
        parse_listing(&body)
            .map(|listing| listing.payload)
            .map_err(|err| GoldError::UnexpectedListing {
                url: url.to_string(),
                reason: err.to_string(),
            })
    }

    fn download(&self, url: Url) -> Result<Vec<u8>, GoldError> {
        debug!(%url, "downloading raw file");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| GoldError::Http(err.to_string()))?;
        let response = handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| GoldError::Http(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

impl GoldSource for GithubTreeSource {
    fn fetch_bundle(&self, id: &DatasetId) -> Result<Bundle, GoldError> {
        let payload = self.fetch_listing(id)?;
        let mut files = Vec::new();
        for item in payload.tree.items.iter().filter(|item| !item.is_directory()) {
            let bytes = self.download(self.raw_url(&payload, item)?)?;
            files.push(BundleFile {
                name: item.file_name().to_string(),
                bytes,
            });
        }
        Ok(Bundle::new(files))
    }
}

pub fn parse_listing(body: &str) -> Result<TreeListing, serde_json::Error> {
    serde_json::from_str(body)
}

fn handle_status(response: Response) -> Result<Response, GoldError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response
        .text()
        .ok()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| "remote request failed".to_string());
    Err(GoldError::Status { status, message })
}

fn parse_base(value: &str) -> Result<Url, GoldError> {
    let url =
        Url::parse(value).map_err(|err| GoldError::InvalidRemote(format!("{value}: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(GoldError::InvalidRemote(format!("{value}: not a base URL")));
    }
    Ok(url)
}

fn join_segments<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, GoldError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| GoldError::InvalidRemote(format!("{base}: not a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
