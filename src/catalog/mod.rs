//! HTTP client for the public gem catalog.

pub mod names;
pub mod parse;

pub use names::{GemNameSource, GemSearch, NameList};

use crate::config::HttpConfig;
use crate::error::{HarvestError, Result};
use crate::models::{GemDetail, VersionRecord};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use url::Url;

/// Fetches and extracts versions pages and version detail pages
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: Url,
}

impl CatalogClient {
    /// Creates a client for the catalog rooted at `catalog_url`
    pub fn new(catalog_url: &str, http: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&http.user_agent)
            .map_err(|e| HarvestError::Config(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .timeout(http.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(catalog_url)?,
        })
    }

    /// URL of the versions page of `name`
    pub fn versions_url(&self, name: &str) -> Result<Url> {
        Ok(self.base_url.join(&format!("gems/{name}/versions"))?)
    }

    /// GETs `url` and returns the full body of a 200 response
    ///
    /// Any other status is a [`HarvestError::Status`] carrying the URL.
    pub async fn get_html(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Fetches and parses the versions page of `name`
    pub async fn fetch_versions(&self, name: &str) -> Result<Vec<VersionRecord>> {
        let url = self.versions_url(name)?;
        let html = self.get_html(&url).await?;
        parse::parse_versions_page(name, &url, &html)
    }

    /// Fetches a version's detail page and builds the document to store
    pub async fn fetch_details(&self, record: &VersionRecord) -> Result<GemDetail> {
        let url = Url::parse(&record.url)?;
        let html = self.get_html(&url).await?;
        let fields = parse::parse_detail_page(&html)?;
        Ok(GemDetail::from_record(
            record.clone(),
            fields.checksum,
            fields.description,
        ))
    }
}

fn normalize_base(catalog_url: &str) -> Result<Url> {
    let mut url = Url::parse(catalog_url.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
