use crate::errors::*;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PRODUCT_HEADER: &str = "x-sysdig-product";
pub const PRODUCT: &str = "SDS";
pub const TIMEOUT: Duration = Duration::from_secs(30);

pub const IMAGE_FILE: &str = "image.json";
pub const CHECK_FILE: &str = "check.json";
pub const VULNS_FILE: &str = "vulns.json";

/// The three scanning endpoints a report is built from
#[async_trait]
pub trait ScanApi: Send + Sync {
    async fn image(&self, image_id: &str) -> Result<Value>;

    async fn policy_check(&self, image_id: &str, tag: &str) -> Result<Value>;

    async fn vulnerabilities(&self, image_id: &str) -> Result<Value>;
}

pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("API token contains invalid characters")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            HeaderName::from_static(PRODUCT_HEADER),
            HeaderValue::from_static(PRODUCT),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(TIMEOUT)
            .build()
            .context("Failed to setup http client")?;

        Ok(HttpApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, image_id: &str, suffix: &str) -> String {
        format!(
            "{}/api/scanning/v1/anchore/images/{}{}",
            self.base_url, image_id, suffix
        )
    }

    async fn get(&self, url: String, query: &[(&str, &str)]) -> Result<Value> {
        info!("Url={}", url);
        let json = self
            .client
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(json)
    }
}

#[async_trait]
impl ScanApi for HttpApi {
    async fn image(&self, image_id: &str) -> Result<Value> {
        self.get(self.url(image_id, ""), &[]).await
    }

    async fn policy_check(&self, image_id: &str, tag: &str) -> Result<Value> {
        let query = [("tag", tag), ("details", "true"), ("history", "true")];
        self.get(self.url(image_id, "/check"), &query).await
    }

    async fn vulnerabilities(&self, image_id: &str) -> Result<Value> {
        self.get(self.url(image_id, "/vuln/os"), &[]).await
    }
}

/// Responses previously written by the `fetch` subcommand
pub struct SavedResponses {
    dir: PathBuf,
}

impl SavedResponses {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SavedResponses { dir: dir.into() }
    }

    async fn read(&self, name: &str) -> Result<Value> {
        let path = self.dir.join(name);
        debug!("Reading saved response from {:?}", path);
        let buf = tokio::fs::read(&path)
            .await
            .with_context(|| anyhow!("Failed to read {:?}", path))?;
        let json = serde_json::from_slice(&buf)
            .with_context(|| anyhow!("Failed to parse {:?} as json", path))?;
        Ok(json)
    }
}

#[async_trait]
impl ScanApi for SavedResponses {
    async fn image(&self, _image_id: &str) -> Result<Value> {
        self.read(IMAGE_FILE).await
    }

    async fn policy_check(&self, _image_id: &str, _tag: &str) -> Result<Value> {
        self.read(CHECK_FILE).await
    }

    async fn vulnerabilities(&self, _image_id: &str) -> Result<Value> {
        self.read(VULNS_FILE).await
    }
}

pub async fn save_response(dir: &Path, name: &str, json: &Value) -> Result<()> {
    let path = dir.join(name);
    let buf = serde_json::to_vec_pretty(json)?;
    tokio::fs::write(&path, buf)
        .await
        .with_context(|| anyhow!("Failed to write {:?}", path))?;
    info!("Wrote {:?}", path);
    Ok(())
}
