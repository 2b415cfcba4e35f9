//! HTTP client for calling another running instance
//!
//! Each call is a single GET request. There are no retries: a failure is
//! reported to the calling handler as it happened.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Use a preconfigured reqwest client (timeouts, proxies, ...).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Join `path` onto `base`, keeping any path already present in `base`.
    pub fn join(base: &str, path: &str) -> Result<Url> {
        let mut base = parse_url(base)?;
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// GET `url` and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    /// GET `url` and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        Ok(response.json::<T>().await?)
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let url = parse_url(url)?;
        debug!(url = %url, "PeerClient: GET");

        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Peer {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Default for PeerClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| Error::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
