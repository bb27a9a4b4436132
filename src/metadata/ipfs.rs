use super::{ContentId, MetadataResolver};
use crate::Result;
use anyhow::{anyhow, Context};
use reqwest::{blocking::Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Fetches documents from an HTTP IPFS gateway.
pub struct IpfsGateway {
  client: Client,
  url: String,
}

impl IpfsGateway {
  pub fn new(url: &str) -> Result<Self> {
    Ok(Self {
      client: Client::builder().timeout(Duration::from_secs(10)).build()?,
      url: url.trim_end_matches('/').to_string(),
    })
  }

  fn document_url(&self, content_id: &ContentId) -> String {
    format!("{}/ipfs/{}", self.url, content_id)
  }
}

impl MetadataResolver for IpfsGateway {
  fn resolve(&self, content_id: &ContentId) -> Result<Option<Value>> {
    let url = self.document_url(content_id);
    log::debug!("fetching metadata {url}");

    let response = self
      .client
      .get(&url)
      .send()
      .with_context(|| format!("failed to fetch {url}"))?;

    match response.status() {
      StatusCode::NOT_FOUND => Ok(None),
      status if status.is_success() => Ok(Some(
        response
          .json()
          .with_context(|| format!("metadata at {url} is not JSON"))?,
      )),
      status => Err(anyhow!("gateway answered {status} for {url}")),
    }
  }
}
