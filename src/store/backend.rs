use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tracing::instrument;

use crate::core::error::{ConfigError, Error};

/// Client for the managed key-value service's REST protocol. Commands are
/// encoded in the request path (`/set/{key}/ex/{ttl}`, `/get/{key}`,
/// `/del/{key}`) and every response wraps its payload in a `result` field.
/// Expiry is enforced server-side; nothing here deletes expired entries.
#[derive(Clone)]
pub(crate) struct RestClient {
    client: reqwest::Client,
    url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RestResponse {
    result: serde_json::Value,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("url", &self.url.as_str())
            .finish()
    }
}

impl RestClient {
    pub(crate) fn new(url: &str, token: &str) -> Result<Self, ConfigError> {
        let client = reqwest::ClientBuilder::new().build()?;

        Ok(Self {
            client,
            url: Url::parse(url.trim_end_matches('/'))?,
            token: token.to_string(),
        })
    }

    /// Builds a command URL with each segment percent-encoded, so a key
    /// containing URL-reserved characters still reaches the backend as the
    /// literal key.
    fn command_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.url.clone();

        url.path_segments_mut()
            .map_err(|_| Error::Backend("backend URL cannot be a base".to_string()))?
            .extend(segments);

        Ok(url)
    }

    #[instrument(skip_all)]
    pub(crate) async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), Error> {
        let url = self.command_url(&["set", key, "ex", &ttl.as_secs().to_string()])?;

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .body(value)
            .send()
            .await?;

        Self::into_result(response).await?;

        Ok(())
    }

    #[instrument(skip_all)]
    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let response = self
            .client
            .get(self.command_url(&["get", key])?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match Self::into_result(response).await?.result {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::String(value) => Ok(Some(value)),
            other => {
                tracing::warn!("unexpected result shape from backend: {:?}", other);
                Ok(None)
            }
        }
    }

    #[instrument(skip_all)]
    pub(crate) async fn delete(&self, key: &str) -> Result<(), Error> {
        let response = self
            .client
            .post(self.command_url(&["del", key])?)
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::into_result(response).await?;

        Ok(())
    }

    async fn into_result(response: reqwest::Response) -> Result<RestResponse, Error> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("{}: {}", status, body)));
        }

        Ok(response.json::<RestResponse>().await?)
    }
}
