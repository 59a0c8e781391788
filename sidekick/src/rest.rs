//! A small JSON-over-HTTP client for writing fetchers and mutation functions.

use crate::{error::ClientError, QueryError};
use reqwest::{Response, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Sends JSON requests relative to a base URL.
///
/// ```
/// use sidekick::rest::RestClient;
///
/// let api = RestClient::new("http://localhost:4000").unwrap();
/// assert_eq!(api.url("/superheroes/1").unwrap().as_str(), "http://localhost:4000/superheroes/1");
/// ```
#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url
}

impl RestClient {
    pub fn new(base_url: &str) -> Result<Self, QueryError> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Uses an existing `reqwest` client, e.g. one with custom timeouts or headers.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, QueryError> {
        // Without the trailing slash `join` would replace the last path segment
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url =
            Url::parse(&normalized).map_err(|_| ClientError::InvalidUrl(base_url.to_string()))?;
        Ok(RestClient { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves `path` against the base URL. A leading `/` is ignored, so the base URL's own
    /// path is kept.
    pub fn url(&self, path: &str) -> Result<Url, QueryError> {
        let path = path.trim_start_matches('/');
        self.base_url
            .join(path)
            .map_err(|_| ClientError::InvalidUrl(path.to_string()).into())
    }

    /// Appends `segments` to the base URL, percent-encoding each one, so values like email
    /// addresses can't change the shape of the URL.
    pub fn segments_url(&self, segments: &[&str]) -> Result<Url, QueryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, QueryError> {
        self.get_json_url(self.url(path)?).await
    }

    /// Like [`get_json`](#method.get_json), with the path given as separate segments. See
    /// [`segments_url`](#method.segments_url).
    pub async fn get_json_segments<T: DeserializeOwned>(
        &self,
        segments: &[&str]
    ) -> Result<T, QueryError> {
        self.get_json_url(self.segments_url(segments)?).await
    }

    async fn get_json_url<T: DeserializeOwned>(&self, url: Url) -> Result<T, QueryError> {
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        let data = check_status(response)?.json::<T>().await?;
        Ok(data)
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, QueryError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned
    {
        let url = self.url(path)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        let data = check_status(response)?.json::<T>().await?;
        Ok(data)
    }
}

fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            url: response.url().to_string(),
            status: status.as_u16()
        })
    }
}
