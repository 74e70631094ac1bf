//! Authenticated JSON calls against one upstream base URL
//!
//! Every request carries `Authorization: Bearer <token>`, `Content-Type:
//! application/json` and `Cache-Control: no-cache`. Non-2xx replies and
//! bodies that are not JSON become [`HarvestError::Upstream`].

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::auth::Token;
use crate::config::HttpSettings;
use crate::error::{HarvestError, HarvestResult};

pub(crate) struct ApiClient {
    http_client: Client,
    base_url: String,
}

impl ApiClient {
    pub(crate) fn new(base_url: &str, settings: &HttpSettings) -> HarvestResult<Self> {
        let http_client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self, token: &Token) -> HarvestResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&token.bearer())
            .map_err(|_| HarvestError::auth(token.source(), "Token is not a valid header value"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        Ok(headers)
    }

    /// GET `path`
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, token: &Token, path: &str) -> HarvestResult<T> {
        let url = self.url(path);
        let request = self.http_client.get(&url).headers(self.auth_headers(token)?);
        self.send(path, request).await
    }

    /// GET `path` with query parameters
    pub(crate) async fn get_json_query<Q, T>(&self, token: &Token, path: &str, query: &Q) -> HarvestResult<T>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let request = self
            .http_client
            .get(&url)
            .headers(self.auth_headers(token)?)
            .query(query);
        self.send(path, request).await
    }

    /// GET `path` carrying a JSON body
    pub(crate) async fn get_json_with_body<B, T>(&self, token: &Token, path: &str, body: &B) -> HarvestResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let request = self
            .http_client
            .get(&url)
            .headers(self.auth_headers(token)?)
            .json(body);
        self.send(path, request).await
    }

    /// POST a JSON body to `path`
    pub(crate) async fn post_json<B, T>(&self, token: &Token, path: &str, body: &B) -> HarvestResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let request = self
            .http_client
            .post(&url)
            .headers(self.auth_headers(token)?)
            .json(body);
        self.send(path, request).await
    }

    async fn send<T: DeserializeOwned>(&self, path: &str, request: RequestBuilder) -> HarvestResult<T> {
        debug!(endpoint = path, "Sending request");

        let response = request
            .send()
            .await
            .map_err(|e| HarvestError::transport(path, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| HarvestError::transport(path, &e))?;

        if !status.is_success() {
            return Err(HarvestError::status(path, status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            HarvestError::malformed(
                path,
                format!(
                    "Failed to parse response: {} - Body: {}",
                    e,
                    text.chars().take(200).collect::<String>()
                ),
            )
        })
    }
}
