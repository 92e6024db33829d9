use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::from_str;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Blocking JSON client shared by the model clients and the Pinecone index.
///
/// Errors are plain strings; each caller wraps them in its own error variant.
#[derive(Clone, Debug)]
pub struct JsonClient {
    client: Client,
}

impl JsonClient {
    pub fn new() -> Result<Self, String> {
        Self::with_headers(HeaderMap::new())
    }

    /// Build a client that sends `headers` on every request.
    pub fn with_headers(headers: HeaderMap) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client })
    }

    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, String> {
        debug!(url, "GET");
        send_json("GET", url, self.client.get(url))
    }

    pub fn post_json<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T, String> {
        debug!(url, "POST");
        let req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        send_json("POST", url, req)
    }
}

fn send_json<T: DeserializeOwned>(method: &str, url: &str, req: RequestBuilder) -> Result<T, String> {
    let resp = req.send().map_err(|e| format!("{} {} failed: {}", method, url, e))?;
    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    if !status.is_success() {
        return Err(format!("{} {} failed: {} {}", method, url, status, text));
    }
    from_str::<T>(&text).map_err(|e| format!("{} {} decode failed: {} | {}", method, url, e, text))
}
