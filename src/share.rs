use std::io::Read;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::domain::ShareLinkId;
use crate::error::OtfsError;

pub const DEFAULT_SHARE_BASE_URL: &str = "https://drive.google.com/uc";

/// Response from the share host, headers captured and body left unread.
pub struct HostResponse {
    pub content_type: Option<String>,
    pub cookies: Vec<(String, String)>,
    pub body: Box<dyn Read + Send>,
}

impl HostResponse {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|value| value.to_ascii_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

/// Confirmation values recovered from an interstitial page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmToken {
    pub confirm: String,
    pub uuid: Option<String>,
}

pub trait ShareHost {
    fn download_url(&self, link: &ShareLinkId, token: Option<&ConfirmToken>) -> String;
    fn get(&self, url: &str) -> Result<HostResponse, OtfsError>;
}

/// Unauthenticated HTTP client with a cookie jar so the confirmed request carries the session cookie.
#[derive(Clone)]
pub struct HttpShareHost {
    client: Client,
    base_url: String,
}

impl HttpShareHost {
    pub fn new(base_url: &str) -> Result<Self, OtfsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("otfs-provision/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| OtfsError::Download(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(60 * 30))
            .build()
            .map_err(|err| OtfsError::Download(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, OtfsError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 500;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (1 << attempt);
                        warn!(status, attempt, delay_ms = delay, "share host busy, retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (1 << attempt);
                        warn!(error = %err, attempt, delay_ms = delay, "share request failed, retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(OtfsError::Download(err.to_string()));
                }
            }
        }
    }
}

impl ShareHost for HttpShareHost {
    fn download_url(&self, link: &ShareLinkId, token: Option<&ConfirmToken>) -> String {
        let mut url = format!("{}?export=download&id={}", self.base_url, link.as_str());
        if let Some(token) = token {
            url.push_str("&confirm=");
            url.push_str(&token.confirm);
            if let Some(uuid) = &token.uuid {
                url.push_str("&uuid=");
                url.push_str(uuid);
            }
        }
        url
    }

    fn get(&self, url: &str) -> Result<HostResponse, OtfsError> {
        debug!(%url, "share host request");
        let response = self.send_with_retries(|| self.client.get(url))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .map(|text| text.chars().take(200).collect::<String>())
                .unwrap_or_else(|_| "share host request failed".to_string());
            return Err(OtfsError::DownloadStatus { status, message });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();
        Ok(HostResponse {
            content_type,
            cookies,
            body: Box::new(response),
        })
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
