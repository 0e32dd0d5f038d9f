//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients carrying the session credential and user agent
//! - Requesting topic pages below a cursor
//! - Resolving file download URLs
//! - Downloading media and attachment bytes
//! - Classifying failures into network, protocol and API-reported errors

use crate::config::{CrawlConfig, CrawlerSettings};
use crate::crawler::parser::{DownloadUrlData, Envelope, Topic, TopicsData};
use crate::{ConfigError, FetchError, HarvestError};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;
use url::Url;

/// Desktop browser user agent sent with every request
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/86.0.4240.198 Safari/537.36";

/// Longest slice of a rejected body kept for the log
const DETAIL_LIMIT: usize = 300;

/// Result of one topics page request
#[derive(Debug)]
pub enum PageFetch {
    /// The API returned a page (possibly empty)
    Page(Vec<Topic>),

    /// The envelope reported `succeeded: false`
    Rejected {
        /// Start of the response body
        detail: String,
    },

    /// The body could not be understood
    Malformed {
        /// Error description
        error: String,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

/// Builds an HTTP client with the session credential and fixed user agent
///
/// # Arguments
///
/// * `cookie` - Opaque session credential, sent as the `cookie` header
/// * `timeout` - Per-request timeout
/// * `follow_redirects` - Whether redirects are followed
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - The credential is not a valid header value, or the client failed to build
pub fn build_http_client(
    cookie: &str,
    timeout: Duration,
    follow_redirects: bool,
) -> Result<Client, HarvestError> {
    let mut credential = HeaderValue::from_str(cookie).map_err(|e| {
        ConfigError::Validation(format!("cookie is not a valid header value: {}", e))
    })?;
    credential.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, credential);

    let redirect = if follow_redirects {
        Policy::limited(10)
    } else {
        // a redirect from the API means the session is no longer valid
        Policy::none()
    };

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(redirect)
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Client for the community REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    api: Client,
    download: Client,
    base: Url,
    group: String,
    page_size: u32,
}

impl ApiClient {
    /// Creates a client for the configured group
    pub fn new(config: &CrawlConfig, settings: &CrawlerSettings) -> Result<Self, HarvestError> {
        let timeout = settings.request_timeout();
        Ok(Self {
            api: build_http_client(&config.cookie, timeout, false)?,
            download: build_http_client(&config.cookie, timeout, true)?,
            base: Url::parse(&settings.api_base)?,
            group: config.group.clone(),
            page_size: settings.page_size,
        })
    }

    /// Builds `<base>/<segments...>`, escaping each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, FetchError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::Malformed {
                url: self.base.to_string(),
                message: "API base cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Requests one page of topics, newest first, bounded above by `cursor`
    ///
    /// # Request
    ///
    /// `GET groups/{group}/topics?scope=all&count={page_size}[&end_time={cursor}]`
    pub async fn fetch_topics(&self, cursor: Option<&str>) -> PageFetch {
        let url = match self.endpoint(&["groups", &self.group, "topics"]) {
            Ok(url) => url,
            Err(e) => {
                return PageFetch::Malformed {
                    error: e.to_string(),
                }
            }
        };

        let count = self.page_size.to_string();
        let mut request = self
            .api
            .get(url)
            .query(&[("scope", "all"), ("count", count.as_str())]);
        if let Some(cursor) = cursor {
            request = request.query(&[("end_time", cursor)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                return PageFetch::NetworkError {
                    error: describe_reqwest_error(&e),
                }
            }
        };

        let status = response.status();
        tracing::debug!("GET {} -> {}", response.url(), status);
        if !status.is_success() {
            return PageFetch::Malformed {
                error: format!("HTTP {}", status.as_u16()),
            };
        }

        match response.text().await {
            Ok(body) => decode_topics(&body),
            Err(e) => PageFetch::NetworkError {
                error: describe_reqwest_error(&e),
            },
        }
    }

    /// Resolves the download URL of a file attachment
    ///
    /// # Request
    ///
    /// `GET files/{file_id}/download_url`
    pub async fn resolve_download_url(&self, file_id: u64) -> Result<String, FetchError> {
        let id = file_id.to_string();
        let url = self.endpoint(&["files", &id, "download_url"])?;
        let url_str = url.to_string();

        let response = self
            .api
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(&url_str, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| network_error(&url_str, &e))?;
        decode_download_url(&url_str, &body)
    }

    /// Downloads raw bytes from a media or file URL, following redirects
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .download
            .get(url)
            .send()
            .await
            .map_err(|e| network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| network_error(url, &e))?;
        Ok(bytes.to_vec())
    }
}

/// Decodes a topics response body
pub fn decode_topics(body: &str) -> PageFetch {
    let envelope: Envelope<TopicsData> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => {
            return PageFetch::Malformed {
                error: format!("invalid topics body: {}", e),
            }
        }
    };

    if !envelope.succeeded {
        return PageFetch::Rejected {
            detail: truncate_detail(body),
        };
    }

    match envelope.resp_data {
        Some(data) => PageFetch::Page(data.topics),
        None => PageFetch::Malformed {
            error: "succeeded without resp_data".to_string(),
        },
    }
}

/// Decodes a download-url response body
fn decode_download_url(url: &str, body: &str) -> Result<String, FetchError> {
    let envelope: Envelope<DownloadUrlData> =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if !envelope.succeeded {
        return Err(FetchError::Rejected {
            url: url.to_string(),
            detail: truncate_detail(body),
        });
    }

    envelope
        .resp_data
        .map(|data| data.download_url)
        .ok_or_else(|| FetchError::Malformed {
            url: url.to_string(),
            message: "succeeded without resp_data".to_string(),
        })
}

fn network_error(url: &str, error: &reqwest::Error) -> FetchError {
    FetchError::Network {
        url: url.to_string(),
        message: describe_reqwest_error(error),
    }
}

fn describe_reqwest_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else {
        error.to_string()
    }
}

fn truncate_detail(body: &str) -> String {
    body.chars().take(DETAIL_LIMIT).collect()
}
