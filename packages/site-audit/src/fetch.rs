//! The single HTTP primitive every network-touching collector uses.
//!
//! Redirects are followed manually so the full chain is recorded; bodies
//! are streamed against a byte cap; every abnormal condition comes back as
//! the `error` side of a [`CollectorOutput`]. This function never raises.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::net_guard::UrlValidator;
use crate::types::collector::CollectorOutput;
use crate::types::raw::RedirectHop;

/// Browser-like defaults; callers merge overrides on top.
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

/// Options for one fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: HashMap<String, String>,
    pub timeout: Duration,
    pub max_bytes: usize,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HashMap::new(),
            timeout: Duration::from_secs(10),
            max_bytes: 2 * 1024 * 1024,
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// The successful side of a fetch.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub final_url: String,
    pub status: u16,

    /// Lowercased header names.
    pub headers: HashMap<String, String>,

    /// Body decoded as UTF-8 (lossy).
    pub body: String,

    /// Raw body bytes, for binary payloads (gzip sitemaps, PNGs).
    pub bytes: Vec<u8>,

    /// Every response received, requested URL first. Hops = len - 1.
    pub chain: Vec<RedirectHop>,
}

/// The safe-fetch primitive. Cheap to clone; collectors share one.
#[derive(Debug, Clone)]
pub struct SafeFetch {
    client: Client,
    validator: UrlValidator,
}

impl SafeFetch {
    /// Build with a validator. The client never follows redirects itself -
    /// chains are recorded hop by hop.
    pub fn new(validator: UrlValidator) -> Self {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { client, validator }
    }

    /// Swap in a custom client (tests point this at a local fixture).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Fetch a URL under the given options. Never raises: timeouts, DNS
    /// failures, oversize bodies, and redirect-cap breaches all come back
    /// as the error side.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> CollectorOutput<FetchResult> {
        let timeout = options.timeout;
        match tokio::time::timeout(timeout, self.fetch_inner(url, options)).await {
            Ok(result) => result,
            Err(_) => CollectorOutput::err(format!(
                "Request timed out after {}s: {}",
                timeout.as_secs(),
                url
            )),
        }
    }

    async fn fetch_inner(&self, url: &str, options: FetchOptions) -> CollectorOutput<FetchResult> {
        let mut current = match self.validator.validate_str(url) {
            Ok(u) => u,
            Err(e) => return CollectorOutput::err(format!("URL rejected: {}", e)),
        };

        let mut chain: Vec<RedirectHop> = Vec::new();

        loop {
            debug!(url = %current, hop = chain.len(), "safe fetch");

            let response = match self
                .client
                .request(options.method.clone(), current.clone())
                .headers(build_headers(&options.headers))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(url = %current, error = %e, "fetch transport failure");
                    return CollectorOutput::err(format!("Fetch failed: {}", e));
                }
            };

            let status = response.status();
            chain.push(RedirectHop {
                url: current.to_string(),
                status: status.as_u16(),
            });

            if status.is_redirection() && options.follow_redirects {
                // chain holds max_redirects + 1 entries once the cap is hit
                if chain.len() > options.max_redirects {
                    return CollectorOutput::err("Exceeded maximum redirect hops");
                }

                let location = response
                    .headers()
                    .get("location")
                    .and_then(|v| v.to_str().ok());

                let next = match location {
                    Some(loc) => match current.join(loc) {
                        Ok(u) => u,
                        Err(_) => {
                            return CollectorOutput::err(format!(
                                "Unparseable redirect location: {}",
                                loc
                            ))
                        }
                    },
                    None => {
                        return CollectorOutput::err(format!(
                            "Redirect ({}) without a Location header",
                            status.as_u16()
                        ))
                    }
                };

                if let Err(e) = self.validator.validate(&next) {
                    return CollectorOutput::err(format!("Redirect target rejected: {}", e));
                }

                current = next;
                continue;
            }

            return self.read_body(current, status, response, &options, chain).await;
        }
    }

    async fn read_body(
        &self,
        final_url: Url,
        status: StatusCode,
        mut response: reqwest::Response,
        options: &FetchOptions,
        chain: Vec<RedirectHop>,
    ) -> CollectorOutput<FetchResult> {
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        // A declared oversize body short-circuits before any read
        if let Some(length) = response.content_length() {
            if length as usize > options.max_bytes {
                return CollectorOutput::err(format!(
                    "Response body too large: declared {} bytes exceeds cap of {}",
                    length, options.max_bytes
                ));
            }
        }

        let mut bytes: Vec<u8> = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if bytes.len() + chunk.len() > options.max_bytes {
                        return CollectorOutput::err(format!(
                            "Response body too large: exceeded cap of {} bytes",
                            options.max_bytes
                        ));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    return CollectorOutput::err(format!("Body read failed: {}", e));
                }
            }
        }

        let body = String::from_utf8_lossy(&bytes).into_owned();

        CollectorOutput::ok(FetchResult {
            final_url: final_url.to_string(),
            status: status.as_u16(),
            headers,
            body,
            bytes,
            chain,
        })
    }
}

fn build_headers(overrides: &HashMap<String, String>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(DEFAULT_USER_AGENT),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static(DEFAULT_ACCEPT),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static(DEFAULT_ACCEPT_LANGUAGE),
    );

    // Caller overrides merge on top of the defaults
    for (name, value) in overrides {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    headers
}
