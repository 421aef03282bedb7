//! SERP probe: brand-query lookups via SerpApi or DataForSEO.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::debug;

use crate::types::collector::CollectorOutput;
use crate::types::raw::{SerpFacts, SerpResult};

use super::CollectorContext;

/// SERP backend contract.
#[async_trait]
pub trait SerpBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &str) -> std::result::Result<Vec<SerpResult>, String>;
}

/// SerpApi backend (`engine=google&num=10`).
pub struct SerpApiBackend {
    client: reqwest::Client,
    api_key: SecretString,
}

impl SerpApiBackend {
    const BASE_URL: &'static str = "https://serpapi.com/search";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("SERPAPI_KEY").ok().map(Self::new)
    }
}

#[async_trait]
impl SerpBackend for SerpApiBackend {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn search(&self, query: &str) -> std::result::Result<Vec<SerpResult>, String> {
        let response = self
            .client
            .get(Self::BASE_URL)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("num", "10"),
                ("api_key", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| format!("SerpApi request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("SerpApi returned {}", response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("SerpApi parse failed: {}", e))?;

        let results = body["organic_results"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(SerpResult {
                            position: item["position"].as_u64()? as u32,
                            title: item["title"].as_str()?.to_string(),
                            url: item["link"].as_str()?.to_string(),
                            snippet: item["snippet"].as_str().map(String::from),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

/// DataForSEO backend (`/v3/serp/google/organic/live/advanced`).
pub struct DataForSeoBackend {
    client: reqwest::Client,
    login: String,
    password: SecretString,
}

impl DataForSeoBackend {
    const BASE_URL: &'static str =
        "https://api.dataforseo.com/v3/serp/google/organic/live/advanced";

    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            login: login.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn from_env() -> Option<Self> {
        let login = std::env::var("DATAFORSEO_LOGIN").ok()?;
        let password = std::env::var("DATAFORSEO_PASSWORD").ok()?;
        Some(Self::new(login, password))
    }

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.login, self.password.expose_secret());
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        )
    }
}

#[async_trait]
impl SerpBackend for DataForSeoBackend {
    fn name(&self) -> &'static str {
        "dataforseo"
    }

    async fn search(&self, query: &str) -> std::result::Result<Vec<SerpResult>, String> {
        let body = serde_json::json!([{
            "keyword": query,
            "location_code": 2840,
            "language_code": "en",
            "depth": 10,
        }]);

        let response = self
            .client
            .post(Self::BASE_URL)
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("DataForSEO request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("DataForSEO returned {}", response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("DataForSEO parse failed: {}", e))?;

        let items = body["tasks"][0]["result"][0]["items"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let results = items
            .iter()
            .filter(|item| item["type"].as_str() == Some("organic"))
            .filter_map(|item| {
                Some(SerpResult {
                    position: item["rank_absolute"].as_u64()? as u32,
                    title: item["title"].as_str()?.to_string(),
                    url: item["url"].as_str()?.to_string(),
                    snippet: item["description"].as_str().map(String::from),
                })
            })
            .collect();

        Ok(results)
    }
}

/// Pick a backend from the environment: SerpApi first, DataForSEO second.
pub fn backend_from_env() -> Option<Arc<dyn SerpBackend>> {
    if let Some(backend) = SerpApiBackend::from_env() {
        return Some(Arc::new(backend));
    }
    if let Some(backend) = DataForSeoBackend::from_env() {
        return Some(Arc::new(backend));
    }
    None
}

/// Derive the brand query from the host, e.g. `shop.example.com` → `example`.
pub fn brand_query(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2].to_string()
    } else {
        host.to_string()
    }
}

/// Look up the brand query on the configured backend.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<SerpFacts> {
    let backend = match &ctx.serp {
        Some(b) => b,
        None => return CollectorOutput::err("no SERP backend configured"),
    };

    let query = brand_query(&ctx.identity.host());
    debug!(query = %query, backend = backend.name(), "serp probe");

    let timeout = ctx.config.timeouts.serp();
    match tokio::time::timeout(timeout, backend.search(&query)).await {
        Ok(Ok(results)) => CollectorOutput::ok(SerpFacts {
            backend: backend.name().to_string(),
            query,
            results,
        }),
        Ok(Err(e)) => CollectorOutput::err(e),
        Err(_) => CollectorOutput::err(format!(
            "SERP lookup timed out after {}s",
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brand_query_derivation() {
        assert_eq!(brand_query("example.com"), "example");
        assert_eq!(brand_query("www.example.com"), "example");
        assert_eq!(brand_query("shop.example.co"), "example");
        assert_eq!(brand_query("localhost"), "localhost");
    }
}
