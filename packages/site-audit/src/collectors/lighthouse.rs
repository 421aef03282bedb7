//! Performance probe: Lighthouse-style report via a pluggable backend.
//!
//! The default backend is the PageSpeed Insights API, which wraps a full
//! Lighthouse run. The raw report lands in the snapshot; metric extraction
//! and threshold classification happen in Layer 2.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::types::collector::CollectorOutput;
use crate::types::raw::LighthouseFacts;

use super::CollectorContext;

/// Report backend contract.
#[async_trait]
pub trait LighthouseBackend: Send + Sync {
    async fn run_report(&self, url: &str) -> std::result::Result<serde_json::Value, String>;
}

/// PageSpeed Insights backend.
pub struct PsiBackend {
    client: reqwest::Client,
    api_key: Option<SecretString>,
}

impl PsiBackend {
    const BASE_URL: &'static str =
        "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: std::env::var("PSI_API_KEY").ok().map(SecretString::from),
        }
    }
}

impl Default for PsiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LighthouseBackend for PsiBackend {
    async fn run_report(&self, url: &str) -> std::result::Result<serde_json::Value, String> {
        let mut query: Vec<(String, String)> = vec![
            ("url".into(), url.to_string()),
            ("strategy".into(), "mobile".into()),
        ];
        for category in ["performance", "accessibility", "best-practices", "seo"] {
            query.push(("category".into(), category.into()));
        }
        if let Some(key) = &self.api_key {
            query.push(("key".into(), key.expose_secret().to_string()));
        }

        let response = self
            .client
            .get(Self::BASE_URL)
            .query(&query)
            .send()
            .await
            .map_err(|e| format!("PSI request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("PSI returned {}", response.status()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("PSI response parse failed: {}", e))?;

        body.get("lighthouseResult")
            .cloned()
            .ok_or_else(|| "PSI response missing lighthouseResult".to_string())
    }
}

/// Run the performance probe against the target.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<LighthouseFacts> {
    if !ctx.config.psi_enabled {
        return CollectorOutput::err("performance probe disabled");
    }

    let backend = match &ctx.lighthouse {
        Some(b) => b,
        None => return CollectorOutput::err("no performance backend configured"),
    };

    let url = ctx.identity.normalized_url.clone();
    debug!(url = %url, "lighthouse probe");

    let timeout = ctx.config.timeouts.lighthouse();
    match tokio::time::timeout(timeout, backend.run_report(&url)).await {
        Ok(Ok(report)) => CollectorOutput::ok(LighthouseFacts {
            report,
            fetched_at: Utc::now(),
        }),
        Ok(Err(e)) => CollectorOutput::err(e),
        Err(_) => CollectorOutput::err(format!(
            "performance probe timed out after {}s",
            timeout.as_secs()
        )),
    }
}
