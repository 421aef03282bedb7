//! Screenshot probe: desktop and mobile captures via a pluggable backend.
//!
//! The default backend is the ScreenshotOne HTTP API; the trait seam lets
//! tests (or a headless-browser integration) slot in without touching the
//! collector.

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::types::collector::CollectorOutput;
use crate::types::raw::{Screenshot, ScreenshotSet};

use super::CollectorContext;

/// Desktop viewport.
pub const DESKTOP_VIEWPORT: (u32, u32) = (1920, 1080);
/// Mobile viewport.
pub const MOBILE_VIEWPORT: (u32, u32) = (390, 844);

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Capture backend contract.
#[async_trait]
pub trait ScreenshotBackend: Send + Sync {
    async fn capture(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> std::result::Result<Screenshot, String>;
}

/// ScreenshotOne HTTP API backend.
pub struct ScreenshotOneBackend {
    client: reqwest::Client,
    api_key: SecretString,
}

impl ScreenshotOneBackend {
    const BASE_URL: &'static str = "https://api.screenshotone.com/take";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// Build from `SCREENSHOTONE_API_KEY`.
    pub fn from_env() -> Option<Self> {
        std::env::var("SCREENSHOTONE_API_KEY").ok().map(Self::new)
    }
}

#[async_trait]
impl ScreenshotBackend for ScreenshotOneBackend {
    async fn capture(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> std::result::Result<Screenshot, String> {
        let response = self
            .client
            .get(Self::BASE_URL)
            .query(&[
                ("access_key", self.api_key.expose_secret()),
                ("url", url),
                ("viewport_width", &width.to_string()),
                ("viewport_height", &height.to_string()),
                ("format", "png"),
                ("block_ads", "true"),
                ("delay", "2"),
                ("timeout", "60"),
            ])
            .send()
            .await
            .map_err(|e| format!("screenshot request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("screenshot API returned {}", response.status()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("screenshot body read failed: {}", e))?;

        if !bytes.starts_with(&PNG_MAGIC) {
            return Err("screenshot response is not a PNG".to_string());
        }

        Ok(Screenshot {
            base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
            width,
            height,
        })
    }
}

/// Capture desktop and mobile screenshots of the target. Either capture
/// may fail independently; only a total failure errors the probe.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<ScreenshotSet> {
    if !ctx.config.visual_mode.enabled() {
        return CollectorOutput::err("visual mode disabled");
    }

    let backend = match &ctx.screenshots {
        Some(b) => b,
        None => return CollectorOutput::err("no screenshot backend configured"),
    };

    let url = ctx.identity.normalized_url.clone();
    debug!(url = %url, "screenshot probe");

    let timeout = ctx.config.timeouts.screenshot();
    let (desktop, mobile) = tokio::join!(
        tokio::time::timeout(
            timeout,
            backend.capture(&url, DESKTOP_VIEWPORT.0, DESKTOP_VIEWPORT.1)
        ),
        tokio::time::timeout(
            timeout,
            backend.capture(&url, MOBILE_VIEWPORT.0, MOBILE_VIEWPORT.1)
        ),
    );

    let flatten = |result: std::result::Result<
        std::result::Result<Screenshot, String>,
        tokio::time::error::Elapsed,
    >,
                   label: &str| match result {
        Ok(Ok(shot)) => Some(shot),
        Ok(Err(e)) => {
            warn!(label = label, error = %e, "screenshot capture failed");
            None
        }
        Err(_) => {
            warn!(label = label, "screenshot capture timed out");
            None
        }
    };

    let desktop = flatten(desktop, "desktop");
    let mobile = flatten(mobile, "mobile");

    if desktop.is_none() && mobile.is_none() {
        return CollectorOutput::err("both screenshot captures failed");
    }

    CollectorOutput::ok(ScreenshotSet { desktop, mobile })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_magic() {
        let png = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0];
        assert!(png.starts_with(&PNG_MAGIC));

        let jpeg = [0xff, 0xd8, 0xff, 0xe0];
        assert!(!jpeg.starts_with(&PNG_MAGIC));
    }
}
