//! Testing utilities: a mock LLM provider with call tracking and canned
//! snapshot fixtures.
//!
//! These let applications (and this crate's own tests) exercise the full
//! pipeline without network or provider calls.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::error::{ProviderError, ProviderResult};
use crate::providers::{GenerateRequest, GenerateResponse, ImageInput, Provider, Usage};

/// Record of one call made to a [`MockProvider`].
#[derive(Debug, Clone)]
pub enum MockCall {
    Text { model: String },
    Vision { model: String, images: usize },
    Structured { model: String },
}

/// A mock provider returning queued responses in order, then a default.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockProvider::named("openai")
///     .with_response(r#"{"findings": []}"#)
///     .with_failures(1);
/// registry.register(Arc::new(provider), 4);
/// ```
pub struct MockProvider {
    name: &'static str,
    responses: Arc<RwLock<VecDeque<String>>>,
    default_response: String,
    failures: Arc<RwLock<usize>>,
    calls: Arc<RwLock<Vec<MockCall>>>,
}

impl MockProvider {
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            responses: Arc::new(RwLock::new(VecDeque::new())),
            default_response: r#"{"findings": []}"#.to_string(),
            failures: Arc::new(RwLock::new(0)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue a response; queued responses are served before the default.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses.write().unwrap().push_back(response.into());
        self
    }

    /// Replace the default response.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        self.default_response = response.into();
        self
    }

    /// Fail the next N calls before serving responses.
    pub fn with_failures(self, failures: usize) -> Self {
        *self.failures.write().unwrap() = failures;
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.read().unwrap().clone()
    }

    fn respond(&self, model: &str, call: MockCall) -> ProviderResult<GenerateResponse> {
        self.calls.write().unwrap().push(call);

        {
            let mut failures = self.failures.write().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ProviderError::Call(format!(
                    "{} synthetic failure",
                    self.name
                )));
            }
        }

        let text = self
            .responses
            .write()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone());

        Ok(GenerateResponse {
            text,
            usage: Usage {
                input: 100,
                output: 50,
                total: 150,
            },
            model: model.to_string(),
            duration_ms: 1,
        })
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn generate_text(&self, request: &GenerateRequest) -> ProviderResult<GenerateResponse> {
        self.respond(
            &request.model,
            MockCall::Text {
                model: request.model.clone(),
            },
        )
    }

    async fn generate_with_vision(
        &self,
        request: &GenerateRequest,
        images: &[ImageInput],
    ) -> ProviderResult<GenerateResponse> {
        self.respond(
            &request.model,
            MockCall::Vision {
                model: request.model.clone(),
                images: images.len(),
            },
        )
    }

    async fn generate_structured(
        &self,
        request: &GenerateRequest,
        _schema: &serde_json::Value,
    ) -> ProviderResult<GenerateResponse> {
        self.respond(
            &request.model,
            MockCall::Structured {
                model: request.model.clone(),
            },
        )
    }
}

/// Canned raw and site snapshots for audit tests.
pub mod snapshots {
    use chrono::Utc;
    use std::collections::HashMap;

    use crate::extract::build_snapshot;
    use crate::types::collector::CollectorOutput;
    use crate::types::identity::AuditIdentity;
    use crate::types::raw::{
        FetchedPage, LighthouseFacts, RawSnapshot, RedirectHop, RedirectMap, RedirectProbe,
    };
    use crate::types::snapshot::{PageSignals, SiteSnapshot, SiteWideFacts, UrlSet};

    pub fn identity() -> AuditIdentity {
        AuditIdentity::new("https://example.com", None, "t=1", "p=1").unwrap()
    }

    fn html_headers() -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html; charset=utf-8".to_string());
        headers
    }

    /// A fully healthy page body for fixtures that should stay quiet.
    pub const HEALTHY_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Example Store - Quality Widgets Online</title>
  <meta name="description" content="Example Store sells quality widgets with fast shipping, easy returns, and a thirty day satisfaction guarantee for every order.">
  <link rel="canonical" href="https://example.com/">
  <script type="application/ld+json">{"@context": "https://schema.org", "@type": "Organization", "name": "Example Store"}</script>
</head>
<body>
  <h1>Example Store</h1>
  <h2>Why shop with us</h2>
  <p>PLACEHOLDER</p>
</body>
</html>"#;

    fn healthy_body() -> String {
        let filler = "widgets quality shipping returns guarantee catalogue order support ".repeat(30);
        HEALTHY_PAGE.replace("PLACEHOLDER", &filler)
    }

    fn fetched_page(url: &str, status: u16, body: Option<String>) -> FetchedPage {
        FetchedPage {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status,
            headers: html_headers(),
            body,
            redirect_chain: vec![RedirectHop {
                url: url.to_string(),
                status,
            }],
            fetched_at: Utc::now(),
        }
    }

    fn probe(start: &str, chain: Vec<(&str, u16)>, final_url: Option<&str>) -> RedirectProbe {
        RedirectProbe {
            start_url: start.to_string(),
            final_url: final_url.map(String::from),
            final_status: final_url.map(|_| 200),
            chain: chain
                .into_iter()
                .map(|(url, status)| RedirectHop {
                    url: url.to_string(),
                    status,
                })
                .collect(),
            error: None,
        }
    }

    fn enforcing_redirect_map() -> RedirectMap {
        RedirectMap {
            http_root: probe(
                "http://example.com/",
                vec![("http://example.com/", 301), ("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
            https_root: probe(
                "https://example.com/",
                vec![("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
            http_www: probe(
                "http://www.example.com/",
                vec![("http://www.example.com/", 301), ("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
            https_www: probe(
                "https://www.example.com/",
                vec![("https://www.example.com/", 301), ("https://example.com/", 200)],
                Some("https://example.com/"),
            ),
        }
    }

    fn lax_redirect_map() -> RedirectMap {
        let mut map = enforcing_redirect_map();
        map.http_root = probe(
            "http://example.com/",
            vec![("http://example.com/", 200)],
            Some("http://example.com/"),
        );
        map
    }

    /// Snapshot where every probe failed: everything downstream must be
    /// Unknown, and no audit may assert anything.
    pub fn empty_site_snapshot() -> (SiteSnapshot, RawSnapshot) {
        let raw = RawSnapshot::empty(identity());
        let snapshot = build_snapshot(&raw);
        (snapshot, raw)
    }

    /// Snapshot with a chosen set of response headers on the root fetch,
    /// one healthy sampled page, and HTTPS either enforced or not.
    pub fn snapshot_with_headers(
        headers: &[(&str, &str)],
        https_enforced: bool,
    ) -> (SiteSnapshot, RawSnapshot) {
        let mut raw = RawSnapshot::empty(identity());

        let mut root = fetched_page("https://example.com/", 200, Some(healthy_body()));
        for (name, value) in headers {
            root.headers.insert(name.to_string(), value.to_string());
        }
        raw.root_fetch = CollectorOutput::ok(root);

        raw.html_samples = CollectorOutput::ok(vec![fetched_page(
            "https://example.com/",
            200,
            Some(healthy_body()),
        )]);

        raw.redirect_map = CollectorOutput::ok(if https_enforced {
            enforcing_redirect_map()
        } else {
            lax_redirect_map()
        });

        let snapshot = build_snapshot(&raw);
        (snapshot, raw)
    }

    /// Raw snapshot with hand-supplied HTML sample bodies and an
    /// HTTPS-enforcing redirect map.
    pub fn raw_with_sample_bodies(samples: Vec<(String, u16, Option<String>)>) -> RawSnapshot {
        let mut raw = RawSnapshot::empty(identity());
        raw.redirect_map = CollectorOutput::ok(enforcing_redirect_map());
        raw.root_fetch = CollectorOutput::ok(fetched_page(
            "https://example.com/",
            200,
            Some(healthy_body()),
        ));
        raw.html_samples = CollectorOutput::ok(
            samples
                .into_iter()
                .map(|(url, status, body)| fetched_page(&url, status, body))
                .collect(),
        );
        raw
    }

    /// Snapshot whose https root probe loops a → b → a.
    pub fn raw_snapshot_with_loop() -> RawSnapshot {
        let mut raw = RawSnapshot::empty(identity());
        let mut map = enforcing_redirect_map();
        map.https_root = RedirectProbe {
            start_url: "https://example.com/".to_string(),
            final_url: None,
            final_status: None,
            chain: vec![
                RedirectHop {
                    url: "https://a.example.com/".to_string(),
                    status: 301,
                },
                RedirectHop {
                    url: "https://b.example.com/".to_string(),
                    status: 301,
                },
                RedirectHop {
                    url: "https://a.example.com/".to_string(),
                    status: 301,
                },
            ],
            error: Some("redirect loop detected".to_string()),
        };
        raw.redirect_map = CollectorOutput::ok(map);
        raw
    }

    /// Snapshot with a Lighthouse report and nothing else.
    pub fn snapshot_with_lighthouse(report: serde_json::Value) -> (SiteSnapshot, RawSnapshot) {
        let mut raw = RawSnapshot::empty(identity());
        raw.lighthouse = CollectorOutput::ok(LighthouseFacts {
            report,
            fetched_at: Utc::now(),
        });
        let snapshot = build_snapshot(&raw);
        (snapshot, raw)
    }

    /// Assemble a site snapshot directly from hand-built page signals.
    pub fn site_snapshot_from_pages(pages: Vec<PageSignals>) -> SiteSnapshot {
        let mut url_set = UrlSet::new();
        for page in &pages {
            url_set.insert(page.url.clone());
        }

        SiteSnapshot {
            identity: identity(),
            pages,
            site_wide: SiteWideFacts {
                security_headers: crate::extract::headers::security_headers(None),
                https_enforced: crate::types::tristate::TriState::unknown("not probed"),
                infra: Default::default(),
            },
            url_set,
            perf: None,
        }
    }

    /// Builder for hand-rolled page signals with quiet defaults.
    pub struct PageBuilder {
        page: PageSignals,
    }

    impl PageBuilder {
        pub fn new(url: &str) -> Self {
            let mut page = PageSignals::zeroed(url, 200);
            page.html_sampled = true;
            page.h1 = Some("Heading".to_string());
            page.h1_count = 1;
            page.has_viewport = true;
            page.has_lang = true;
            page.has_charset = true;
            page.word_count = 500;
            page.canonical = Some(url.to_string());
            page.canonical_self = Some(true);
            page.schema = vec![crate::types::snapshot::SchemaBlock {
                schema_type: "Organization".to_string(),
                json_ld: serde_json::json!({"@type": "Organization"}),
                valid: true,
                errors: vec![],
            }];
            Self { page }
        }

        pub fn title(mut self, title: &str) -> Self {
            self.page.title = Some(title.to_string());
            self.page.title_length = title.chars().count();
            self
        }

        pub fn meta_description(mut self, description: &str) -> Self {
            self.page.meta_description = Some(description.to_string());
            self.page.meta_description_length = description.chars().count();
            self
        }

        pub fn words(mut self, count: usize) -> Self {
            self.page.word_count = count;
            self
        }

        pub fn status(mut self, status: u16) -> Self {
            self.page.status = status;
            self
        }

        pub fn build(self) -> PageSignals {
            self.page
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider_queues_then_default() {
        let provider = MockProvider::named("gemini").with_response("first");
        let request = GenerateRequest::new("m", "p");

        let first = provider.generate_text(&request).await.unwrap();
        assert_eq!(first.text, "first");

        let second = provider.generate_text(&request).await.unwrap();
        assert_eq!(second.text, r#"{"findings": []}"#);

        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_provider_failures_then_success() {
        let provider = MockProvider::named("openai").with_failures(1);
        let request = GenerateRequest::new("m", "p");

        assert!(provider.generate_text(&request).await.is_err());
        assert!(provider.generate_text(&request).await.is_ok());
    }
}
