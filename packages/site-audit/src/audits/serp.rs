//! SERP audit: text-model review of brand-query visibility.

use tracing::debug;

use crate::providers::{AuditTask, GenerateRequest, ProviderRegistry};
use crate::types::config::AuditConfig;
use crate::types::finding::{AuditSource, Category, Finding, FindingKind};
use crate::types::raw::RawSnapshot;
use crate::types::snapshot::SiteSnapshot;

use super::envelope::{parse_envelope, to_finding};
use super::visual::LlmAuditOutcome;

const SYSTEM_INSTRUCTION: &str = "You are an SEO analyst reviewing Google results for a brand \
query. Given the query, the organic results, and the site's own page titles, identify \
visibility problems: the brand not ranking first, competitors or aggregators outranking it, \
weak or truncated snippets, title/snippet mismatches against the site's actual pages. Respond \
with strict JSON only: {\"findings\": [{\"category\": \"seo\", \"severity\": \
\"critical|warning|info\", \"description\": \"...\", \"recommendation\": \"...\"}]}. Report at \
most 6 findings. If visibility looks healthy, return {\"findings\": []}.";

/// Run the SERP audit over the collected results.
pub async fn audit(
    raw: &RawSnapshot,
    snapshot: &SiteSnapshot,
    registry: &ProviderRegistry,
    config: &AuditConfig,
) -> Result<LlmAuditOutcome, String> {
    let serp = raw
        .serp_raw
        .as_data()
        .ok_or_else(|| "no SERP data available".to_string())?;

    let results_block = serp
        .results
        .iter()
        .map(|r| {
            format!(
                "{}. {} - {}\n   {}",
                r.position,
                r.title,
                r.url,
                r.snippet.as_deref().unwrap_or("(no snippet)")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let page_titles = snapshot
        .pages
        .iter()
        .filter_map(|p| p.title.as_deref())
        .take(10)
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Brand query: \"{}\"\nSite: {}\n\nOrganic results:\n{}\n\nThe site's own page titles:\n{}\n\nApply the system instruction and return the JSON envelope.",
        serp.query, raw.identity.normalized_url, results_block, page_titles
    );

    debug!(query = %serp.query, results = serp.results.len(), "serp audit call");

    let request = GenerateRequest::new("", prompt)
        .with_system(SYSTEM_INSTRUCTION)
        .with_temperature(0.2)
        .with_max_tokens(1536)
        .with_timeout(config.timeouts.llm());

    let response = registry
        .generate_text(AuditTask::Serp, &request)
        .await
        .map_err(|e| e.to_string())?;

    match parse_envelope(&response.text) {
        Ok(raw_findings) => Ok(LlmAuditOutcome {
            findings: raw_findings
                .into_iter()
                .map(|f| {
                    to_finding(
                        f,
                        FindingKind::SerpIssue,
                        AuditSource::Serp,
                        Category::Seo,
                        vec![raw.identity.normalized_url.clone()],
                    )
                })
                .collect(),
            trace: Vec::new(),
        }),
        Err(trace) => Ok(LlmAuditOutcome {
            findings: Vec::new(),
            trace: vec![format!("serp audit: {}", trace)],
        }),
    }
}
