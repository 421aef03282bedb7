//! Visual audit: vision-model review of the desktop and mobile captures.

use tracing::debug;

use crate::providers::{AuditTask, GenerateRequest, ImageInput, ProviderRegistry};
use crate::types::config::AuditConfig;
use crate::types::finding::{AuditSource, Category, Finding, FindingKind};
use crate::types::raw::RawSnapshot;

use super::envelope::{parse_envelope, to_finding};

const SYSTEM_INSTRUCTION: &str = "You are a senior UX and conversion reviewer. You are shown \
desktop and mobile screenshots of a website. Identify concrete visual and usability issues: \
layout breakage, illegible text, hidden or weak calls to action, trust signals, mobile \
ergonomics. Respond with strict JSON only, no prose: {\"findings\": [{\"category\": \
\"design|conversion|content\", \"severity\": \"critical|warning|info\", \"description\": \
\"...\", \"recommendation\": \"...\"}]}. Report at most 8 findings. If nothing is wrong, \
return {\"findings\": []}.";

/// Outcome of one LLM audit: findings plus any trace lines.
pub struct LlmAuditOutcome {
    pub findings: Vec<Finding>,
    pub trace: Vec<String>,
}

/// Run the visual audit. `Err` means the provider call itself failed (an
/// explicit gap); a malformed reply is a successful call with zero
/// findings and a trace entry.
pub async fn audit(
    raw: &RawSnapshot,
    registry: &ProviderRegistry,
    config: &AuditConfig,
) -> Result<LlmAuditOutcome, String> {
    let screenshots = raw
        .screenshots
        .as_data()
        .ok_or_else(|| "no screenshots available".to_string())?;

    let mut images = Vec::new();
    let mut labels = Vec::new();
    if let Some(desktop) = &screenshots.desktop {
        images.push(ImageInput::png(desktop.base64.clone()));
        labels.push(format!("desktop {}x{}", desktop.width, desktop.height));
    }
    if let Some(mobile) = &screenshots.mobile {
        images.push(ImageInput::png(mobile.base64.clone()));
        labels.push(format!("mobile {}x{}", mobile.width, mobile.height));
    }
    if images.is_empty() {
        return Err("screenshot set is empty".to_string());
    }

    let url = &raw.identity.normalized_url;
    let prompt = format!(
        "Review these screenshots of {} ({}). Apply the system instruction and return the JSON envelope.",
        url,
        labels.join(", ")
    );

    debug!(url = %url, images = images.len(), "visual audit call");

    let request = GenerateRequest::new("", prompt)
        .with_system(SYSTEM_INSTRUCTION)
        .with_temperature(0.2)
        .with_max_tokens(2048)
        .with_timeout(config.timeouts.llm());

    let response = registry
        .generate_with_vision(AuditTask::Visual, &request, &images)
        .await
        .map_err(|e| e.to_string())?;

    match parse_envelope(&response.text) {
        Ok(raw_findings) => Ok(LlmAuditOutcome {
            findings: raw_findings
                .into_iter()
                .map(|f| {
                    to_finding(
                        f,
                        FindingKind::VisualIssue,
                        AuditSource::Visual,
                        Category::Design,
                        vec![url.clone()],
                    )
                })
                .collect(),
            trace: Vec::new(),
        }),
        Err(trace) => Ok(LlmAuditOutcome {
            findings: Vec::new(),
            trace: vec![format!("visual audit: {}", trace)],
        }),
    }
}
