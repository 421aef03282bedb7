//! URL sampling plan: first-N sitemap URLs grouped by first path segment.

use indexmap::IndexMap;
use url::Url;

use crate::types::collector::CollectorOutput;
use crate::types::identity::normalize_url;
use crate::types::raw::{SamplingPlan, SitemapFacts};

use super::CollectorContext;

/// Build the sampling plan. The root (and PDP, when configured) always
/// lead the sample; sitemap URLs fill the remainder up to the depth limit.
pub async fn collect(
    ctx: &CollectorContext,
    sitemaps: Option<&SitemapFacts>,
) -> CollectorOutput<SamplingPlan> {
    let limit = ctx.config.crawl_depth.sample_limit();
    let sitemap_urls = sitemaps.map(|s| s.urls.as_slice()).unwrap_or(&[]);

    let plan = build_plan(
        &ctx.identity.normalized_url,
        ctx.identity.pdp_url.as_deref().filter(|_| ctx.config.enable_pdp),
        &ctx.identity.host(),
        sitemap_urls,
        limit,
    );

    CollectorOutput::ok(plan)
}

/// Pure plan construction, separated for tests.
pub fn build_plan(
    root_url: &str,
    pdp_url: Option<&str>,
    host: &str,
    sitemap_urls: &[String],
    limit: usize,
) -> SamplingPlan {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |url: String, urls: &mut Vec<String>| {
        if !urls.contains(&url) {
            urls.push(url);
        }
    };

    push(root_url.to_string(), &mut urls);
    if let Some(pdp) = pdp_url {
        push(pdp.to_string(), &mut urls);
    }

    for raw in sitemap_urls {
        if urls.len() >= limit.max(1) {
            break;
        }
        let normalized = match normalize_url(raw) {
            Ok(u) => u,
            Err(_) => continue,
        };
        if !same_host(&normalized, host) {
            continue;
        }
        push(normalized, &mut urls);
    }

    let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
    for url in &urls {
        groups
            .entry(first_segment(url))
            .or_default()
            .push(url.clone());
    }

    SamplingPlan { urls, groups }
}

fn same_host(url: &str, host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h == host || h == format!("www.{}", host)))
        .unwrap_or(false)
}

/// First path segment, or `/` for the root.
fn first_segment(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next().map(String::from))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/".to_string())
}
