//! HTML sample fetcher: bounded-concurrency fetch of the sampled URLs.

use chrono::Utc;
use futures::future::join_all;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::fetch::FetchOptions;
use crate::types::collector::CollectorOutput;
use crate::types::raw::{FetchedPage, SamplingPlan};

use super::CollectorContext;

/// Sustained polite fetch rate against the target site.
const REQUESTS_PER_SECOND: u32 = 4;

/// Fetch every sampled URL under the run's concurrency limiter, pacing
/// requests with a rate limiter. Entries are kept for every response -
/// status codes feed broken-link detection - but bodies are retained only
/// for HTML.
pub async fn collect(
    ctx: &CollectorContext,
    plan: Option<&SamplingPlan>,
) -> CollectorOutput<Vec<FetchedPage>> {
    let plan = match plan {
        Some(p) => p,
        None => return CollectorOutput::err("no sampling plan available"),
    };

    let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).expect("nonzero"));
    let pacer = Arc::new(RateLimiter::direct(quota));

    let fetches = plan.urls.iter().map(|url| {
        let url = url.clone();
        let pacer = pacer.clone();
        async move {
            ctx.limiter
                .run(async {
                    pacer.until_ready().await;
                    fetch_sample(ctx, &url).await
                })
                .await
        }
    });

    let pages: Vec<FetchedPage> = join_all(fetches).await.into_iter().flatten().collect();

    if pages.is_empty() {
        return CollectorOutput::err("every sample fetch failed");
    }

    CollectorOutput::ok(pages)
}

async fn fetch_sample(ctx: &CollectorContext, url: &str) -> Option<FetchedPage> {
    debug!(url = %url, "html sample fetch");

    let options = FetchOptions::default().with_timeout(ctx.config.timeouts.html_sample());
    let result = ctx.fetch.fetch(url, options).await;

    let fetched = match result.data {
        Some(f) => f,
        None => {
            warn!(url = %url, error = ?result.error, "sample fetch failed");
            return None;
        }
    };

    let is_html = fetched
        .headers
        .get("content-type")
        .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
        .unwrap_or(false);

    Some(FetchedPage {
        requested_url: url.to_string(),
        final_url: fetched.final_url,
        status: fetched.status,
        headers: fetched.headers,
        body: is_html.then_some(fetched.body),
        redirect_chain: fetched.chain,
        fetched_at: Utc::now(),
    })
}
