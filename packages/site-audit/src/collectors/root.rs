//! Root page probe.

use chrono::Utc;
use tracing::debug;

use crate::fetch::FetchOptions;
use crate::types::collector::CollectorOutput;
use crate::types::raw::FetchedPage;

use super::CollectorContext;

/// Fetch the normalized root URL with its redirect chain. The body is
/// retained only when the response declared an HTML content type.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<FetchedPage> {
    let url = ctx.identity.normalized_url.clone();
    debug!(url = %url, "root fetch");

    let options = FetchOptions::default().with_timeout(ctx.config.timeouts.root_fetch());
    let result = ctx.fetch.fetch(&url, options).await;

    let fetched = match result.data {
        Some(f) => f,
        None => return CollectorOutput::err(result.error.unwrap_or_default()),
    };

    let is_html = fetched
        .headers
        .get("content-type")
        .map(|ct| ct.contains("text/html") || ct.contains("application/xhtml"))
        .unwrap_or(false);

    CollectorOutput::ok(FetchedPage {
        requested_url: url,
        final_url: fetched.final_url,
        status: fetched.status,
        headers: fetched.headers,
        body: is_html.then_some(fetched.body),
        redirect_chain: fetched.chain,
        fetched_at: Utc::now(),
    })
}
