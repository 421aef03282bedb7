//! DNS probe: A + AAAA with TTLs, plus CNAME.

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use tracing::debug;

use crate::types::collector::CollectorOutput;
use crate::types::raw::{AddressRecord, DnsFacts};

use super::CollectorContext;

/// Resolve A, AAAA, and CNAME records for the target host. The timeout is
/// strict: one attempt per record type under the configured deadline.
pub async fn collect(ctx: &CollectorContext) -> CollectorOutput<DnsFacts> {
    let host = ctx.identity.host();
    let timeout = ctx.config.timeouts.dns();

    match tokio::time::timeout(timeout, resolve(&host, ctx)).await {
        Ok(result) => result,
        Err(_) => CollectorOutput::err(format!(
            "DNS resolution timed out after {}s for {}",
            timeout.as_secs(),
            host
        )),
    }
}

async fn resolve(host: &str, ctx: &CollectorContext) -> CollectorOutput<DnsFacts> {
    let mut opts = ResolverOpts::default();
    opts.timeout = ctx.config.timeouts.dns();
    opts.attempts = 1;

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
    debug!(host = %host, "dns probe");

    let (a, aaaa, cname) = tokio::join!(
        resolver.lookup(host, RecordType::A),
        resolver.lookup(host, RecordType::AAAA),
        resolver.lookup(host, RecordType::CNAME),
    );

    let a_records = a
        .map(|lookup| {
            lookup
                .record_iter()
                .filter_map(|record| match record.data() {
                    Some(RData::A(ip)) => Some(AddressRecord {
                        ip: ip.to_string(),
                        ttl: record.ttl(),
                    }),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let aaaa_records = aaaa
        .map(|lookup| {
            lookup
                .record_iter()
                .filter_map(|record| match record.data() {
                    Some(RData::AAAA(ip)) => Some(AddressRecord {
                        ip: ip.to_string(),
                        ttl: record.ttl(),
                    }),
                    _ => None,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let cname = cname.ok().and_then(|lookup| {
        lookup.record_iter().find_map(|record| match record.data() {
            Some(RData::CNAME(name)) => {
                Some(name.to_string().trim_end_matches('.').to_string())
            }
            _ => None,
        })
    });

    if a_records.is_empty() && aaaa_records.is_empty() && cname.is_none() {
        return CollectorOutput::err(format!("no DNS records resolved for {}", host));
    }

    CollectorOutput::ok(DnsFacts {
        a_records,
        aaaa_records,
        cname,
    })
}
