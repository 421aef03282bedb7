//! Sitemap discovery: seeded from robots.txt plus common paths, BFS through
//! sitemap indexes, gzip-aware, capped.

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashSet, VecDeque};
use std::io::Read;
use tracing::{debug, warn};

use crate::fetch::FetchOptions;
use crate::types::collector::CollectorOutput;
use crate::types::raw::{RobotsFacts, SitemapDoc, SitemapFacts};

use super::CollectorContext;

const COMMON_PATHS: [&str; 2] = ["/sitemap.xml", "/sitemap_index.xml"];
const SITEMAP_MAX_BYTES: usize = 16 * 1024 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Discover sitemaps and extract their URLs.
pub async fn collect(
    ctx: &CollectorContext,
    robots: Option<&RobotsFacts>,
) -> CollectorOutput<SitemapFacts> {
    let origin = ctx.identity.origin();

    let mut queue: VecDeque<String> = VecDeque::new();
    let mut seen: HashSet<String> = HashSet::new();

    if let Some(robots) = robots {
        for sitemap_ref in &robots.sitemap_refs {
            if seen.insert(sitemap_ref.clone()) {
                queue.push_back(sitemap_ref.clone());
            }
        }
    }
    for path in COMMON_PATHS {
        let url = format!("{}{}", origin, path);
        if seen.insert(url.clone()) {
            queue.push_back(url);
        }
    }

    let mut documents: Vec<SitemapDoc> = Vec::new();
    let mut urls: Vec<String> = Vec::new();
    let mut url_seen: HashSet<String> = HashSet::new();
    let mut truncated = false;

    while let Some(doc_url) = queue.pop_front() {
        if documents.len() >= ctx.config.max_sitemap_documents {
            truncated = true;
            break;
        }

        debug!(url = %doc_url, "sitemap fetch");
        let options = FetchOptions::default()
            .with_timeout(ctx.config.timeouts.sitemap())
            .with_max_bytes(SITEMAP_MAX_BYTES);

        let fetched = match ctx.fetch.fetch(&doc_url, options).await.data {
            Some(f) => f,
            None => {
                warn!(url = %doc_url, "sitemap fetch failed");
                continue;
            }
        };

        if fetched.status != 200 {
            // Only record misses for explicitly-referenced sitemaps
            continue;
        }

        let xml = match decode_body(&doc_url, &fetched.bytes) {
            Some(xml) => xml,
            None => continue,
        };

        let parsed = parse_sitemap(&xml);

        documents.push(SitemapDoc {
            url: doc_url.clone(),
            status: fetched.status,
            entry_count: parsed.locs.len(),
            is_index: parsed.is_index,
        });

        if parsed.is_index {
            for child in parsed.locs {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        } else {
            for url in parsed.locs {
                if urls.len() >= ctx.config.max_sitemap_urls {
                    truncated = true;
                    break;
                }
                if url_seen.insert(url.clone()) {
                    urls.push(url);
                }
            }
        }
    }

    if documents.is_empty() {
        return CollectorOutput::err("no sitemap documents found");
    }

    CollectorOutput::ok(SitemapFacts {
        documents,
        urls,
        truncated,
    })
}

/// Gunzip when the payload is gzip (by extension or magic bytes).
fn decode_body(url: &str, bytes: &[u8]) -> Option<String> {
    let gzipped = url.ends_with(".gz") || bytes.starts_with(&GZIP_MAGIC);
    if gzipped {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = String::new();
        match decoder.read_to_string(&mut out) {
            Ok(_) => Some(out),
            Err(e) => {
                warn!(url = %url, error = %e, "gzip decode failed");
                None
            }
        }
    } else {
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

pub(crate) struct ParsedSitemap {
    pub is_index: bool,
    pub locs: Vec<String>,
}

/// Pull `<loc>` entries out of a sitemap or sitemap-index document.
/// Namespace prefixes are ignored; malformed XML yields whatever parsed.
pub(crate) fn parse_sitemap(xml: &str) -> ParsedSitemap {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut is_index = false;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sitemapindex" => is_index = true,
                b"loc" => in_loc = true,
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim().to_string();
                    if !text.is_empty() {
                        locs.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }

    ParsedSitemap { is_index, locs }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc></url>
  <url><loc>https://example.com/about</loc></url>
</urlset>"#;

        let parsed = parse_sitemap(xml);
        assert!(!parsed.is_index);
        assert_eq!(
            parsed.locs,
            vec!["https://example.com/", "https://example.com/about"]
        );
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/pages.xml</loc></sitemap>
  <sitemap><loc>https://example.com/posts.xml.gz</loc></sitemap>
</sitemapindex>"#;

        let parsed = parse_sitemap(xml);
        assert!(parsed.is_index);
        assert_eq!(parsed.locs.len(), 2);
    }

    #[test]
    fn test_parse_malformed_xml_degrades() {
        let parsed = parse_sitemap("<urlset><url><loc>https://example.com/a</loc>");
        assert_eq!(parsed.locs, vec!["https://example.com/a"]);
    }

    #[test]
    fn test_decode_gzip_body() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<urlset></urlset>").unwrap();
        let compressed = encoder.finish().unwrap();

        let decoded = decode_body("https://example.com/sitemap.xml.gz", &compressed).unwrap();
        assert_eq!(decoded, "<urlset></urlset>");

        // Magic-byte detection without the extension
        let decoded = decode_body("https://example.com/sitemap.xml", &compressed).unwrap();
        assert_eq!(decoded, "<urlset></urlset>");
    }

    #[test]
    fn test_decode_plain_body() {
        let decoded = decode_body("https://example.com/s.xml", b"<urlset/>").unwrap();
        assert_eq!(decoded, "<urlset/>");
    }
}
