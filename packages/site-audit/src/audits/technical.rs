//! On-page and technical SEO audit.
//!
//! Page-content rules (titles, descriptions, headings, content depth)
//! carry the `on-page-seo` source; markup-hygiene rules (canonicals,
//! viewport, schema, mixed content) carry `technical-seo`. One finding per
//! pattern, aggregating affected URLs.

use std::collections::HashMap;

use crate::types::finding::{AuditSource, Evidence, Finding, FindingKind, Severity};
use crate::types::raw::RawSnapshot;
use crate::types::snapshot::{PageSignals, SiteSnapshot};

/// Title length bounds (characters).
const TITLE_MIN: usize = 10;
const TITLE_MAX: usize = 60;

/// Meta description length bounds (characters).
const META_DESC_MIN: usize = 50;
const META_DESC_MAX: usize = 160;

/// Pages below this word count are thin.
const THIN_CONTENT_WORDS: usize = 200;

/// Run every on-page and technical rule.
pub fn audit(snapshot: &SiteSnapshot, _raw: &RawSnapshot) -> Vec<Finding> {
    let pages: Vec<&PageSignals> = snapshot
        .pages
        .iter()
        .filter(|p| p.html_sampled && p.status == 200)
        .collect();

    let mut findings = Vec::new();
    if pages.is_empty() {
        return findings;
    }

    title_rules(&pages, &mut findings);
    meta_description_rules(&pages, &mut findings);
    heading_rules(&pages, &mut findings);
    canonical_rules(&pages, &mut findings);
    hygiene_rules(&pages, &mut findings);
    schema_rules(&pages, &mut findings);
    content_rules(&pages, &mut findings);

    findings
}

/// Collect URLs of pages matching a predicate.
fn urls_where(pages: &[&PageSignals], predicate: impl Fn(&PageSignals) -> bool) -> Vec<String> {
    let mut urls = Vec::new();
    for page in pages.iter().copied() {
        if predicate(page) {
            urls.push(page.url.clone());
        }
    }
    urls
}

fn title_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let missing = urls_where(pages, |p| p.title.is_none());
    if !missing.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingTitle,
                Severity::Warning,
                AuditSource::OnPageSeo,
                format!("{} page(s) have no title tag", missing.len()),
            )
            .with_evidence(Evidence::Urls { urls: missing.clone() })
            .with_urls(missing)
            .with_fix("Write a unique, descriptive <title> for each page")
            .with_why("The title tag is the strongest on-page relevance signal and the headline of the search snippet"),
        );
    }

    let too_long = urls_where(pages, |p| p.title_length > TITLE_MAX);
    if !too_long.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechTitleTooLong,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!(
                    "{} title(s) exceed {} characters and will truncate in results",
                    too_long.len(),
                    TITLE_MAX
                ),
            )
            .with_evidence(Evidence::Urls { urls: too_long.clone() })
            .with_urls(too_long)
            .with_fix("Tighten titles to roughly 50-60 characters")
            .with_why("Truncated titles lose their call to action in the snippet"),
        );
    }

    let too_short = urls_where(pages, |p| p.title.is_some() && p.title_length < TITLE_MIN);
    if !too_short.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechTitleTooShort,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!("{} title(s) are under {} characters", too_short.len(), TITLE_MIN),
            )
            .with_evidence(Evidence::Urls { urls: too_short.clone() })
            .with_urls(too_short)
            .with_fix("Expand the short titles with descriptive keywords")
            .with_why("Very short titles waste the snippet's strongest relevance slot"),
        );
    }

    duplicate_rule(
        pages,
        |p| p.title.clone(),
        FindingKind::TechDuplicateTitle,
        "title",
        findings,
    );
}

fn meta_description_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let missing = urls_where(pages, |p| p.meta_description.is_none());
    if !missing.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingMetaDesc,
                Severity::Warning,
                AuditSource::OnPageSeo,
                format!("{} page(s) have no meta description", missing.len()),
            )
            .with_evidence(Evidence::Urls { urls: missing.clone() })
            .with_urls(missing)
            .with_fix("Add a meta description summarizing each page in one or two sentences")
            .with_why("Without one, search engines improvise the snippet from arbitrary page text"),
        );
    }

    let too_long = urls_where(pages, |p| p.meta_description_length > META_DESC_MAX);
    if !too_long.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMetaDescTooLong,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!(
                    "{} meta description(s) exceed {} characters",
                    too_long.len(),
                    META_DESC_MAX
                ),
            )
            .with_evidence(Evidence::Urls { urls: too_long.clone() })
            .with_urls(too_long)
            .with_fix("Trim descriptions to roughly 150-160 characters")
            .with_why("Overlong descriptions are cut mid-sentence in the snippet"),
        );
    }

    let too_short = urls_where(pages, |p| {
        p.meta_description.is_some() && p.meta_description_length < META_DESC_MIN
    });
    if !too_short.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMetaDescTooShort,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!(
                    "{} meta description(s) are under {} characters",
                    too_short.len(),
                    META_DESC_MIN
                ),
            )
            .with_evidence(Evidence::Urls { urls: too_short.clone() })
            .with_urls(too_short)
            .with_fix("Expand the short descriptions to use the full snippet space")
            .with_why("A thin description undersells the page against competing results"),
        );
    }

    duplicate_rule(
        pages,
        |p| p.meta_description.clone(),
        FindingKind::TechDuplicateMetaDesc,
        "meta description",
        findings,
    );
}

/// One finding per duplicated value-class, aggregating every affected URL.
fn duplicate_rule(
    pages: &[&PageSignals],
    value: impl Fn(&PageSignals) -> Option<String>,
    kind: FindingKind,
    label: &str,
    findings: &mut Vec<Finding>,
) {
    let mut by_value: HashMap<String, Vec<String>> = HashMap::new();
    for page in pages.iter().copied() {
        if let Some(v) = value(page) {
            by_value.entry(v).or_default().push(page.url.clone());
        }
    }

    let mut affected: Vec<String> = Vec::new();
    let mut sample = None;
    for (v, urls) in by_value {
        if urls.len() >= 2 {
            sample.get_or_insert(v);
            affected.extend(urls);
        }
    }
    affected.sort();

    if !affected.is_empty() {
        let severity = if kind == FindingKind::TechDuplicateTitle {
            Severity::Warning
        } else {
            Severity::Info
        };
        findings.push(
            Finding::new(
                kind,
                severity,
                AuditSource::OnPageSeo,
                format!("{} page(s) share the same {}", affected.len(), label),
            )
            .with_evidence(Evidence::TextSample {
                text: sample.unwrap_or_default(),
            })
            .with_urls(affected)
            .with_fix(format!("Give each page a unique {}", label))
            .with_why("Duplicates make the affected pages compete with each other for the same query"),
        );
    }
}

fn heading_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let missing = urls_where(pages, |p| p.h1_count == 0);
    if !missing.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingH1,
                Severity::Warning,
                AuditSource::OnPageSeo,
                format!("{} page(s) have no H1 heading", missing.len()),
            )
            .with_evidence(Evidence::Urls { urls: missing.clone() })
            .with_urls(missing)
            .with_fix("Add exactly one H1 naming the page's topic")
            .with_why("The H1 anchors the page's topical hierarchy for crawlers and screen readers"),
        );
    }

    let multiple = urls_where(pages, |p| p.h1_count > 1);
    if !multiple.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMultipleH1,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!("{} page(s) have more than one H1", multiple.len()),
            )
            .with_evidence(Evidence::Urls { urls: multiple.clone() })
            .with_urls(multiple)
            .with_fix("Demote extra H1s to H2")
            .with_why("Multiple H1s blur which heading states the page's topic"),
        );
    }
}

fn canonical_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let missing = urls_where(pages, |p| p.canonical.is_none());
    if !missing.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingCanonical,
                Severity::Info,
                AuditSource::TechnicalSeo,
                format!("{} page(s) declare no canonical URL", missing.len()),
            )
            .with_evidence(Evidence::Urls { urls: missing.clone() })
            .with_urls(missing)
            .with_fix("Add a self-referencing rel=canonical link to each page")
            .with_why("Explicit canonicals prevent parameter and variant URLs from splitting indexing signals"),
        );
    }

    let mismatched = urls_where(pages, |p| p.canonical_self == Some(false));
    if !mismatched.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechCanonicalMismatch,
                Severity::Warning,
                AuditSource::TechnicalSeo,
                format!(
                    "{} page(s) canonicalize to a different URL",
                    mismatched.len()
                ),
            )
            .with_evidence(Evidence::Urls { urls: mismatched.clone() })
            .with_urls(mismatched)
            .with_fix("Verify each cross-page canonical is intentional; self-reference otherwise")
            .with_why("A stray canonical silently deindexes the page it sits on"),
        );
    }
}

fn hygiene_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let no_viewport = urls_where(pages, |p| !p.has_viewport);
    if !no_viewport.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingViewport,
                Severity::Warning,
                AuditSource::TechnicalSeo,
                format!("{} page(s) have no viewport meta tag", no_viewport.len()),
            )
            .with_evidence(Evidence::Urls { urls: no_viewport.clone() })
            .with_urls(no_viewport)
            .with_fix("Add <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">")
            .with_why("Without a viewport, phones render the desktop layout and mobile rankings suffer"),
        );
    }

    let no_lang = urls_where(pages, |p| !p.has_lang);
    if !no_lang.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingLang,
                Severity::Info,
                AuditSource::TechnicalSeo,
                format!("{} page(s) omit the html lang attribute", no_lang.len()),
            )
            .with_evidence(Evidence::Urls { urls: no_lang.clone() })
            .with_urls(no_lang)
            .with_fix("Declare the document language, e.g. <html lang=\"en\">")
            .with_why("The lang attribute drives screen-reader pronunciation and language targeting"),
        );
    }

    let no_charset = urls_where(pages, |p| !p.has_charset);
    if !no_charset.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingCharset,
                Severity::Info,
                AuditSource::TechnicalSeo,
                format!("{} page(s) declare no character encoding", no_charset.len()),
            )
            .with_evidence(Evidence::Urls { urls: no_charset.clone() })
            .with_urls(no_charset)
            .with_fix("Add <meta charset=\"utf-8\"> first in <head>")
            .with_why("Undeclared encodings invite mojibake on non-ASCII content"),
        );
    }

    let mixed: Vec<&PageSignals> = pages
        .iter()
        .filter(|p| !p.mixed_content.is_empty())
        .copied()
        .collect();
    if !mixed.is_empty() {
        let resources: Vec<String> = mixed
            .iter()
            .flat_map(|p| p.mixed_content.iter().cloned())
            .collect();
        findings.push(
            Finding::new(
                FindingKind::TechMixedContent,
                Severity::Warning,
                AuditSource::TechnicalSeo,
                format!(
                    "{} HTTPS page(s) load insecure http:// resources",
                    mixed.len()
                ),
            )
            .with_evidence(Evidence::Urls { urls: resources })
            .with_urls(mixed.iter().map(|p| p.url.clone()).collect::<Vec<_>>())
            .with_fix("Serve every subresource over https://")
            .with_why("Browsers block or downgrade mixed content and drop the padlock"),
        );
    }
}

fn schema_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let invalid: Vec<String> = pages
        .iter()
        .filter(|p| p.schema.iter().any(|s| !s.valid))
        .map(|p| p.url.clone())
        .collect();
    if !invalid.is_empty() {
        let errors: Vec<String> = pages
            .iter()
            .flat_map(|p| p.schema.iter().filter(|s| !s.valid))
            .flat_map(|s| s.errors.iter().cloned())
            .take(10)
            .collect();
        findings.push(
            Finding::new(
                FindingKind::TechInvalidSchema,
                Severity::Warning,
                AuditSource::TechnicalSeo,
                format!("{} page(s) carry invalid JSON-LD", invalid.len()),
            )
            .with_evidence(Evidence::TextSample {
                text: errors.join("; "),
            })
            .with_urls(invalid)
            .with_fix("Repair the JSON-LD blocks so they parse and declare @type/@context")
            .with_why("Invalid structured data is ignored wholesale, forfeiting rich results"),
        );
    }

    if pages.iter().all(|p| p.schema.is_empty()) {
        findings.push(
            Finding::new(
                FindingKind::TechMissingSchema,
                Severity::Info,
                AuditSource::TechnicalSeo,
                "No structured data was found on any sampled page",
            )
            .with_fix("Add JSON-LD for the site's core entities (Organization, Product, Article)")
            .with_why("Structured data unlocks rich results and disambiguates the site's entities"),
        );
    }
}

fn content_rules(pages: &[&PageSignals], findings: &mut Vec<Finding>) {
    let missing_alt: Vec<String> = pages
        .iter()
        .filter(|p| {
            p.images
                .iter()
                .any(|img| img.alt.as_deref().map(str::trim).unwrap_or("").is_empty())
        })
        .map(|p| p.url.clone())
        .collect();
    if !missing_alt.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechMissingAltText,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!("{} page(s) have images without alt text", missing_alt.len()),
            )
            .with_evidence(Evidence::Urls { urls: missing_alt.clone() })
            .with_urls(missing_alt)
            .with_fix("Describe each meaningful image in its alt attribute")
            .with_why("Alt text is the only image signal screen readers and image search receive"),
        );
    }

    let thin = urls_where(pages, |p| p.word_count > 0 && p.word_count < THIN_CONTENT_WORDS);
    if !thin.is_empty() {
        findings.push(
            Finding::new(
                FindingKind::TechThinContent,
                Severity::Info,
                AuditSource::OnPageSeo,
                format!(
                    "{} page(s) have under {} words of content",
                    thin.len(),
                    THIN_CONTENT_WORDS
                ),
            )
            .with_evidence(Evidence::Urls { urls: thin.clone() })
            .with_urls(thin)
            .with_fix("Deepen the thin pages or consolidate them into stronger ones")
            .with_why("Thin pages rarely rank and can drag down sitewide quality assessments"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::snapshots::{site_snapshot_from_pages, PageBuilder};
    use crate::types::raw::RawSnapshot;
    use crate::types::identity::AuditIdentity;

    fn raw() -> RawSnapshot {
        RawSnapshot::empty(AuditIdentity::new("https://example.com", None, "t", "p").unwrap())
    }

    #[test]
    fn test_duplicate_title_and_long_description() {
        let snapshot = site_snapshot_from_pages(vec![
            PageBuilder::new("https://example.com/a")
                .title("X")
                .meta_description(&"d".repeat(250))
                .build(),
            PageBuilder::new("https://example.com/b")
                .title("X")
                .meta_description(&"d".repeat(250))
                .build(),
        ]);

        let findings = audit(&snapshot, &raw());

        let duplicate = findings
            .iter()
            .find(|f| f.kind == FindingKind::TechDuplicateTitle)
            .expect("duplicate title expected");
        assert_eq!(duplicate.severity, Severity::Warning);
        assert_eq!(duplicate.affected_urls.len(), 2);

        let long_desc = findings
            .iter()
            .find(|f| f.kind == FindingKind::TechMetaDescTooLong)
            .expect("long description expected");
        assert_eq!(long_desc.severity, Severity::Info);
        assert_eq!(long_desc.affected_urls.len(), 2);

        assert!(!findings
            .iter()
            .any(|f| f.kind == FindingKind::TechMissingTitle));
    }

    #[test]
    fn test_missing_title_flagged_once_with_urls() {
        let snapshot = site_snapshot_from_pages(vec![
            PageBuilder::new("https://example.com/a").build(),
            PageBuilder::new("https://example.com/b").build(),
        ]);

        let findings = audit(&snapshot, &raw());
        let missing: Vec<_> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::TechMissingTitle)
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].affected_urls.len(), 2);
    }

    #[test]
    fn test_non_html_pages_ignored() {
        let mut page = PageBuilder::new("https://example.com/feed.xml").build();
        page.html_sampled = false;
        let snapshot = site_snapshot_from_pages(vec![page]);

        let findings = audit(&snapshot, &raw());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_canonical_mismatch() {
        let mut page = PageBuilder::new("https://example.com/a")
            .title("A page title here")
            .build();
        page.canonical = Some("https://example.com/other".to_string());
        page.canonical_self = Some(false);

        let snapshot = site_snapshot_from_pages(vec![page]);
        let findings = audit(&snapshot, &raw());
        assert!(findings
            .iter()
            .any(|f| f.kind == FindingKind::TechCanonicalMismatch
                && f.severity == Severity::Warning));
    }
}
