//! Per-page signal extraction from sampled HTML.
//!
//! Parsing goes through the `scraper` DOM, never regexes. The semantic
//! contract is stable: title, meta description, canonical, H1-H6, schema,
//! images, anchors, and the boolean hygiene signals.

use scraper::{Html, Selector};
use url::Url;

use crate::types::identity::normalize_url;
use crate::types::snapshot::{HeadingCounts, ImageRef, PageSignals};

use super::links::classify_links;
use super::schema::extract_schema_blocks;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector parses")
}

/// Extract all per-page signals from one HTML document.
pub fn page_signals(url: &str, status: u16, html: &str) -> PageSignals {
    let document = Html::parse_document(html);
    let mut page = PageSignals::zeroed(url, status);
    page.html_sampled = true;

    let base_url = Url::parse(url).ok();

    page.title = first_text(&document, "title");
    page.title_length = page.title.as_deref().map(|t| t.chars().count()).unwrap_or(0);

    page.meta_description = first_attr(&document, "meta[name=\"description\"]", "content")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    page.meta_description_length = page
        .meta_description
        .as_deref()
        .map(|d| d.chars().count())
        .unwrap_or(0);

    page.canonical = first_attr(&document, "link[rel=\"canonical\"]", "href")
        .and_then(|href| base_url.as_ref().and_then(|b| b.join(&href).ok()))
        .map(|u| u.to_string());
    page.canonical_self = page.canonical.as_deref().map(|canonical| {
        match (normalize_url(canonical), normalize_url(url)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    });

    let h1_sel = selector("h1");
    let h1s: Vec<String> = document
        .select(&h1_sel)
        .map(|el| collect_text(&el))
        .collect();
    page.h1_count = h1s.len();
    page.h1 = h1s.into_iter().next().filter(|t| !t.is_empty());

    page.headings = HeadingCounts {
        h2: count(&document, "h2"),
        h3: count(&document, "h3"),
        h4: count(&document, "h4"),
        h5: count(&document, "h5"),
        h6: count(&document, "h6"),
    };

    page.schema = extract_schema_blocks(&document);

    let img_sel = selector("img");
    page.images = document
        .select(&img_sel)
        .filter_map(|el| {
            let src = el.value().attr("src")?.to_string();
            Some(ImageRef {
                src,
                alt: el.value().attr("alt").map(String::from),
                width: el.value().attr("width").and_then(|w| w.parse().ok()),
                height: el.value().attr("height").and_then(|h| h.parse().ok()),
            })
        })
        .collect();

    if let Some(base) = &base_url {
        page.links = classify_links(&document, base);
        if base.scheme() == "https" {
            page.mixed_content = insecure_resources(&document);
        }
    }

    page.has_viewport = exists(&document, "meta[name=\"viewport\"]");
    page.has_lang = first_attr(&document, "html", "lang")
        .map(|lang| !lang.trim().is_empty())
        .unwrap_or(false);
    page.has_charset = exists(&document, "meta[charset]")
        || first_attr(&document, "meta[http-equiv=\"Content-Type\"]", "content")
            .map(|c| c.to_lowercase().contains("charset"))
            .unwrap_or(false);

    page.word_count = body_word_count(&document);

    page
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let sel = selector(css);
    document
        .select(&sel)
        .next()
        .map(|el| collect_text(&el))
        .filter(|t| !t.is_empty())
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    let sel = selector(css);
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(String::from)
}

fn exists(document: &Html, css: &str) -> bool {
    let sel = selector(css);
    document.select(&sel).next().is_some()
}

fn count(document: &Html, css: &str) -> usize {
    let sel = selector(css);
    document.select(&sel).count()
}

fn collect_text(el: &scraper::ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// http:// resources referenced from the document (scripts, styles,
/// images, frames).
fn insecure_resources(document: &Html) -> Vec<String> {
    let mut found = Vec::new();
    for (css, attr) in [
        ("img[src]", "src"),
        ("script[src]", "src"),
        ("link[href]", "href"),
        ("iframe[src]", "src"),
    ] {
        let sel = selector(css);
        for el in document.select(&sel) {
            if let Some(value) = el.value().attr(attr) {
                if value.starts_with("http://") && !found.contains(&value.to_string()) {
                    found.push(value.to_string());
                }
            }
        }
    }
    found
}

fn body_word_count(document: &Html) -> usize {
    let sel = selector("body");
    document
        .select(&sel)
        .next()
        .map(|body| body.text().collect::<String>().split_whitespace().count())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Acme Widgets - Home</title>
  <meta name="description" content="Widgets for every occasion.">
  <link rel="canonical" href="https://example.com/">
</head>
<body>
  <h1>Acme Widgets</h1>
  <h2>Featured</h2>
  <h2>New arrivals</h2>
  <img src="/hero.png" alt="A pile of widgets" width="800" height="400">
  <img src="/naked.png">
  <a href="/about">About us</a>
  <a href="https://partner.example.org/deal" rel="nofollow">Partner</a>
  <p>Widgets are great. Buy widgets today.</p>
</body>
</html>"#;

    #[test]
    fn test_basic_signals() {
        let page = page_signals("https://example.com/", 200, PAGE);

        assert_eq!(page.title.as_deref(), Some("Acme Widgets - Home"));
        assert_eq!(page.title_length, 19);
        assert_eq!(
            page.meta_description.as_deref(),
            Some("Widgets for every occasion.")
        );
        assert_eq!(page.h1.as_deref(), Some("Acme Widgets"));
        assert_eq!(page.h1_count, 1);
        assert_eq!(page.headings.h2, 2);
        assert!(page.has_viewport);
        assert!(page.has_lang);
        assert!(page.has_charset);
        assert!(page.word_count > 5);
    }

    #[test]
    fn test_canonical_self_detection() {
        let page = page_signals("https://example.com/", 200, PAGE);
        assert_eq!(page.canonical.as_deref(), Some("https://example.com/"));
        assert_eq!(page.canonical_self, Some(true));

        let other = PAGE.replace(
            "href=\"https://example.com/\"",
            "href=\"https://example.com/other\"",
        );
        let page = page_signals("https://example.com/", 200, &other);
        assert_eq!(page.canonical_self, Some(false));
    }

    #[test]
    fn test_images_and_alt() {
        let page = page_signals("https://example.com/", 200, PAGE);
        assert_eq!(page.images.len(), 2);
        assert_eq!(page.images[0].alt.as_deref(), Some("A pile of widgets"));
        assert_eq!(page.images[0].width, Some(800));
        assert!(page.images[1].alt.is_none());
    }

    #[test]
    fn test_mixed_content_only_on_https() {
        let html = r#"<html><body><img src="http://cdn.example.com/a.png"></body></html>"#;

        let https_page = page_signals("https://example.com/", 200, html);
        assert_eq!(https_page.mixed_content.len(), 1);

        let http_page = page_signals("http://example.com/", 200, html);
        assert!(http_page.mixed_content.is_empty());
    }

    #[test]
    fn test_missing_everything() {
        let page = page_signals("https://example.com/bare", 200, "<html><body></body></html>");
        assert!(page.title.is_none());
        assert!(page.meta_description.is_none());
        assert!(page.h1.is_none());
        assert!(!page.has_viewport);
        assert!(!page.has_lang);
        assert_eq!(page.word_count, 0);
    }
}
