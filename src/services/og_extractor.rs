//! Open Graph tag extraction.

use crate::models::preview::OgData;
use scraper::{Html, Selector};

/// Collect every `<meta property="og:*" content="...">` in `html`.
///
/// The prefix check is case-insensitive but keys keep their original
/// spelling. A missing `content` becomes an empty string, and when a
/// property repeats, the last one in document order wins. Markup that
/// fails to parse cleanly is handled best-effort; no tags means an empty map.
pub fn extract(html: &str) -> OgData {
    let document = Html::parse_document(html);
    let mut tags = OgData::new();

    let Ok(selector) = Selector::parse("meta[property]") else {
        return tags;
    };

    for meta in document.select(&selector) {
        let element = meta.value();
        let Some(property) = element.attr("property") else {
            continue;
        };
        if !property.to_lowercase().starts_with("og:") {
            continue;
        }
        let content = element.attr("content").unwrap_or_default();
        tags.insert(property.to_string(), content.to_string());
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_prefix_case_insensitively_and_keeps_key_case() {
        let html = r#"
            <html><head>
              <meta property="og:title" content="T">
              <meta property="OG:Image" content="I">
            </head></html>
        "#;

        let tags = extract(html);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["og:title"], "T");
        assert_eq!(tags["OG:Image"], "I");
    }

    #[test]
    fn returns_empty_map_without_og_tags() {
        let html = r#"
            <html><head>
              <title>Plain</title>
              <meta name="description" content="nothing here">
              <meta property="twitter:card" content="summary">
            </head></html>
        "#;

        assert!(extract(html).is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn last_duplicate_wins() {
        let html = r#"
            <meta property="og:title" content="first">
            <meta property="og:title" content="second">
        "#;

        let tags = extract(html);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["og:title"], "second");
    }

    #[test]
    fn missing_content_becomes_empty_string() {
        let tags = extract(r#"<meta property="og:type">"#);
        assert_eq!(tags["og:type"], "");
    }

    #[test]
    fn ignores_name_attribute_og_tags() {
        let tags = extract(r#"<meta name="og:title" content="by name">"#);
        assert!(tags.is_empty());
    }

    #[test]
    fn tolerates_malformed_markup() {
        let html = r#"<html><head><meta property="og:url" content="https://example.com"
            <div><p>unclosed <meta property="og:site_name" content="Site"></span></html"#;

        let tags = extract(html);
        assert_eq!(tags.get("og:site_name").map(String::as_str), Some("Site"));
    }

    #[test]
    fn finds_tags_outside_head() {
        let html = r#"<body><meta property="og:description" content="D"></body>"#;
        assert_eq!(extract(html)["og:description"], "D");
    }
}
