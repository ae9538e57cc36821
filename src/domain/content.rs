use crate::domain::links::rewrite_to_page_host;
use ammonia::{Builder, UrlRelative};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static LEADING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*```[a-z]*\s*").expect("valid leading fence pattern"));
static TRAILING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*$").expect("valid trailing fence pattern"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?html.*?>").expect("valid html tag pattern"));
static BODY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</?body.*?>").expect("valid body tag pattern"));

static MAIN_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("main").expect("valid main selector"));
static ARTICLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("article").expect("valid article selector"));
static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

const EXTRA_TAGS: [&str; 4] = ["button", "figure", "figcaption", "section"];

/// Strips markdown code fences and outer document tags from model output.
pub fn clean_model_html(raw: &str) -> String {
    let without_leading = LEADING_FENCE.replace(raw, "");
    let without_trailing = TRAILING_FENCE.replace(&without_leading, "");
    let without_html = HTML_TAG.replace_all(&without_trailing, "");
    let without_body = BODY_TAG.replace_all(&without_html, "");
    without_body.trim().to_string()
}

/// Inner markup of the page's `<main>`, else `<article>`, else `<body>`.
pub fn extract_main_content(document_html: &str) -> String {
    let document = Html::parse_document(document_html);
    for selector in [&*MAIN_SELECTOR, &*ARTICLE_SELECTOR, &*BODY_SELECTOR] {
        if let Some(element) = document.select(selector).next() {
            return element.inner_html();
        }
    }
    document.root_element().inner_html()
}

/// Allow-list sanitizing of model HTML. Links are pinned to the page host on
/// the way through.
pub fn sanitize_summary(html: &str, page_url: &Url) -> String {
    let page_url = page_url.clone();
    Builder::default()
        .add_tags(EXTRA_TAGS)
        .add_tag_attributes("button", ["type"])
        .url_relative(UrlRelative::PassThrough)
        .attribute_filter(move |element, attribute, value| {
            if element == "a" && attribute == "href" {
                if let Some(rewritten) = rewrite_to_page_host(value, &page_url) {
                    return Some(rewritten.into());
                }
            }
            Some(value.into())
        })
        .clean(html)
        .to_string()
}

/// Cleanup followed by sanitizing: what the overlay actually inserts.
pub fn prepare_summary(raw: &str, page_url: &Url) -> String {
    sanitize_summary(&clean_model_html(raw), page_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://site.example/post").expect("valid page url")
    }

    #[test]
    fn strips_code_fences_and_document_tags() {
        let raw = "```html\n<html lang=\"en\"><body class=\"x\"><h1>Title</h1><p>Body</p></body></html>\n```  ";
        assert_eq!(clean_model_html(raw), "<h1>Title</h1><p>Body</p>");
    }

    #[test]
    fn plain_text_survives_cleanup() {
        assert_eq!(clean_model_html("  <p>Already clean</p>\n"), "<p>Already clean</p>");
    }

    #[test]
    fn uppercase_fence_language_is_removed() {
        assert_eq!(clean_model_html("```HTML\n<p>x</p>```"), "<p>x</p>");
    }

    #[test]
    fn extraction_prefers_main_then_article_then_body() {
        let with_main = "<html><body><nav>menu</nav><main><p>core</p></main><article>other</article></body></html>";
        assert_eq!(extract_main_content(with_main), "<p>core</p>");

        let with_article = "<html><body><nav>menu</nav><article><h2>story</h2></article></body></html>";
        assert_eq!(extract_main_content(with_article), "<h2>story</h2>");

        let body_only = "<html><body><p>everything</p></body></html>";
        assert_eq!(extract_main_content(body_only), "<p>everything</p>");
    }

    #[test]
    fn sanitizer_drops_scripts_and_handlers() {
        let html = "<h1 onclick=\"steal()\">Hi</h1><script>alert(1)</script><img src=\"https://site.example/a.png\" alt=\"A\">";
        let sanitized = sanitize_summary(html, &page());
        assert!(!sanitized.contains("script"));
        assert!(!sanitized.contains("onclick"));
        assert!(sanitized.contains("<h1>Hi</h1>"));
        assert!(sanitized.contains("alt=\"A\""));
    }

    #[test]
    fn sanitizer_keeps_buttons_and_rewrites_foreign_links() {
        let html = "<button type=\"button\">Add to Cart</button><a href=\"http://other.example/a?b#c\">next</a>";
        let sanitized = sanitize_summary(html, &page());
        assert!(sanitized.contains("<button type=\"button\">Add to Cart</button>"));
        assert!(sanitized.contains("href=\"https://site.example/a?b#c\""));
        assert!(!sanitized.contains("other.example"));
    }

    #[test]
    fn javascript_urls_are_removed() {
        let sanitized = sanitize_summary("<a href=\"javascript:alert(1)\">x</a>", &page());
        assert!(!sanitized.contains("javascript"));
    }
}
