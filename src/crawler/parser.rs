//! Link extraction and rewriting for HTML and CSS
//!
//! This module handles:
//! - Collecting `href` and `src` attribute values from HTML, with link text
//! - Collecting `url(...)` references from stylesheets
//! - Rewriting those values in place for mirrored documents
//!
//! Extraction only reads; it neither resolves nor filters. That is the
//! spider's job.

use regex::{Captures, Regex};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::sync::LazyLock;

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*["']?([^"')]+)["']?\s*\)"#).expect("CSS_URL: hardcoded regex is valid")
});

static CHAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|amp|quot|apos|lt|gt);")
        .expect("CHAR_REF: hardcoded regex is valid")
});

/// Decodes the character references that occur in URL attributes
///
/// `lol_html` hands out attribute values as written in the source, while
/// `scraper` decodes them; lookups keyed on extracted values need this.
pub(crate) fn decode_char_refs(value: &str) -> Cow<'_, str> {
    CHAR_REF.replace_all(value, |caps: &Captures| {
        let name = &caps[1];
        let decoded = match name {
            "amp" => Some('&'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "lt" => Some('<'),
            "gt" => Some('>'),
            _ => {
                let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok(),
                    None => name[1..].parse().ok(),
                };
                code.and_then(char::from_u32)
            }
        };
        decoded.map_or_else(|| caps[0].to_string(), String::from)
    })
}

/// The attribute scanned in HTML documents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAttribute {
    /// Hyperlinks: `<a href>`, `<link href>`, `<area href>`
    Href,

    /// Embedded resources: `<img src>`, `<script src>`, `<iframe src>`
    Src,
}

impl LinkAttribute {
    pub fn name(self) -> &'static str {
        match self {
            LinkAttribute::Href => "href",
            LinkAttribute::Src => "src",
        }
    }
}

/// A raw reference found in a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// The attribute or `url()` value exactly as written
    pub raw: String,

    /// Text content of the element, for `href` links only
    pub text: Option<String>,
}

/// Collects the values of `attribute` on every element carrying it
///
/// # Example
///
/// ```
/// use spinneret::crawler::{extract_html_links, LinkAttribute};
///
/// let html = r#"<p><a href="/a">First</a> <img src="/i.png"></p>"#;
/// let links = extract_html_links(html, LinkAttribute::Href);
/// assert_eq!(links[0].raw, "/a");
/// assert_eq!(links[0].text.as_deref(), Some("First"));
/// ```
pub fn extract_html_links(html: &str, attribute: LinkAttribute) -> Vec<ExtractedLink> {
    let document = Html::parse_document(html);
    let name = attribute.name();

    let Ok(selector) = Selector::parse(&format!("[{}]", name)) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let raw = element.value().attr(name)?.to_string();
            let text = match attribute {
                LinkAttribute::Href => {
                    let text = element.text().collect::<String>();
                    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                    (!text.is_empty()).then_some(text)
                }
                LinkAttribute::Src => None,
            };
            Some(ExtractedLink { raw, text })
        })
        .collect()
}

/// Collects every `url(...)` reference in a stylesheet, skipping `data:` URIs
pub fn extract_css_urls(css: &str) -> Vec<String> {
    CSS_URL
        .captures_iter(css)
        .filter_map(|caps| {
            let raw = caps.get(1)?.as_str().trim();
            if raw.is_empty() || raw.to_ascii_lowercase().starts_with("data:") {
                None
            } else {
                Some(raw.to_string())
            }
        })
        .collect()
}

/// Rewrites `href` and/or `src` attributes of an HTML document
///
/// `replace` receives each attribute value, with character references
/// decoded, and returns its replacement, or `None` to leave it alone. Whenever a `src` is rewritten, the element's
/// `srcset` is dropped so browsers do not bypass the new value.
pub fn rewrite_html<F>(
    html: &[u8],
    href: bool,
    src: bool,
    replace: F,
) -> Result<Vec<u8>, lol_html::errors::RewritingError>
where
    F: Fn(&str) -> Option<String>,
{
    use lol_html::{element, HtmlRewriter, Settings};

    let replace = &replace;
    let mut output = Vec::with_capacity(html.len());
    let mut handlers = Vec::new();

    if href {
        handlers.push(element!("[href]", move |el| {
            if let Some(value) = el.get_attribute("href") {
                if let Some(new_value) = replace(&decode_char_refs(&value)) {
                    el.set_attribute("href", &new_value)?;
                }
            }
            Ok(())
        }));
    }

    if src {
        handlers.push(element!("[src]", move |el| {
            if let Some(value) = el.get_attribute("src") {
                if let Some(new_value) = replace(&decode_char_refs(&value)) {
                    el.set_attribute("src", &new_value)?;
                    el.remove_attribute("srcset");
                }
            }
            Ok(())
        }));
    }

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );
    rewriter.write(html)?;
    rewriter.end()?;

    Ok(output)
}

/// Rewrites every `url(...)` reference of a stylesheet
///
/// `data:` URIs are passed through untouched.
pub fn rewrite_css<F>(css: &str, replace: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    CSS_URL
        .replace_all(css, |caps: &Captures| {
            let whole = &caps[0];
            let raw = caps[1].trim();
            if raw.to_ascii_lowercase().starts_with("data:") {
                return whole.to_string();
            }
            match replace(raw) {
                Some(new_value) => whole.replacen(raw, &new_value, 1),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_href_with_text() {
        let html = r#"<html><body>
            <a href="/one">  One
              link </a>
            <a href="two.html"><img src="/logo.png"></a>
            <link rel="stylesheet" href="/style.css">
        </body></html>"#;

        let links = extract_html_links(html, LinkAttribute::Href);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].raw, "/one");
        assert_eq!(links[0].text.as_deref(), Some("One link"));
        assert_eq!(links[1].raw, "two.html");
        assert_eq!(links[1].text, None);
        assert_eq!(links[2].raw, "/style.css");
    }

    #[test]
    fn test_extract_src_has_no_text() {
        let html = r#"<img src="/a.png" alt="x"><script src="/app.js">var x;</script>"#;
        let links = extract_html_links(html, LinkAttribute::Src);
        let raws: Vec<_> = links.iter().map(|l| l.raw.as_str()).collect();
        assert_eq!(raws, vec!["/a.png", "/app.js"]);
        assert!(links.iter().all(|l| l.text.is_none()));
    }

    #[test]
    fn test_extract_keeps_empty_and_special_values() {
        // Filtering of these happens during discovery
        let html = r##"<a href="">e</a><a href="#top">t</a><a href="mailto:x@example.com">m</a>"##;
        let links = extract_html_links(html, LinkAttribute::Href);
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn test_extract_css_urls() {
        let css = r#"
            body { background: url("/img/bg.png"); }
            .a { background: url('sprite.gif') }
            .b { background: url( plain.jpg ) }
            .c { background: url(data:image/png;base64,AAAA) }
            @font-face { src: url(/fonts/f.woff2) format("woff2"); }
        "#;
        let urls = extract_css_urls(css);
        assert_eq!(
            urls,
            vec!["/img/bg.png", "sprite.gif", "plain.jpg", "/fonts/f.woff2"]
        );
    }

    #[test]
    fn test_rewrite_html_href_only() {
        let html = br#"<a href="/a">A</a><img src="/i.png">"#;
        let out = rewrite_html(html, true, false, |v| Some(format!("local{}", v))).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"href="local/a""#));
        assert!(out.contains(r#"src="/i.png""#));
    }

    #[test]
    fn test_rewrite_html_src_drops_srcset() {
        let html = br#"<img src="/i.png" srcset="/i@2x.png 2x">"#;
        let out = rewrite_html(html, false, true, |_| Some("i.png".to_string())).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"src="i.png""#));
        assert!(!out.contains("srcset"));
    }

    #[test]
    fn test_rewrite_html_unchanged_when_none() {
        let html = br#"<img src="/i.png" srcset="/i@2x.png 2x">"#;
        let out = rewrite_html(html, true, true, |_| None).unwrap();
        assert_eq!(out, html.to_vec());
    }

    #[test]
    fn test_rewrite_html_matches_decoded_values() {
        let html = br#"<a href="/a?x=1&amp;y=2">A</a><img src="/i&#46;png">"#;
        let out = rewrite_html(html, true, true, |v| match v {
            "/a?x=1&y=2" => Some("a.html".to_string()),
            "/i.png" => Some("i.png".to_string()),
            _ => None,
        })
        .unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains(r#"href="a.html""#));
        assert!(out.contains(r#"src="i.png""#));
    }

    #[test]
    fn test_decode_char_refs() {
        assert_eq!(decode_char_refs("/plain"), "/plain");
        assert_eq!(decode_char_refs("?a=1&amp;b=&quot;2&quot;"), "?a=1&b=\"2\"");
        assert_eq!(decode_char_refs("&#x41;&#66;&#39;"), "AB'");
        // Unknown names and invalid code points stay as written
        assert_eq!(decode_char_refs("&nbsp;&#xD800;"), "&nbsp;&#xD800;");
        assert_eq!(decode_char_refs("a&b"), "a&b");
    }

    #[test]
    fn test_rewrite_css() {
        let css = r#"a { background: url("/bg.png") } b { background: url(data:x) }"#;
        let out = rewrite_css(css, |v| Some(format!("..{}", v)));
        assert_eq!(
            out,
            r#"a { background: url("../bg.png") } b { background: url(data:x) }"#
        );
    }
}
