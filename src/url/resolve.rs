use crate::url::canonicalize;
use crate::UrlError;
use url::{Position, Url};

/// Resolves a discovered link against the page it was found on
///
/// Absolute references are taken as they are, relative ones are resolved
/// with standard base-URI resolution. The result is percent-canonicalized
/// and, when `discard_fragment` is set, loses its fragment.
///
/// The base is expected to be normalized already. Non-HTTP results such as
/// `mailto:` are returned unchanged; rejecting them is the filter's job.
///
/// # Examples
///
/// ```
/// use spinneret::url::resolve_reference;
/// use url::Url;
///
/// let base = Url::parse("https://example.com/c/d/").unwrap();
/// let url = resolve_reference("../x", &base, true).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/c/x");
/// ```
pub fn resolve_reference(raw: &str, base: &Url, discard_fragment: bool) -> Result<Url, UrlError> {
    let mut url = base
        .join(raw.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    canonicalize(&mut url);
    if discard_fragment {
        url.set_fragment(None);
    }

    Ok(url)
}

/// Returns true if `url` points into the same document as `base`
///
/// Two URLs reference the same document when they are identical up to and
/// including the query; only the fragment may differ.
pub fn is_same_document_reference(url: &Url, base: &Url) -> bool {
    url[..Position::AfterQuery] == base[..Position::AfterQuery]
}

/// Returns true if both URLs are identical after canonicalization
pub fn is_equivalent(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    canonicalize(&mut a);
    canonicalize(&mut b);
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_root_relative() {
        let url = resolve_reference("/a/b", &base("https://example.com/c/d"), true).unwrap();
        assert_eq!(url.as_str(), "https://example.com/a/b");
    }

    #[test]
    fn test_parent_relative() {
        let url = resolve_reference("../x", &base("https://example.com/c/d/"), true).unwrap();
        assert_eq!(url.as_str(), "https://example.com/c/x");
    }

    #[test]
    fn test_sibling_relative() {
        let url = resolve_reference("other.html", &base("https://example.com/c/d"), true).unwrap();
        assert_eq!(url.as_str(), "https://example.com/c/other.html");
    }

    #[test]
    fn test_absolute_kept() {
        let url = resolve_reference(
            "https://other.org/page",
            &base("https://example.com/c/d"),
            true,
        )
        .unwrap();
        assert_eq!(url.as_str(), "https://other.org/page");
    }

    #[test]
    fn test_protocol_relative() {
        let url = resolve_reference("//cdn.example.com/x.js", &base("https://example.com/"), true)
            .unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/x.js");
    }

    #[test]
    fn test_fragment_discarded() {
        let url = resolve_reference("/a#top", &base("https://example.com/"), true).unwrap();
        assert_eq!(url.as_str(), "https://example.com/a");
    }

    #[test]
    fn test_fragment_kept_when_not_discarding() {
        let url = resolve_reference("/a#top", &base("https://example.com/"), false).unwrap();
        assert_eq!(url.as_str(), "https://example.com/a#top");
    }

    #[test]
    fn test_mailto_passes_through() {
        let url = resolve_reference("mailto:me@example.com", &base("https://example.com/"), true)
            .unwrap();
        assert_eq!(url.scheme(), "mailto");
    }

    #[test]
    fn test_same_document_reference() {
        let page = base("https://example.com/p");
        let frag = resolve_reference("#section", &page, false).unwrap();
        assert!(is_same_document_reference(&frag, &page));

        let other = base("https://example.com/q");
        assert!(!is_same_document_reference(&other, &page));

        let query = base("https://example.com/p?x=1");
        assert!(!is_same_document_reference(&query, &page));
    }

    #[test]
    fn test_equivalent() {
        let a = base("https://example.com/%7Euser");
        let b = base("https://EXAMPLE.com:443/~user");
        assert!(is_equivalent(&a, &b));
        assert!(!is_equivalent(&a, &base("https://example.com/user")));
    }
}
