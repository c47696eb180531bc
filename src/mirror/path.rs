use url::Url;

/// Computes the mirror-relative file path for a URL
///
/// # Rules
///
/// 1. A path ending in `/` gets `index.html` appended
/// 2. A final segment without an extension gets `/index.html` appended, but
///    only for `text/html` documents
/// 3. A non-empty query is appended verbatim as `?query`
///
/// The returned path always starts with `/`.
///
/// # Examples
///
/// ```
/// use spinneret::mirror::filename_for_url;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/docs/").unwrap();
/// assert_eq!(filename_for_url(&url, Some("text/html")), "/docs/index.html");
///
/// let url = Url::parse("https://example.com/list?page=2").unwrap();
/// assert_eq!(filename_for_url(&url, Some("text/html")), "/list/index.html?page=2");
/// ```
pub fn filename_for_url(url: &Url, content_type: Option<&str>) -> String {
    let mut path = url.path().to_string();
    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    if path.ends_with('/') {
        path.push_str("index.html");
    } else {
        let last_segment = path.rsplit('/').next().unwrap_or_default();
        if !last_segment.contains('.') && content_type == Some("text/html") {
            path.push_str("/index.html");
        }
    }

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        path.push('?');
        path.push_str(query);
    }

    path
}
