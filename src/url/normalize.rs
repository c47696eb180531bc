use crate::UrlError;
use url::Url;

/// Parses and normalizes an absolute HTTP(S) URL
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject relative references and malformed input
/// 2. Reject any scheme other than `http` and `https`
/// 3. Reject URLs without a host
/// 4. Lowercase scheme and host, drop the default port, remove dot segments
///    and turn an empty path into `/` (done by the parser)
/// 5. Uppercase percent-encoding triplets and decode percent-encoded
///    unreserved characters in path and query
///
/// The fragment is kept; discarding it is a discovery option.
///
/// # Examples
///
/// ```
/// use spinneret::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a/./b/../%7euser?q=%3a").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/~user?q=%3A");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => UrlError::NotAbsolute(url_str.to_string()),
        other => UrlError::Parse(format!("{}: {}", url_str, other)),
    })?;

    normalize(url)
}

/// Normalizes an already parsed URL, enforcing the absolute HTTP(S) rule
pub fn normalize(mut url: Url) -> Result<Url, UrlError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    canonicalize(&mut url);
    Ok(url)
}

/// Canonicalizes percent-encoding in the path and query of any hierarchical URL
///
/// Unlike [`normalize`] this never fails and accepts every scheme, so it is
/// safe to run on discovered links before the filters have looked at them.
pub fn canonicalize(url: &mut Url) {
    if url.cannot_be_a_base() {
        return;
    }

    let path = normalize_percent_encoding(url.path());
    if path != url.path() {
        url.set_path(&path);
    }

    let query = url.query().map(normalize_percent_encoding);
    if let Some(query) = query {
        if url.query() != Some(query.as_str()) {
            url.set_query(Some(&query));
        }
    }
}

/// Uppercases percent-encoding triplets and decodes unreserved characters
///
/// `%7e` becomes `~`, `%2f` becomes `%2F`; anything else is copied verbatim.
pub fn normalize_percent_encoding(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = hi * 16 + lo;
                if is_unreserved(decoded) {
                    out.push(decoded);
                } else {
                    out.push(b'%');
                    out.push(bytes[i + 1].to_ascii_uppercase());
                    out.push(bytes[i + 2].to_ascii_uppercase());
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8(out).unwrap_or_else(|_| input.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}
