use url::{Position, Url};

/// Extracts the host (with port, if any) from a URL string
///
/// Selectors are persisted per host, so two sites served from the same
/// machine on different ports get separate selectors. Strings that do not
/// parse as absolute URLs have no host and yield an empty string.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::extract_host;
///
/// assert_eq!(extract_host("https://EXAMPLE.com/path"), "example.com");
/// assert_eq!(extract_host("http://127.0.0.1:8080/list.html"), "127.0.0.1:8080");
/// assert_eq!(extract_host("testURL"), "");
/// ```
pub fn extract_host(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) if url.has_host() => url[Position::BeforeHost..Position::AfterPort].to_string(),
        _ => String::new(),
    }
}

/// Computes the storage index hint of a record: `host/id`
///
/// Returns an empty string when the source URL has no host.
pub fn item_index(scrap_url: &str, id: &str) -> String {
    let host = extract_host(scrap_url);
    if host.is_empty() {
        return String::new();
    }
    format!("{}/{}", host, id)
}

/// Splits an index hint back into host and id
///
/// Returns `None` unless both parts are non-empty.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::split_item_index;
///
/// assert_eq!(split_item_index("www.test.co.uk/LO123"), Some(("www.test.co.uk", "LO123")));
/// assert_eq!(split_item_index("LO123"), None);
/// ```
pub fn split_item_index(index: &str) -> Option<(&str, &str)> {
    let (host, id) = index.split_once('/')?;
    if host.is_empty() || id.is_empty() {
        None
    } else {
        Some((host, id))
    }
}
