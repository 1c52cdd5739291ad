use url::Url;

/// Query parameter carrying a session id that must never be stored
const SESSION_PARAM: &str = "sid";

/// Cleans an extracted link or image URL
///
/// # Sanitization Steps
///
/// 1. Empty input returns `scrap_url` (the page URL) unchanged
/// 2. Trim surrounding whitespace
/// 3. Remove the `sid` query parameter, keeping the other parameters in order
/// 4. Remove any literal `sid=` from the path
/// 5. Drop the last `path_limit` path segments (0 keeps the whole path)
/// 6. Relative references inherit scheme and host from `scrap_url`
///
/// Input that cannot be interpreted as a URL is returned as-is.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::sanitize_url;
///
/// let page = "http://www.swag.com/list";
/// assert_eq!(
///     sanitize_url(page, "/product/Angelic_Set.html?sid=ABC", 0),
///     "http://www.swag.com/product/Angelic_Set.html"
/// );
/// ```
pub fn sanitize_url(scrap_url: &str, raw: &str, path_limit: usize) -> String {
    if raw.is_empty() {
        return scrap_url.to_string();
    }

    let trimmed = raw.trim();

    let mut url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => match absolutize(scrap_url, trimmed) {
            Some(url) => url,
            None => return raw.to_string(),
        },
    };

    remove_session_param(&mut url);

    let mut path = url.path().replace("sid=", "");
    if path_limit > 0 {
        path = truncate_path(&path, path_limit);
    }
    url.set_path(&path);

    url.to_string()
}

/// Builds an absolute URL from a relative reference using the page's scheme and host
fn absolutize(scrap_url: &str, reference: &str) -> Option<Url> {
    let base = Url::parse(scrap_url).ok()?;

    if let Some(rest) = reference.strip_prefix("//") {
        return Url::parse(&format!("{}://{}", base.scheme(), rest)).ok();
    }

    let (before_fragment, fragment) = match reference.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (reference, None),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((head, q)) => (head, Some(q)),
        None => (before_fragment, None),
    };

    let mut url = base;
    url.set_path(path);
    url.set_query(query);
    url.set_fragment(fragment);
    Some(url)
}

/// Removes the session query parameter, leaving every other pair untouched
fn remove_session_param(url: &mut Url) {
    if !url.query_pairs().any(|(key, _)| key == SESSION_PARAM) {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SESSION_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// Drops the last `limit` segments of a `/`-separated path
fn truncate_path(path: &str, limit: usize) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let keep = segments.len().saturating_sub(limit);
    segments[..keep].join("/")
}
