use crate::url::{pretty_segments, url_path};
use crate::ExtractError;

/// Extracts a record identifier from a segment of a URL path
///
/// # Extraction Steps
///
/// 1. Split the URL path on `/`
/// 2. Pick segment `path_index` (negative values count from the end)
/// 3. If `split` is non-empty, split that segment on it and pick part
///    `split_index` (negative values count from the end), dropping a trailing
///    `.html`/`.htm` suffix
///
/// Out-of-range indices are errors naming the index and the available parts.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::extract_id_from_url;
///
/// let url = "http://www.testing.co.uk/Chelo+wrap+gown/202817900,default,pd.html";
/// assert_eq!(extract_id_from_url(url, -1, ",", 0).unwrap(), "202817900");
/// ```
pub fn extract_id_from_url(
    url: &str,
    path_index: i64,
    split: &str,
    split_index: i64,
) -> Result<String, ExtractError> {
    let path = url_path(url);
    let segments: Vec<&str> = path.split('/').collect();

    let segment = resolve_index(&segments, path_index).ok_or_else(|| {
        ExtractError::PathIndexOutOfBounds {
            index: path_index,
            path: path.clone(),
            segments: pretty_segments(&segments),
        }
    })?;

    if split.is_empty() {
        return Ok(segment.to_string());
    }

    let parts: Vec<&str> = segment.split(split).collect();
    let part = resolve_index(&parts, split_index).ok_or_else(|| {
        ExtractError::SplitIndexOutOfBounds {
            index: split_index,
            segment: segment.to_string(),
            parts: pretty_segments(&parts),
        }
    })?;

    let id = part
        .strip_suffix(".html")
        .or_else(|| part.strip_suffix(".htm"))
        .unwrap_or(part);
    Ok(id.to_string())
}

/// Looks up `index` in `items`, counting negative indices from the end
fn resolve_index<'a>(items: &[&'a str], index: i64) -> Option<&'a str> {
    let len = items.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        Some(items[resolved as usize])
    } else {
        None
    }
}
