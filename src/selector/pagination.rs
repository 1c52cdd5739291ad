//! Pagination expansion
//!
//! Turns one selector with a page-parameter range into one selector per page.

use crate::selector::ScrapSelector;
use crate::SelectorError;
use url::Url;

/// Expands a paginated selector into an ordered list of per-page selectors
///
/// Without a page parameter the selector is returned unchanged as the only
/// element. Otherwise the page parameter takes every value from `page_start`
/// (inclusive) to `page_limit` (exclusive) in steps of `page_incr`. A
/// non-positive increment produces at most one page.
///
/// The rewritten query string is re-encoded with its parameters sorted by
/// name, so the original parameter order is not preserved.
///
/// # Example
///
/// ```
/// use sumi_harvest::selector::{paginate, ScrapSelector};
///
/// let selector = ScrapSelector {
///     url: "http://shop.example/list?size=10".to_string(),
///     base: ".item".to_string(),
///     page_param: "start".to_string(),
///     page_start: 0,
///     page_incr: 10,
///     page_limit: 30,
///     ..Default::default()
/// };
/// let pages = paginate(&selector).unwrap();
/// assert_eq!(pages.len(), 3);
/// assert_eq!(pages[1].url, "http://shop.example/list?size=10&start=10");
/// ```
pub fn paginate(selector: &ScrapSelector) -> Result<Vec<ScrapSelector>, SelectorError> {
    if !selector.is_paginated() {
        return Ok(vec![selector.clone()]);
    }

    let base_url = Url::parse(&selector.url).map_err(|e| SelectorError::InvalidUrl {
        url: selector.url.clone(),
        message: e.to_string(),
    })?;

    let mut pages = Vec::new();
    let mut page = selector.page_start;

    while page < selector.page_limit {
        let mut dup = selector.clone();
        dup.url = page_url(&base_url, &selector.page_param, page);
        pages.push(dup);

        if selector.page_incr <= 0 {
            break;
        }
        match page.checked_add(selector.page_incr) {
            Some(next) => page = next,
            None => break,
        }
    }

    Ok(pages)
}

/// Rewrites `param` to `page` and re-encodes the query sorted by key
fn page_url(base_url: &Url, param: &str, page: i64) -> String {
    let mut params: Vec<(String, String)> = base_url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.push((param.to_string(), page.to_string()));

    // stable sort keeps repeated keys in their original relative order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    let mut url = base_url.clone();
    url.query_pairs_mut().clear().extend_pairs(params);
    url.to_string()
}
