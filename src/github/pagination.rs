//! `Link` header handling for paginated GitHub endpoints.
//!
//! GitHub advertises further pages as
//! `<https://api.github.com/...&page=2>; rel="next", <...>; rel="last"`.

use reqwest::header::{HeaderMap, LINK};

/// URL of the next page, if the response advertises one.
pub fn next_page_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(parse_next_link)
}

/// Extract the `rel="next"` target from a single `Link` header value.
pub fn parse_next_link(value: &str) -> Option<String> {
    value.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let url = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            let param = param.trim();
            match param.strip_prefix("rel=") {
                Some(rel) => rel
                    .trim_matches('"')
                    .split_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("next")),
                None => false,
            }
        });

        (is_next && !url.is_empty()).then(|| url.to_string())
    })
}
