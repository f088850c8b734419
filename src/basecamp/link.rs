//! `Link` header pagination (RFC 8288), as used by the Basecamp API:
//! `Link: <https://3.basecampapi.com/999/projects.json?page=2>; rel="next"`.

use reqwest::header::{HeaderMap, LINK};
use url::Url;

/// Target of the `rel="next"` link across all `Link` headers, resolved
/// against the URL of the page that carried it.
pub(crate) fn next_page(headers: &HeaderMap, current: &Url) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(find_next)
        .and_then(|target| current.join(target).ok())
}

/// Raw target of the first link-value whose `rel` includes `next`.
fn find_next(value: &str) -> Option<&str> {
    let mut rest = value;
    loop {
        let start = rest.find('<')?;
        let end = start + rest[start..].find('>')?;
        let target = rest[start + 1..end].trim();
        let after = &rest[end + 1..];
        let params_end = after.find('<').unwrap_or(after.len());

        if after[..params_end].split(';').any(is_next_rel) {
            return Some(target);
        }
        rest = &after[params_end..];
    }
}

fn is_next_rel(param: &str) -> bool {
    let Some((name, value)) = param.split_once('=') else {
        return false;
    };
    name.trim().eq_ignore_ascii_case("rel")
        && value
            .trim_matches(|c: char| c == '"' || c == ',' || c.is_whitespace())
            .split_ascii_whitespace()
            .any(|rel| rel.eq_ignore_ascii_case("next"))
}
