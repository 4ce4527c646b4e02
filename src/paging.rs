//! Continuation cursor extraction from `@odata.nextLink` values.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

/// Matches the skip-token query parameter, with `$` raw or percent-encoded.
static SKIP_TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&](?:\$|%24)skiptoken=([^&#]+)").expect("Invalid skip token regex")
});

/// Extract the opaque cursor from a next-page link.
///
/// Returns `None` when the link carries no skip token, which callers treat
/// the same as a missing link: the listing is exhausted.
///
/// # Examples
///
/// ```
/// use drive_gateway::paging::extract_skip_token;
///
/// let link = "https://graph.microsoft.com/v1.0/me/drive/root/children?$top=2&$skiptoken=abc";
/// assert_eq!(extract_skip_token(link).as_deref(), Some("abc"));
/// ```
pub fn extract_skip_token(next_link: &str) -> Option<String> {
    let captures = SKIP_TOKEN_REGEX.captures(next_link)?;
    let raw = captures.get(1)?.as_str();
    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded)
    }
}
