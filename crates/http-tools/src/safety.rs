//! Helpers that keep outbound requests and their errors inside safe bounds.
//!
//! Token and business URLs can carry credentials or query text (`query=select * from ...`);
//! errors surfaced to logs and tool results only ever show the scheme, host and path.
//! Caller-supplied path values are encoded as single segments so they cannot leave the
//! tenant route.

use url::Url;

#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    // Best-effort: drop credentials + query + fragment.
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_query(None);
    u.set_fragment(None);
    u.to_string()
}

#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let mut msg = e.to_string();
    if let Some(u) = e.url() {
        msg = msg.replace(u.as_str(), &redact_url(u));
    }
    msg
}

/// Percent-encode `value` as exactly one URL path segment.
///
/// `/`, `?`, `#` and `%` are escaped along with everything else outside the path-segment set.
/// Returns `None` for `.` and `..`, which URL normalization would resolve against the
/// surrounding path.
#[must_use]
pub fn encode_path_segment(value: &str) -> Option<String> {
    if matches!(value, "." | "..") {
        return None;
    }
    let mut url = Url::parse("http://segment.invalid/").ok()?;
    url.path_segments_mut().ok()?.clear().push(value);
    Some(url.path().trim_start_matches('/').to_string())
}
