//! `redirectTo` handling.
//!
//! A redirect target is only ever followed if, after percent-decoding, it is
//! a same-origin relative path. Anything else falls back to a configured
//! default, which closes the open-redirect hole of trusting the query string.

/// Query parameter carrying the post-login destination.
pub const REDIRECT_PARAM: &str = "redirectTo";

/// Decode and validate a redirect target. `None` if it is not a same-origin path.
///
/// Accepted values start with exactly one `/`, contain no backslashes or
/// control characters and carry no scheme or authority. Characters outside
/// printable ASCII are re-encoded so the result is always a valid
/// `Location` header value.
#[must_use]
pub fn sanitize_redirect(raw: &str) -> Option<String> {
    let decoded = match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(_) => return None,
    };
    if !decoded.starts_with('/') || decoded.starts_with("//") {
        return None;
    }
    if decoded.chars().any(|c| c == '\\' || c.is_control()) {
        return None;
    }

    let mut out = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        if c.is_ascii_graphic() {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    Some(out)
}

/// Sanitized `raw`, or `default` when absent or unsafe.
#[must_use]
pub fn resolve_redirect(raw: Option<&str>, default: &str) -> String {
    raw.and_then(sanitize_redirect).unwrap_or_else(|| default.to_owned())
}

/// Login location, optionally remembering where the visitor was headed.
#[must_use]
pub fn login_url(login_path: &str, destination: Option<&str>) -> String {
    match destination {
        Some(destination) => format!("{login_path}?{REDIRECT_PARAM}={}", urlencoding::encode(destination)),
        None => login_path.to_owned(),
    }
}

/// Raw (still percent-encoded) value of `name` in a query string.
#[must_use]
pub fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .trim_start_matches('?')
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Convenience: the `redirectTo` value of an optional query string.
#[must_use]
pub fn redirect_param(query: Option<&str>) -> Option<&str> {
    query.and_then(|q| query_param(q, REDIRECT_PARAM))
}

#[cfg(test)]
#[path = "redirect_test.rs"]
mod tests;
