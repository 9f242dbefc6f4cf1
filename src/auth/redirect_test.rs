use super::*;

const DEFAULT: &str = "/dashboard";

// =============================================================================
// sanitize_redirect / resolve_redirect
// =============================================================================

#[test]
fn only_same_origin_relative_paths_are_honored() {
    assert_eq!(resolve_redirect(Some("http://evil.com"), DEFAULT), DEFAULT);
    assert_eq!(resolve_redirect(Some("//evil.com"), DEFAULT), DEFAULT);
    assert_eq!(resolve_redirect(Some("not a url"), DEFAULT), DEFAULT);
    assert_eq!(resolve_redirect(Some("/dashboard"), "/home"), "/dashboard");
}

#[test]
fn encoded_targets_are_decoded_before_validation() {
    assert_eq!(sanitize_redirect("%2Fdashboard%2Fsettings"), Some("/dashboard/settings".into()));
    assert_eq!(sanitize_redirect("%2F%2Fevil.com"), None);
    assert_eq!(sanitize_redirect("https%3A%2F%2Fevil.com"), None);
}

#[test]
fn backslash_and_control_tricks_are_rejected() {
    assert_eq!(sanitize_redirect("/\\evil.com"), None);
    assert_eq!(sanitize_redirect("/%5Cevil.com"), None);
    assert_eq!(sanitize_redirect("/foo%0d%0aSet-Cookie:x"), None);
    assert_eq!(sanitize_redirect("/\tevil"), None);
}

#[test]
fn scheme_relative_and_javascript_urls_are_rejected() {
    assert_eq!(sanitize_redirect("javascript:alert(1)"), None);
    assert_eq!(sanitize_redirect("mailto:a@b.c"), None);
    assert_eq!(sanitize_redirect(""), None);
}

#[test]
fn query_and_fragment_are_kept() {
    assert_eq!(sanitize_redirect("/blog?page=2#comments"), Some("/blog?page=2#comments".into()));
}

#[test]
fn non_ascii_is_reencoded() {
    assert_eq!(sanitize_redirect("/blog/hello%20world"), Some("/blog/hello%20world".into()));
    assert_eq!(sanitize_redirect("/caf%C3%A9"), Some("/caf%C3%A9".into()));
}

#[test]
fn invalid_utf8_is_rejected() {
    assert_eq!(sanitize_redirect("/%FF%FE"), None);
}

#[test]
fn missing_value_falls_back() {
    assert_eq!(resolve_redirect(None, DEFAULT), DEFAULT);
}

// =============================================================================
// login_url
// =============================================================================

#[test]
fn login_url_encodes_destination() {
    assert_eq!(
        login_url("/auth/login", Some("/dashboard/settings")),
        "/auth/login?redirectTo=%2Fdashboard%2Fsettings"
    );
}

#[test]
fn login_url_without_destination() {
    assert_eq!(login_url("/auth/login", None), "/auth/login");
}

// =============================================================================
// query_param
// =============================================================================

#[test]
fn query_param_finds_raw_value() {
    assert_eq!(query_param("a=1&redirectTo=%2Fadmin", "redirectTo"), Some("%2Fadmin"));
    assert_eq!(query_param("?redirectTo=/x", "redirectTo"), Some("/x"));
    assert_eq!(query_param("flag&b=2", "flag"), Some(""));
    assert_eq!(query_param("a=1", "redirectTo"), None);
    assert_eq!(query_param("", "redirectTo"), None);
}

#[test]
fn redirect_param_handles_missing_query() {
    assert_eq!(redirect_param(None), None);
    assert_eq!(redirect_param(Some("redirectTo=%2Fblog")), Some("%2Fblog"));
}
