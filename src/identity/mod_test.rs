use super::*;
use crate::identity::test_helpers;

// =============================================================================
// AuthEvent
// =============================================================================

#[test]
fn auth_event_wire_names() {
    for event in [
        AuthEvent::InitialSession,
        AuthEvent::SignedIn,
        AuthEvent::SignedOut,
        AuthEvent::TokenRefreshed,
        AuthEvent::UserUpdated,
        AuthEvent::PasswordRecovery,
    ] {
        assert_eq!(AuthEvent::from_wire(event.as_wire()), Some(event));
    }
}

#[test]
fn auth_event_rejects_unknown_names() {
    assert_eq!(AuthEvent::from_wire("MFA_CHALLENGE_VERIFIED"), None);
    assert_eq!(AuthEvent::from_wire("signed_in"), None);
    assert_eq!(AuthEvent::from_wire(""), None);
}

#[test]
fn auth_change_from_wire_keeps_session() {
    let session = test_helpers::session_for(test_helpers::user("u1"));
    let change = AuthChange::from_wire("TOKEN_REFRESHED", Some(session.clone())).unwrap();
    assert_eq!(change.event, AuthEvent::TokenRefreshed);
    assert_eq!(change.session, Some(session));
    assert!(AuthChange::from_wire("BOGUS", None).is_none());
}

#[test]
fn carries_session_only_for_the_four_state_events() {
    assert!(AuthEvent::SignedIn.carries_session());
    assert!(AuthEvent::SignedOut.carries_session());
    assert!(AuthEvent::TokenRefreshed.carries_session());
    assert!(AuthEvent::UserUpdated.carries_session());
    assert!(!AuthEvent::InitialSession.carries_session());
    assert!(!AuthEvent::PasswordRecovery.carries_session());
}

// =============================================================================
// IdentityError
// =============================================================================

#[test]
fn redacted_drops_provider_details() {
    let err = IdentityError::Api { status: 400, message: "password 'hunter2' rejected".into() };
    let redacted = err.redacted();
    assert!(redacted.contains("400"));
    assert!(!redacted.contains("hunter2"));

    let err = IdentityError::Network("error sending request for url (https://x.supabase.co/auth/v1/token)".into());
    assert_eq!(err.redacted(), "network error");
}

#[test]
fn api_display_omits_body() {
    let err = IdentityError::Api { status: 500, message: "internal detail".into() };
    assert!(!err.to_string().contains("internal detail"));
}

#[test]
fn user_message_is_generic_for_service_failures() {
    assert_eq!(IdentityError::InvalidCredentials.user_message(), "Invalid credentials");
    assert_eq!(
        IdentityError::Network("boom".into()).user_message(),
        "Something went wrong, please try again"
    );
}

// =============================================================================
// Session / User / Role
// =============================================================================

#[test]
fn session_debug_hides_tokens() {
    let session = test_helpers::session_for(test_helpers::user("u1"));
    let debug = format!("{session:?}");
    assert!(!debug.contains("token-u1"));
    assert!(!debug.contains("refresh-u1"));
    assert!(debug.contains("u1@example.com"));
}

#[test]
fn session_usability_tracks_expiry_and_token() {
    let mut session = test_helpers::session_for(test_helpers::user("u1"));
    let now = OffsetDateTime::now_utc();
    assert!(session.is_usable_at(now));
    assert!(!session.is_usable_at(session.expires_at));

    session.access_token.clear();
    assert!(!session.is_usable_at(now));
}

#[test]
fn user_label_prefers_display_name() {
    let mut user = test_helpers::user("u1");
    assert_eq!(user.label(), "u1@example.com");
    user.display_name = Some("Ada".into());
    assert_eq!(user.label(), "Ada");
}

#[test]
fn role_parse_is_case_insensitive() {
    assert_eq!(Role::parse("Admin"), Some(Role::Admin));
    assert_eq!(Role::parse(" editor "), Some(Role::Editor));
    assert_eq!(Role::parse("root"), None);
    assert_eq!(Role::Admin.as_str(), "admin");
}

#[test]
fn role_serializes_lowercase() {
    let json = serde_json::to_string(&Role::Editor).unwrap();
    assert_eq!(json, "\"editor\"");
}

// =============================================================================
// normalize_email
// =============================================================================

#[test]
fn normalize_email_lowercases_and_trims() {
    assert_eq!(normalize_email("  Ada@Example.COM "), Some("ada@example.com".into()));
}

#[test]
fn normalize_email_rejects_malformed() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("no-at-sign"), None);
    assert_eq!(normalize_email("@example.com"), None);
    assert_eq!(normalize_email("a@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}
