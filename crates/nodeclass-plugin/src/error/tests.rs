//! Unit tests for failure reply text.

use rstest::rstest;

use super::*;
use crate::protocol::ReplyStatus;

#[rstest]
#[case::verb_not_set(HandlerError::VerbNotSet, "Internal error: HTTP request type was not set")]
#[case::unsupported(
    HandlerError::unsupported_verb("PATCH"),
    "Internal error: Invalid HTTP request type for this plugin PATCH"
)]
#[case::env_id(HandlerError::MissingEnvId, "'env_id' must be set")]
#[case::store_path(
    HandlerError::MissingStorePath,
    "Internal Error: 'PluginDatabasePath' must be set"
)]
#[case::not_found(HandlerError::not_found("Regex", "12"), "Regex Id:12 not found")]
fn failure_messages(#[case] error: HandlerError, #[case] expected: &str) {
    let reply = error.into_reply();
    assert_eq!(reply.status(), ReplyStatus::Failure);
    assert_eq!(reply.message(), expected);
    assert_eq!(reply.text(), "");
}

#[test]
fn decode_error_quotes_body_and_cause() {
    let source = serde_json::from_slice::<serde_json::Value>(b"{oops").expect_err("bad json");
    let cause = source.to_string();
    let reply: ReplyEnvelope = HandlerError::decode(b"{oops", source).into();

    assert_eq!(
        reply.message(),
        format!("Error decoding the POST data ({{oops). Error decoding JSON ('{cause}').")
    );
}

#[test]
fn store_errors_keep_raw_text_and_prefix_writes() {
    let raw = rusqlite::Error::QueryReturnedNoRows;
    let text = raw.to_string();

    let read = HandlerError::from(StoreError::from(raw)).into_reply();
    assert_eq!(read.message(), text);

    let write = HandlerError::Update(StoreError::from(rusqlite::Error::QueryReturnedNoRows));
    assert_eq!(write.into_reply().message(), format!("Update error: {text}"));
}

#[test]
fn store_open_names_the_file() {
    let error = HandlerError::StoreOpen {
        file: "/var/lib/nodeclass/enc.db".to_owned(),
        source: StoreError::from(rusqlite::Error::InvalidQuery),
    };
    assert!(
        error
            .to_string()
            .starts_with("Store open error for '/var/lib/nodeclass/enc.db'. ")
    );
}

#[test]
fn denied_reply_is_forwarded_verbatim() {
    let denied = ReplyEnvelope::failure("User 'bob' is not allowed to access environment '3'");
    let reply = HandlerError::Denied(denied.clone()).into_reply();
    assert_eq!(reply, denied);
}
