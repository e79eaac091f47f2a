//! Unit tests for the regex mappings handler.

use mockall::mock;
use nodeclass_plugin::auth::{Environment, EnvironmentResolver};
use nodeclass_plugin::lock::PortLock;
use nodeclass_plugin::lock::test_support::free_loopback_port;
use nodeclass_plugin::protocol::{ENV_ID_PARAM, REGEX_ID_PARAM, STORE_PATH_PARAM};
use nodeclass_plugin::{HandlerContext, ReplyEnvelope, RequestEnvelope, dispatch};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::RegexMapsHandler;

mock! {
    Resolver {}

    impl EnvironmentResolver for Resolver {
        fn resolve(
            &self,
            request: &RequestEnvelope,
            env_id: &str,
        ) -> Result<Environment, ReplyEnvelope>;
    }
}

struct Harness {
    dir: TempDir,
    context: HandlerContext,
}

impl Harness {
    fn request(&self, verb: &str) -> RequestEnvelope {
        RequestEnvelope::new(verb)
            .with_query(ENV_ID_PARAM, "3")
            .with_path_param(STORE_PATH_PARAM, format!("{}/", self.dir.path().display()))
    }

    fn send(&mut self, request: &RequestEnvelope) -> ReplyEnvelope {
        dispatch(&RegexMapsHandler, &mut self.context, request)
    }

    fn assign(&mut self, regex_id: i64, classes: &[&str]) {
        let body = json!({"RegexId": regex_id, "Classes": classes});
        let request = self
            .request("POST")
            .with_body(body.to_string().into_bytes());
        let reply = self.send(&request);
        assert!(reply.is_success(), "{}", reply.message());
        assert_eq!(reply.text(), "");
    }

    fn list(&mut self, request: &RequestEnvelope) -> Value {
        let reply = self.send(request);
        assert!(reply.is_success(), "{}", reply.message());
        serde_json::from_str(reply.text()).expect("payload json")
    }
}

fn classes_of(maps: &Value) -> Vec<(i64, String, String)> {
    maps.as_array()
        .expect("array payload")
        .iter()
        .map(|map| {
            (
                map["RegexId"].as_i64().expect("numeric regex id"),
                map["Formula"].as_str().expect("formula").to_owned(),
                map["StateFile"].as_str().expect("state file").to_owned(),
            )
        })
        .collect()
}

#[fixture]
fn harness() -> Harness {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|_, _| Ok(Environment::new(3, "dc1", "prod")));
    let port = free_loopback_port().expect("free lock port");
    Harness {
        dir: TempDir::new().expect("create temp dir"),
        context: HandlerContext::new(PortLock::loopback(port), "enc.db", Box::new(resolver)),
    }
}

#[rstest]
fn post_stores_one_mapping_per_class(mut harness: Harness) {
    harness.assign(7, &["A.b", "C", "", "D.e"]);

    let maps = harness.list(&harness.request("GET"));
    assert_eq!(
        classes_of(&maps),
        vec![
            (7, "A".to_owned(), "b".to_owned()),
            (7, "C".to_owned(), String::new()),
            (7, "D".to_owned(), "e".to_owned()),
        ]
    );
}

#[rstest]
fn post_replaces_previous_mappings_of_that_regex(mut harness: Harness) {
    harness.assign(7, &["old.one", "old.two"]);
    harness.assign(8, &["other"]);
    harness.assign(7, &["new"]);

    let maps = harness.list(&harness.request("GET"));
    assert_eq!(
        classes_of(&maps),
        vec![
            (8, "other".to_owned(), String::new()),
            (7, "new".to_owned(), String::new()),
        ]
    );
}

#[rstest]
fn get_filters_by_regex_id(mut harness: Harness) {
    harness.assign(7, &["web"]);
    harness.assign(8, &["db"]);

    let request = harness.request("GET").with_query(REGEX_ID_PARAM, "8");
    let maps = harness.list(&request);
    assert_eq!(classes_of(&maps), vec![(8, "db".to_owned(), String::new())]);
}

#[rstest]
#[case::unknown("99")]
#[case::non_numeric("web")]
fn unmatched_filter_is_an_empty_list(mut harness: Harness, #[case] filter: &str) {
    harness.assign(7, &["web"]);

    let request = harness.request("GET").with_query(REGEX_ID_PARAM, filter);
    assert_eq!(harness.list(&request), json!([]));
}

#[rstest]
#[case::put("PUT")]
#[case::delete("DELETE")]
fn updates_and_deletes_are_unsupported(mut harness: Harness, #[case] verb: &str) {
    let request = harness.request(verb);
    let reply = harness.send(&request);
    assert_eq!(
        reply.message(),
        format!("Internal error: Invalid HTTP request type for this plugin {verb}")
    );
    assert!(!harness.dir.path().join("enc.db").exists());
}

#[rstest]
fn missing_env_id_is_rejected(mut harness: Harness) {
    let request = RequestEnvelope::new("POST").with_path_param(
        STORE_PATH_PARAM,
        format!("{}/", harness.dir.path().display()),
    );
    let reply = harness.send(&request);
    assert_eq!(reply.message(), "'env_id' must be set");
    assert!(!harness.dir.path().join("enc.db").exists());
}

#[rstest]
fn malformed_classes_are_reported(mut harness: Harness) {
    let request = harness
        .request("POST")
        .with_body(br#"{"RegexId": 7, "Classes": "web"}"#.to_vec());
    let reply = harness.send(&request);
    assert!(
        reply.message().starts_with("Error decoding the POST data ("),
        "got {}",
        reply.message()
    );
}
