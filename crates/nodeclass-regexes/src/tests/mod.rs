//! Unit tests for the regexes handler.

use mockall::mock;
use nodeclass_plugin::auth::{Environment, EnvironmentResolver};
use nodeclass_plugin::lock::PortLock;
use nodeclass_plugin::lock::test_support::free_loopback_port;
use nodeclass_plugin::protocol::{ENV_ID_PARAM, ID_PARAM, ReplyStatus, STORE_PATH_PARAM};
use nodeclass_plugin::{HandlerContext, ReplyEnvelope, RequestEnvelope, dispatch};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::RegexesHandler;

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

/// Grants env 3 as dc1/prod and env 4 as dc1/test; denies everything else.
fn resolver() -> MockResolver {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|_, env_id| match env_id {
            "3" => Ok(Environment::new(3, "dc1", "prod")),
            "4" => Ok(Environment::new(4, "dc1", "test")),
            other => Err(ReplyEnvelope::failure(format!(
                "Environment '{other}' not found"
            ))),
        });
    resolver
}

struct Harness {
    dir: TempDir,
    context: HandlerContext,
}

impl Harness {
    fn request(&self, verb: &str, env_id: &str) -> RequestEnvelope {
        RequestEnvelope::new(verb)
            .with_query(ENV_ID_PARAM, env_id)
            .with_path_param(STORE_PATH_PARAM, format!("{}/", self.dir.path().display()))
    }

    fn send(&mut self, request: &RequestEnvelope) -> ReplyEnvelope {
        dispatch(&RegexesHandler, &mut self.context, request)
    }

    fn payload(&mut self, request: &RequestEnvelope) -> Value {
        let reply = self.send(request);
        assert_eq!(reply.status(), ReplyStatus::Success, "{}", reply.message());
        serde_json::from_str(reply.text()).expect("payload json")
    }

    fn create(&mut self, env_id: &str, name: &str) -> Value {
        let body = json!({"Regex": format!("^{name}"), "Name": name, "Desc": "d"});
        let request = self
            .request("POST", env_id)
            .with_body(body.to_string().into_bytes());
        self.payload(&request)
    }
}

#[fixture]
fn harness() -> Harness {
    let port = free_loopback_port().expect("free lock port");
    Harness {
        dir: TempDir::new().expect("create temp dir"),
        context: HandlerContext::new(PortLock::loopback(port), "enc.db", Box::new(resolver())),
    }
}

#[rstest]
fn post_stamps_scope_and_returns_record(mut harness: Harness) {
    let created = harness.create("3", "web");
    assert_eq!(created["Dc"], "dc1");
    assert_eq!(created["Env"], "prod");
    assert_eq!(created["Name"], "web");
    assert!(created["Id"].as_i64().expect("numeric id") > 0);
}

#[rstest]
fn get_lists_only_the_callers_scope(mut harness: Harness) {
    let prod = harness.create("3", "web");
    harness.create("4", "db");

    let request = harness.request("GET", "3");
    assert_eq!(harness.payload(&request), json!([prod]));
}

#[rstest]
fn get_with_nothing_stored_is_an_empty_list(mut harness: Harness) {
    let request = harness.request("GET", "3");
    let reply = harness.send(&request);
    assert!(reply.is_success());
    assert_eq!(reply.text(), "[]");
}

#[rstest]
fn put_updates_record_in_scope(mut harness: Harness) {
    let created = harness.create("3", "web");
    let id = created["Id"].clone();
    let body = json!({"Id": id, "Regex": "^www", "Name": "www", "Desc": "edited"});
    let request = harness
        .request("PUT", "3")
        .with_body(body.to_string().into_bytes());

    let updated = harness.payload(&request);
    assert_eq!(updated["Id"], id);
    assert_eq!(updated["Desc"], "edited");

    let listed = harness.payload(&harness.request("GET", "3"));
    assert_eq!(listed, json!([updated]));
}

#[rstest]
fn put_outside_scope_is_not_found(mut harness: Harness) {
    let created = harness.create("3", "web");
    let id = created["Id"].as_i64().expect("numeric id");
    let body = json!({"Id": id, "Regex": "^x", "Name": "x", "Desc": "x"});
    let request = harness
        .request("PUT", "4")
        .with_body(body.to_string().into_bytes());

    let reply = harness.send(&request);
    assert_eq!(reply.message(), format!("Regex Id:{id} not found"));
    assert!(!harness.context.lock().is_held());
}

#[rstest]
fn delete_returns_removed_record(mut harness: Harness) {
    let created = harness.create("3", "web");
    let id = created["Id"].as_i64().expect("numeric id");
    let request = harness
        .request("DELETE", "3")
        .with_path_param(ID_PARAM, id.to_string());

    assert_eq!(harness.payload(&request), created);
    assert_eq!(harness.payload(&harness.request("GET", "3")), json!([]));
}

#[rstest]
fn delete_with_wrong_scope_leaves_record(mut harness: Harness) {
    let created = harness.create("3", "web");
    let id = created["Id"].as_i64().expect("numeric id");
    let request = harness
        .request("DELETE", "4")
        .with_path_param(ID_PARAM, id.to_string());

    let reply = harness.send(&request);
    assert_eq!(reply.message(), format!("Regex Id:{id} not found"));
    assert_eq!(harness.payload(&harness.request("GET", "3")), json!([created]));
}

#[rstest]
#[case::post("POST")]
#[case::put("PUT")]
fn undecodable_body_is_reported(mut harness: Harness, #[case] verb: &str) {
    let request = harness.request(verb, "3").with_body(b"{bad".to_vec());
    let reply = harness.send(&request);
    assert!(
        reply
            .message()
            .starts_with("Error decoding the POST data ({bad). Error decoding JSON ('"),
        "got {}",
        reply.message()
    );
}

#[rstest]
#[case::get("GET")]
#[case::post("POST")]
#[case::put("PUT")]
#[case::delete("DELETE")]
fn missing_env_id_is_rejected_before_the_store(mut harness: Harness, #[case] verb: &str) {
    let request = RequestEnvelope::new(verb).with_path_param(
        STORE_PATH_PARAM,
        format!("{}/", harness.dir.path().display()),
    );
    let reply = harness.send(&request);
    assert_eq!(reply.message(), "'env_id' must be set");
    assert!(!harness.dir.path().join("enc.db").exists());
}

#[rstest]
fn denied_environment_reply_is_forwarded(mut harness: Harness) {
    let request = harness.request("GET", "99");
    let reply = harness.send(&request);
    assert_eq!(reply.message(), "Environment '99' not found");
}

#[rstest]
fn patch_is_not_supported(mut harness: Harness) {
    let request = harness.request("PATCH", "3");
    let reply = harness.send(&request);
    assert_eq!(
        reply.message(),
        "Internal error: Invalid HTTP request type for this plugin PATCH"
    );
}
