//! Unit tests for the node classification handler.

use mockall::mock;
use nodeclass_plugin::auth::{Environment, EnvironmentResolver};
use nodeclass_plugin::lock::PortLock;
use nodeclass_plugin::lock::test_support::free_loopback_port;
use nodeclass_plugin::protocol::{ENV_ID_PARAM, ID_PARAM, SALT_ID_PARAM, STORE_PATH_PARAM};
use nodeclass_plugin::{HandlerContext, ReplyEnvelope, RequestEnvelope, dispatch};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use crate::EncsHandler;

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
    fn request(&self, verb: &str, env_id: &str) -> RequestEnvelope {
        RequestEnvelope::new(verb)
            .with_query(ENV_ID_PARAM, env_id)
            .with_path_param(STORE_PATH_PARAM, format!("{}/", self.dir.path().display()))
    }

    fn send(&mut self, request: &RequestEnvelope) -> ReplyEnvelope {
        dispatch(&EncsHandler, &mut self.context, request)
    }

    fn payload(&mut self, request: &RequestEnvelope) -> Value {
        let reply = self.send(request);
        assert!(reply.is_success(), "{}", reply.message());
        serde_json::from_str(reply.text()).expect("payload json")
    }

    fn post(&mut self, env_id: &str, salt_id: &str) -> ReplyEnvelope {
        let body = json!({"SaltId": salt_id, "Formula": "role", "StateFile": "web"});
        let request = self
            .request("POST", env_id)
            .with_body(body.to_string().into_bytes());
        self.send(&request)
    }

    fn create(&mut self, env_id: &str, salt_id: &str) -> Value {
        let reply = self.post(env_id, salt_id);
        assert!(reply.is_success(), "{}", reply.message());
        serde_json::from_str(reply.text()).expect("payload json")
    }
}

#[fixture]
fn harness() -> Harness {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .returning(|_, env_id| match env_id {
            "3" => Ok(Environment::new(3, "dc1", "prod")),
            _ => Ok(Environment::new(5, "dc2", "prod")),
        });
    let port = free_loopback_port().expect("free lock port");
    Harness {
        dir: TempDir::new().expect("create temp dir"),
        context: HandlerContext::new(PortLock::loopback(port), "enc.db", Box::new(resolver)),
    }
}

#[rstest]
fn post_stamps_scope(mut harness: Harness) {
    let created = harness.create("3", "web01");
    assert_eq!(created["SaltId"], "web01");
    assert_eq!(created["Dc"], "dc1");
    assert_eq!(created["Env"], "prod");
}

#[rstest]
fn duplicate_salt_id_surfaces_store_text(mut harness: Harness) {
    harness.create("3", "web01");
    let reply = harness.post("5", "web01");
    assert!(!reply.is_success());
    assert!(
        reply.message().starts_with("Update error: ") && reply.message().contains("UNIQUE"),
        "got {}",
        reply.message()
    );
    assert!(!harness.context.lock().is_held());
}

#[rstest]
fn get_filters_by_scope_and_salt_id(mut harness: Harness) {
    let web = harness.create("3", "web01");
    harness.create("3", "db01");
    harness.create("5", "web02");

    let all = harness.payload(&harness.request("GET", "3"));
    assert_eq!(all.as_array().map(Vec::len), Some(2));

    let request = harness.request("GET", "3").with_query(SALT_ID_PARAM, "web01");
    assert_eq!(harness.payload(&request), json!([web]));

    let request = harness.request("GET", "3").with_query(SALT_ID_PARAM, "web02");
    assert_eq!(harness.payload(&request), json!([]));
}

#[rstest]
fn put_rewrites_fields_in_scope(mut harness: Harness) {
    let created = harness.create("3", "web01");
    let id = created["Id"].as_i64().expect("numeric id");
    let body = json!({"Id": id, "SaltId": "web01", "Formula": "role", "StateFile": "db"});
    let request = harness
        .request("PUT", "3")
        .with_body(body.to_string().into_bytes());

    let updated = harness.payload(&request);
    assert_eq!(updated["StateFile"], "db");
    assert_eq!(updated["Id"], id);
}

#[rstest]
fn put_outside_scope_is_not_found(mut harness: Harness) {
    let created = harness.create("3", "web01");
    let id = created["Id"].as_i64().expect("numeric id");
    let body = json!({"Id": id, "SaltId": "web01"});
    let request = harness
        .request("PUT", "5")
        .with_body(body.to_string().into_bytes());

    assert_eq!(
        harness.send(&request).message(),
        format!("Enc Id:{id} not found")
    );
}

#[rstest]
fn delete_is_scoped(mut harness: Harness) {
    let created = harness.create("3", "web01");
    let id = created["Id"].as_i64().expect("numeric id").to_string();

    let foreign = harness
        .request("DELETE", "5")
        .with_path_param(ID_PARAM, id.clone());
    assert_eq!(
        harness.send(&foreign).message(),
        format!("Enc Id:{id} not found")
    );

    let own = harness
        .request("DELETE", "3")
        .with_path_param(ID_PARAM, id);
    assert_eq!(harness.payload(&own), created);
    assert_eq!(harness.payload(&harness.request("GET", "3")), json!([]));
}

#[rstest]
fn non_numeric_delete_id_is_not_found(mut harness: Harness) {
    let request = harness
        .request("DELETE", "3")
        .with_path_param(ID_PARAM, "web01");
    assert_eq!(harness.send(&request).message(), "Enc Id:web01 not found");
}
