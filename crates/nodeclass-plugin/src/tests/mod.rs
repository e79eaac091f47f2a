//! Crate-level integration and BDD tests.


pub(crate) mod support {
    //! Doubles shared by the unit test modules.

    use mockall::mock;
    use nodeclass_config::DEFAULT_STORE_FILE;

    use crate::auth::{Environment, EnvironmentResolver};
    use crate::context::HandlerContext;
    use crate::lock::PortLock;
    use crate::lock::test_support::free_loopback_port;
    use crate::protocol::{ReplyEnvelope, RequestEnvelope};

    mock! {
        pub Resolver {}

        impl EnvironmentResolver for Resolver {
            fn resolve(
                &self,
                request: &RequestEnvelope,
                env_id: &str,
            ) -> Result<Environment, ReplyEnvelope>;
        }
    }

    /// Builds a context on a private lock port with the default store file.
    pub(crate) fn context_with(resolver: MockResolver) -> HandlerContext {
        let port = free_loopback_port().expect("free lock port");
        HandlerContext::new(
            PortLock::loopback(port),
            DEFAULT_STORE_FILE,
            Box::new(resolver),
        )
    }

    /// A resolver that grants `environment` to every caller.
    pub(crate) fn granting(environment: Environment) -> MockResolver {
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_, _| Ok(environment.clone()));
        resolver
    }
}
