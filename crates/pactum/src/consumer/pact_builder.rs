//! Test orchestration: register interactions, run a test body against a live
//! mock server, verify and write the contract.

use super::builder::InteractionBuilder;
use crate::error::Error;
use crate::interaction::{Interaction, InteractionRegistry};
use crate::mock_server::{MockServer, MockServerConfig};
use std::future::Future;
use std::net::SocketAddr;
use tracing::warn;

/// Where the running mock server can be reached.
#[derive(Debug, Clone)]
pub struct MockServerInfo {
    pub url: String,
    pub addr: SocketAddr,
    /// Present when the server runs TLS.
    pub certificate_pem: Option<String>,
}

impl MockServerInfo {
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

/// Collects interactions for one consumer/provider pair.
pub struct PactBuilder {
    config: MockServerConfig,
    registry: InteractionRegistry,
}

impl PactBuilder {
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::with_config(MockServerConfig::new(consumer, provider))
    }

    pub fn with_config(config: MockServerConfig) -> Self {
        Self {
            config,
            registry: InteractionRegistry::new(),
        }
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut MockServerConfig {
        &mut self.config
    }

    /// Register an interaction; duplicates and invalid matchers fail here.
    pub fn add(&mut self, interaction: Interaction) -> Result<&mut Self, Error> {
        self.registry.register(interaction)?;
        Ok(self)
    }

    pub fn interaction(&mut self, builder: InteractionBuilder) -> Result<&mut Self, Error> {
        self.add(builder.build()?)
    }

    pub fn interactions(&self) -> &InteractionRegistry {
        &self.registry
    }

    /// Start the mock server, run `test` against it, stop, verify and write
    /// the pact. A failing test body is reported as [`Error::Test`].
    pub async fn execute_test<F, Fut, T>(self, test: F) -> Result<T, Error>
    where
        F: FnOnce(MockServerInfo) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut server = MockServer::new(self.config, self.registry);
        let addr = server.start().await?;
        let info = MockServerInfo {
            url: server.url().unwrap_or_default(),
            addr,
            certificate_pem: server.certificate_pem().map(str::to_string),
        };

        let outcome = test(info).await;
        server.stop().await;

        match outcome {
            Ok(value) => {
                server.write_pact()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(report) = server.verify() {
                    warn!("Test body failed; mock server report:\n{}", report);
                }
                Err(Error::Test(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::*;
    use crate::pact::PactReader;
    use serde_json::json;
    use tempfile::TempDir;

    fn get_user() -> InteractionBuilder {
        InteractionBuilder::new()
            .given("a user exists")
            .upon_receiving("a request for the user")
            .with_request("GET", "/users/1", |req| req)
            .will_respond_with(200, |res| res.json_body(json!({"name": "billy"})))
    }

    #[tokio::test]
    async fn test_execute_test_writes_pact() {
        let dir = TempDir::new().unwrap();
        let mut pact = PactBuilder::new("web", "users");
        pact.config_mut().pact_dir = dir.path().to_path_buf();
        pact.interaction(get_user()).unwrap();

        let name = pact
            .execute_test(|server| async move {
                let body: serde_json::Value = reqwest::get(server.url_for("/users/1"))
                    .await?
                    .json()
                    .await?;
                Ok::<_, anyhow::Error>(body["name"].clone())
            })
            .await
            .unwrap();
        assert_eq!(name, "billy");

        let written = PactReader::read(dir.path().join("web-users.json")).unwrap();
        assert_eq!(written.interactions.len(), 1);
        assert_eq!(written.interactions[0].description, "a request for the user");
    }

    #[tokio::test]
    async fn test_unused_interaction_fails_verification() {
        let dir = TempDir::new().unwrap();
        let mut pact = PactBuilder::new("web", "users");
        pact.config_mut().pact_dir = dir.path().to_path_buf();
        pact.interaction(get_user()).unwrap();

        let err = pact
            .execute_test(|_| async { Ok::<_, anyhow::Error>(()) })
            .await
            .unwrap_err();
        match err {
            Error::Verification(report) => {
                assert_eq!(report.unmatched_interactions.len(), 1)
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!dir.path().join("web-users.json").exists());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut pact = PactBuilder::new("web", "users");
        pact.interaction(get_user()).unwrap();
        assert!(matches!(
            pact.interaction(get_user()),
            Err(Error::Configuration(_))
        ));
        assert_eq!(pact.interactions().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_body_is_test_error() {
        let mut pact = PactBuilder::new("web", "users");
        pact.add(
            InteractionBuilder::new()
                .upon_receiving("anything")
                .with_request("GET", regex("/x/1", "/x/[0-9]+"), |req| req)
                .build()
                .unwrap(),
        )
        .unwrap();
        let err = pact
            .execute_test(|_| async { Err::<(), _>(anyhow::anyhow!("boom")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Test(_)));
        assert!(err.to_string().contains("boom"));
    }
}
