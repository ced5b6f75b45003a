//! Ordered interaction registry.

use super::types::Interaction;
use crate::error::{ConfigurationError, Error};
use crate::pact::Pact;
use tracing::debug;

/// Interactions in registration order, validated and resolved on the way in.
#[derive(Debug, Clone, Default)]
pub struct InteractionRegistry {
    interactions: Vec<Interaction>,
}

impl InteractionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate, reject a duplicate identity, resolve provider-state
    /// expressions, then append.
    pub fn register(&mut self, interaction: Interaction) -> Result<(), Error> {
        interaction.validate()?;
        if self.interactions.iter().any(|i| i.same_identity(&interaction)) {
            return Err(ConfigurationError::DuplicateInteraction {
                description: interaction.description,
            }
            .into());
        }
        let resolved = interaction.resolve()?;
        resolved.validate_response_headers()?;
        debug!(
            "Registered interaction '{}' ({} provider states)",
            resolved.description,
            resolved.provider_states.len()
        );
        self.interactions.push(resolved);
        Ok(())
    }

    /// Rebuild a registry from a read-back contract.
    pub fn from_pact(pact: &Pact) -> Result<Self, Error> {
        let mut registry = Self::new();
        for interaction in &pact.interactions {
            registry.register(interaction.clone())?;
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Interaction> {
        self.interactions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.interactions.iter()
    }

    pub fn into_vec(self) -> Vec<Interaction> {
        self.interactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{ProviderState, RequestPattern, ResponsePattern};
    use crate::matchers::*;
    use serde_json::json;

    fn interaction(description: &str) -> Interaction {
        Interaction::new(
            description,
            RequestPattern::new("GET", "/foobar"),
            ResponsePattern::new(200),
        )
    }

    #[test]
    fn test_registration_order_is_kept() {
        let mut registry = InteractionRegistry::new();
        registry.register(interaction("first")).unwrap();
        registry.register(interaction("second")).unwrap();
        let names: Vec<&str> = registry.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let mut registry = InteractionRegistry::new();
        registry.register(interaction("same")).unwrap();
        let err = registry.register(interaction("same")).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::DuplicateInteraction { .. })
        ));

        // same description under a different state is a distinct interaction
        let mut stateful = interaction("same");
        stateful.provider_states.push(ProviderState::new("User foo exists"));
        registry.register(stateful).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_register_resolves_provider_state() {
        let mut i = interaction("get user");
        i.provider_states.push(ProviderState::with_params(
            "User exists",
            json!({"id": 10}).as_object().cloned().unwrap(),
        ));
        i.request.path = from_provider_state("/users/${id}", "/users/1");
        let mut registry = InteractionRegistry::new();
        registry.register(i).unwrap();
        assert_eq!(
            registry.get(0).unwrap().request.path.generate(),
            json!("/users/10")
        );
    }

    #[test]
    fn test_unresolvable_state_is_an_error() {
        let mut i = interaction("get user");
        i.response.body = Some(Pattern::from(Matcher::ProviderStateInjected {
            expression: "${id}".into(),
            fallback: None,
        }));
        let err = InteractionRegistry::new().register(i).unwrap_err();
        assert!(matches!(err, Error::StateResolution(_)));
    }

    #[test]
    fn test_resolved_header_value_is_checked() {
        let mut i = interaction("get token");
        i.provider_states.push(ProviderState::with_params(
            "Token issued",
            json!({"token": "abc\r\nSet-Cookie: x"}).as_object().cloned().unwrap(),
        ));
        i.response
            .headers
            .insert("X-Token".into(), from_provider_state("${token}", "abc"));
        let err = InteractionRegistry::new().register(i).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::InvalidInteraction { .. })
        ));
    }

    #[test]
    fn test_invalid_matcher_is_rejected() {
        let mut i = interaction("bad");
        i.response.body = Some(regex("abc", "[0-9]+"));
        let err = InteractionRegistry::new().register(i).unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::InvalidMatcher { .. })
        ));
    }
}
