//! `mikro-auth` — permission resolution for router management tools.
//!
//! Pure decision layer: it consumes an [`IdentityContext`] supplied by the
//! caller and the registries from `mikro-config`, and produces an
//! [`AuthorizationDecision`] plus the resolved router. No IO.

pub mod authorize;
pub mod decision;
pub mod identity;
pub mod selector;

pub use authorize::{AuthorizationExplanation, ConsideredGrant, GrantOutcome, PermissionResolver};
pub use decision::AuthorizationDecision;
pub use identity::IdentityContext;
pub use selector::RouterSelector;

use mikro_config::ConfigSet;

/// Authorize a single request against a loaded configuration.
pub fn authorize(
    config: &ConfigSet,
    identity: &IdentityContext,
    module: &str,
    operation: &str,
    router: Option<&str>,
) -> AuthorizationDecision {
    PermissionResolver::new(config).authorize(identity, module, operation, router)
}
