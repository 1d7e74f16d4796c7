use mikro_core::{AccessError, AccessLevel, DenialKind, ExitStatus, RouterName};

/// Outcome of one authorization check.
///
/// Ephemeral; never persisted. A denied decision always carries its typed
/// reason and an allowed one always carries its effective level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    outcome: Result<AccessLevel, AccessError>,
    matched_groups: Vec<String>,
    router: Option<RouterName>,
    superuser: bool,
}

impl AuthorizationDecision {
    pub fn allow(access: AccessLevel, matched_groups: Vec<String>, router: RouterName) -> Self {
        Self {
            outcome: Ok(access),
            matched_groups,
            router: Some(router),
            superuser: false,
        }
    }

    pub fn allow_superuser(router: Option<RouterName>) -> Self {
        Self {
            outcome: Ok(AccessLevel::Full),
            matched_groups: Vec::new(),
            router,
            superuser: true,
        }
    }

    pub fn deny(error: AccessError, router: Option<RouterName>) -> Self {
        Self {
            outcome: Err(error),
            matched_groups: Vec::new(),
            router,
            superuser: false,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Effective level when allowed.
    pub fn access(&self) -> Option<AccessLevel> {
        self.outcome.as_ref().ok().copied()
    }

    /// Groups that justify the effective level.
    pub fn matched_groups(&self) -> &[String] {
        &self.matched_groups
    }

    /// Router the request resolved to, when it resolved.
    pub fn router(&self) -> Option<&RouterName> {
        self.router.as_ref()
    }

    /// Allowed through the superuser bypass.
    pub fn is_superuser(&self) -> bool {
        self.superuser
    }

    pub fn denial(&self) -> Option<&AccessError> {
        self.outcome.as_ref().err()
    }

    pub fn reason(&self) -> Option<DenialKind> {
        self.denial().map(AccessError::kind)
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.denial()
            .map_or(ExitStatus::Success, AccessError::exit_status)
    }

    /// The effective level, or the reason the request was refused.
    pub fn into_result(self) -> Result<AccessLevel, AccessError> {
        self.outcome
    }
}
