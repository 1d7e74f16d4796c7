use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use mikro_config::{AccessOverride, ConfigSet, GroupRef, RouterScope, UserRecord};
use mikro_core::{AccessError, AccessLevel, DenialKind, OperationKind, RouterName};

use crate::{AuthorizationDecision, IdentityContext, RouterSelector};

/// Decides whether an identity may run a module operation on a router.
///
/// - No IO
/// - No panics
/// - Fail closed: anything unresolved contributes nothing
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a> {
    config: &'a ConfigSet,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(config: &'a ConfigSet) -> Self {
        Self { config }
    }

    pub fn selector(&self) -> RouterSelector<'a> {
        RouterSelector::new(&self.config.routers)
    }

    /// Authorize `module:operation` on `router` (the default router when
    /// `None` or empty).
    pub fn authorize(
        &self,
        identity: &IdentityContext,
        module: &str,
        operation: &str,
        router: Option<&str>,
    ) -> AuthorizationDecision {
        let evaluation = self.evaluate(identity, module, operation, router);
        log_decision(identity, module, operation, &evaluation.decision);
        evaluation.decision
    }

    /// Like [`authorize`](Self::authorize), but also reports every group
    /// reference that was considered and why it did or did not count.
    ///
    /// The decision itself is available through
    /// [`AuthorizationExplanation::decision`].
    pub fn explain(
        &self,
        identity: &IdentityContext,
        module: &str,
        operation: &str,
        router: Option<&str>,
    ) -> AuthorizationExplanation {
        let evaluation = self.evaluate(identity, module, operation, router);
        log_decision(identity, module, operation, &evaluation.decision);
        AuthorizationExplanation::build(self.config, identity, module, operation, evaluation)
    }

    fn evaluate(
        &self,
        identity: &IdentityContext,
        module: &str,
        operation: &str,
        requested_router: Option<&str>,
    ) -> Evaluation {
        let selector = self.selector();

        if identity.superuser {
            let router = selector.resolve(requested_router).ok().map(|r| r.name.clone());
            return Evaluation::bare(AuthorizationDecision::allow_superuser(router));
        }

        let Some(user) = self.config.users.get(&identity.username) else {
            return Evaluation::bare(AuthorizationDecision::deny(
                AccessError::UserNotConfigured(identity.username.clone()),
                None,
            ));
        };

        let router = match selector.resolve(requested_router) {
            Ok(descriptor) => descriptor.name.clone(),
            Err(e) => return Evaluation::bare(AuthorizationDecision::deny(e.into(), None)),
        };

        let Some(kind) = self.config.modules.classify(module, operation) else {
            return Evaluation::bare(AuthorizationDecision::deny(
                AccessError::UnknownOperation {
                    module: module.to_string(),
                    operation: operation.to_string(),
                },
                Some(router),
            ));
        };

        let (considered, candidates) = self.collect_grants(user, module, operation, kind, &router);

        // Union of grants: the most permissive candidate wins.
        let decision = match candidates.iter().map(|(_, level)| *level).max() {
            Some(best) => {
                let mut matched: Vec<String> = Vec::new();
                for (group, level) in &candidates {
                    if *level == best && !matched.contains(group) {
                        matched.push(group.clone());
                    }
                }
                AuthorizationDecision::allow(best, matched, router)
            }
            None => AuthorizationDecision::deny(
                AccessError::NoMatchingGrant {
                    user: user.username.clone(),
                    module: module.to_string(),
                    operation: operation.to_string(),
                    router: router.to_string(),
                },
                Some(router),
            ),
        };

        Evaluation {
            decision,
            considered,
        }
    }

    /// Walk every clause in file order and record what each group reference
    /// contributes. Returns the trace and the `(group, level)` candidates.
    fn collect_grants(
        &self,
        user: &UserRecord,
        module: &str,
        operation: &str,
        kind: OperationKind,
        router: &RouterName,
    ) -> (Vec<ConsideredGrant>, Vec<(String, AccessLevel)>) {
        let mut considered = Vec::new();
        let mut candidates = Vec::new();

        for (index, clause) in user.clauses.iter().enumerate() {
            let in_scope = clause.routers.includes(router);
            for group_ref in &clause.groups {
                let outcome = if in_scope {
                    self.grant_for(user, group_ref, module, operation, kind)
                } else {
                    GrantOutcome::OutOfScope
                };
                if let GrantOutcome::Granted { access } = outcome {
                    candidates.push((group_ref.group.clone(), access));
                }
                considered.push(ConsideredGrant {
                    clause: index,
                    group_ref: group_ref.to_string(),
                    routers: scope_label(&clause.routers),
                    outcome,
                });
            }
        }

        (considered, candidates)
    }

    fn grant_for(
        &self,
        user: &UserRecord,
        group_ref: &GroupRef,
        module: &str,
        operation: &str,
        kind: OperationKind,
    ) -> GrantOutcome {
        // Already reported once by the load-time cross-reference check.
        let Some(group) = self.config.groups.get(&group_ref.group) else {
            debug!(
                user = %user.username,
                group = %group_ref.group,
                "skipping unknown group"
            );
            return GrantOutcome::UnknownGroup;
        };

        if !group.allows(&self.config.modules, module, operation) {
            return GrantOutcome::NotInGroup;
        }

        let access = match &group_ref.access {
            AccessOverride::Inherit => group.access,
            AccessOverride::Narrow(level) => group.access.narrowed_by(*level),
            AccessOverride::Unrecognized(_) => return GrantOutcome::UnrecognizedOverride,
        };

        if !access.permits(kind) {
            return GrantOutcome::ReadOnlyForWrite;
        }

        GrantOutcome::Granted { access }
    }
}

fn scope_label(scope: &RouterScope) -> Vec<String> {
    match scope {
        RouterScope::All => vec!["*".to_string()],
        RouterScope::Only(names) => names.iter().map(ToString::to_string).collect(),
    }
}

fn log_decision(
    identity: &IdentityContext,
    module: &str,
    operation: &str,
    decision: &AuthorizationDecision,
) {
    let router = decision.router().map(ToString::to_string).unwrap_or_default();
    match decision.denial() {
        None => debug!(
            user = %identity.username,
            module,
            operation,
            router = %router,
            access = ?decision.access(),
            superuser = decision.is_superuser(),
            "access granted"
        ),
        Some(reason) => info!(
            user = %identity.username,
            module,
            operation,
            router = %router,
            reason = ?reason.kind(),
            "access denied: {reason}"
        ),
    }
}

struct Evaluation {
    decision: AuthorizationDecision,
    considered: Vec<ConsideredGrant>,
}

impl Evaluation {
    fn bare(decision: AuthorizationDecision) -> Self {
        Self {
            decision,
            considered: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// What one group reference contributed to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GrantOutcome {
    /// The clause's router scope does not include the target router.
    OutOfScope,
    UnknownGroup,
    /// The override suffix names no access level.
    UnrecognizedOverride,
    /// The group does not allow the requested operation.
    NotInGroup,
    /// The effective level is read-only and the operation writes.
    ReadOnlyForWrite,
    Granted { access: AccessLevel },
}

/// One row of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsideredGrant {
    /// Index of the clause within the user record.
    pub clause: usize,
    pub group_ref: String,
    pub routers: Vec<String>,
    #[serde(flatten)]
    pub outcome: GrantOutcome,
}

/// Detailed, serializable explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub user: String,
    pub unix_groups: Vec<String>,
    pub superuser: bool,
    pub module: String,
    pub operation: String,
    pub router: Option<String>,
    pub granted: bool,
    pub access: Option<AccessLevel>,
    pub matched_groups: Vec<String>,
    pub denial_kind: Option<DenialKind>,
    /// Human-readable reason for the decision.
    pub reason: String,
    pub considered: Vec<ConsideredGrant>,
    pub suggestions: Vec<String>,
    #[serde(skip)]
    decision: AuthorizationDecision,
}

impl AuthorizationExplanation {
    fn build(
        config: &ConfigSet,
        identity: &IdentityContext,
        module: &str,
        operation: &str,
        evaluation: Evaluation,
    ) -> Self {
        let Evaluation {
            decision,
            considered,
        } = evaluation;

        let reason = match (decision.denial(), decision.access()) {
            (Some(error), _) => error.to_string(),
            (None, _) if decision.is_superuser() => "superuser bypasses all checks".to_string(),
            (None, Some(level)) => format!(
                "granted {level} access by group(s): {}",
                decision.matched_groups().join(", ")
            ),
            (None, None) => String::new(),
        };

        let suggestions = match decision.reason() {
            Some(DenialKind::NoMatchingGrant) => grant_suggestions(config, module, operation),
            Some(DenialKind::UserNotConfigured) => vec![format!(
                "Add a user fragment for '{}' under users.d",
                identity.username
            )],
            Some(DenialKind::UnknownOperation) => vec![format!(
                "Declare '{operation}' under module '{module}' in modules.d"
            )],
            Some(DenialKind::RouterNotFound) => vec![format!(
                "Pick one of the configured routers: {}",
                config.routers.names().join(", ")
            )],
            Some(DenialKind::NoRoutersConfigured) => {
                vec!["Add a router fragment under routers.d".to_string()]
            }
            None => Vec::new(),
        };

        Self {
            user: identity.username.clone(),
            unix_groups: identity.groups.iter().cloned().collect(),
            superuser: identity.superuser,
            module: module.to_string(),
            operation: operation.to_string(),
            router: decision.router().map(ToString::to_string),
            granted: decision.is_allowed(),
            access: decision.access(),
            matched_groups: decision.matched_groups().to_vec(),
            denial_kind: decision.reason(),
            reason,
            considered,
            suggestions,
            decision,
        }
    }

    /// The decision this explanation describes.
    pub fn decision(&self) -> &AuthorizationDecision {
        &self.decision
    }

    pub fn into_decision(self) -> AuthorizationDecision {
        self.decision
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Groups that would grant the operation at full access.
fn grant_suggestions(config: &ConfigSet, module: &str, operation: &str) -> Vec<String> {
    let granting: BTreeSet<&str> = config
        .groups
        .iter()
        .filter(|g| g.access == AccessLevel::Full && g.allows(&config.modules, module, operation))
        .map(|g| g.name.as_str())
        .collect();

    if granting.is_empty() {
        vec![format!("No configured group allows '{module}:{operation}'")]
    } else {
        vec![format!(
            "Add one of these groups to a clause covering the router: {}",
            granting.into_iter().collect::<Vec<_>>().join(", ")
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use mikro_config::{
        ModuleGrant, ModuleRegistry, OperationSet, PermissionGroup, RouterDescriptor,
        UserPermissionEntry,
    };
    use mikro_core::ExitStatus;
    use proptest::prelude::*;

    fn router(name: &str, order: usize) -> RouterDescriptor {
        RouterDescriptor {
            name: RouterName::new(name),
            host: "192.0.2.1".into(),
            port: 8728,
            username: "api".into(),
            password: "secret".into(),
            use_ssl: false,
            source: PathBuf::from(format!("routers.d/{order:02}-{name}.yaml")),
            order,
        }
    }

    fn group(name: &str, ops: &[&str], access: AccessLevel) -> PermissionGroup {
        let ops = OperationSet::Only(ops.iter().map(|s| s.to_string()).collect());
        PermissionGroup {
            name: name.into(),
            description: None,
            access,
            modules: ModuleGrant::Modules([("dns".to_string(), ops)].into_iter().collect()),
            source: PathBuf::from(format!("groups.d/{name}.yaml")),
            order: 0,
        }
    }

    fn clause(groups: &[&str], routers: Option<&[&str]>) -> UserPermissionEntry {
        UserPermissionEntry {
            groups: groups.iter().map(|g| GroupRef::parse(g)).collect(),
            routers: match routers {
                None => RouterScope::All,
                Some(names) => RouterScope::Only(names.iter().map(|n| RouterName::new(*n)).collect()),
            },
        }
    }

    fn user(name: &str, clauses: Vec<UserPermissionEntry>) -> UserRecord {
        UserRecord {
            username: name.into(),
            clauses,
            comment: None,
            source: PathBuf::from(format!("users.d/{name}.yaml")),
            order: 0,
        }
    }

    const DNS_ALL: &[&str] = &["list", "add", "update", "delete", "enable", "disable"];

    fn config(users: Vec<UserRecord>) -> ConfigSet {
        let mut set = ConfigSet {
            modules: ModuleRegistry::builtin(),
            ..ConfigSet::default()
        };
        set.routers.register(router("main-router", 0)).unwrap();
        set.routers.register(router("router1", 1)).unwrap();
        set.groups
            .register(group("dns-admin", DNS_ALL, AccessLevel::Full))
            .unwrap();
        set.groups
            .register(group("monitor", &["search"], AccessLevel::Full))
            .unwrap();
        set.groups
            .register(group("dns-viewer", &["list", "add"], AccessLevel::ReadOnly))
            .unwrap();
        for u in users {
            set.users.register(u).unwrap();
        }
        set
    }

    #[test]
    fn superuser_bypasses_an_empty_user_registry() {
        let set = ConfigSet::default();
        let decision = PermissionResolver::new(&set).authorize(
            &IdentityContext::superuser("root"),
            "anything",
            "goes",
            Some("nowhere"),
        );
        assert!(decision.is_allowed());
        assert_eq!(decision.access(), Some(AccessLevel::Full));
        assert!(decision.is_superuser());
    }

    #[test]
    fn unknown_user_is_denied() {
        let set = config(vec![]);
        let decision =
            PermissionResolver::new(&set).authorize(&IdentityContext::new("mallory"), "dns", "list", None);
        assert_eq!(decision.reason(), Some(DenialKind::UserNotConfigured));
    }

    #[test]
    fn unknown_operation_is_denied_before_clauses() {
        let set = config(vec![user("jane", vec![clause(&["dns-admin"], None)])]);
        let resolver = PermissionResolver::new(&set);
        let jane = IdentityContext::new("jane");
        assert_eq!(
            resolver.authorize(&jane, "dns", "reboot", None).reason(),
            Some(DenialKind::UnknownOperation)
        );
        assert_eq!(
            resolver.authorize(&jane, "firewall", "list", None).reason(),
            Some(DenialKind::UnknownOperation)
        );
    }

    #[test]
    fn nominal_read_only_group_cannot_be_widened_by_override() {
        let set = config(vec![user(
            "ro",
            vec![clause(&["dns-viewer:full"], None)],
        )]);
        let resolver = PermissionResolver::new(&set);
        let ro = IdentityContext::new("ro");

        let list = resolver.authorize(&ro, "dns", "list", None);
        assert_eq!(list.access(), Some(AccessLevel::ReadOnly));
        assert_eq!(
            resolver.authorize(&ro, "dns", "add", None).reason(),
            Some(DenialKind::NoMatchingGrant)
        );
    }

    #[test]
    fn unknown_group_is_skipped_not_fatal() {
        let set = config(vec![user("jane", vec![clause(&["ghost", "dns-admin"], None)])]);
        let decision =
            PermissionResolver::new(&set).authorize(&IdentityContext::new("jane"), "dns", "add", None);
        assert!(decision.is_allowed());
        assert_eq!(decision.matched_groups(), ["dns-admin".to_string()]);
    }

    #[test]
    fn unrecognized_override_grants_nothing() {
        let set = config(vec![user("eve", vec![clause(&["dns-admin:write-only"], None)])]);
        let explanation = PermissionResolver::new(&set).explain(
            &IdentityContext::new("eve"),
            "dns",
            "list",
            None,
        );
        assert!(!explanation.granted);
        assert_eq!(explanation.considered[0].outcome, GrantOutcome::UnrecognizedOverride);
    }

    #[test]
    fn grants_union_across_clauses() {
        let set = config(vec![user(
            "ops",
            vec![
                clause(&["dns-admin:read-only"], None),
                clause(&["dns-admin"], Some(&["router1"])),
            ],
        )]);
        let resolver = PermissionResolver::new(&set);
        let ops = IdentityContext::new("ops");

        // Read-only everywhere, full on router1 only.
        let on_main = resolver.authorize(&ops, "dns", "list", Some("main-router"));
        assert_eq!(on_main.access(), Some(AccessLevel::ReadOnly));
        let on_r1 = resolver.authorize(&ops, "dns", "list", Some("ROUTER1"));
        assert_eq!(on_r1.access(), Some(AccessLevel::Full));
        assert!(resolver.authorize(&ops, "dns", "delete", Some("router1")).is_allowed());
        assert!(!resolver.authorize(&ops, "dns", "delete", Some("main-router")).is_allowed());
    }

    #[test]
    fn empty_group_list_grants_nothing() {
        let set = config(vec![user("nobody", vec![clause(&[], None)])]);
        let decision =
            PermissionResolver::new(&set).authorize(&IdentityContext::new("nobody"), "dns", "list", None);
        assert_eq!(decision.reason(), Some(DenialKind::NoMatchingGrant));
    }

    #[test]
    fn explanation_records_every_reference() {
        let set = config(vec![user(
            "monitor",
            vec![clause(&["monitor", "dns-admin:read-only"], None)],
        )]);
        let explanation = PermissionResolver::new(&set).explain(
            &IdentityContext::new("monitor"),
            "dns",
            "add",
            None,
        );
        assert!(!explanation.granted);
        assert_eq!(explanation.denial_kind, Some(DenialKind::NoMatchingGrant));
        let outcomes: Vec<_> = explanation.considered.iter().map(|c| c.outcome).collect();
        assert_eq!(outcomes, vec![GrantOutcome::NotInGroup, GrantOutcome::ReadOnlyForWrite]);
        assert!(explanation.suggestions[0].contains("dns-admin"));

        let json = explanation.to_json().unwrap();
        assert!(json.contains("\"outcome\": \"read_only_for_write\""));
    }

    #[test]
    fn explanation_carries_the_same_decision_as_authorize() {
        let set = config(vec![user("jane", vec![clause(&["dns-admin"], None)])]);
        let resolver = PermissionResolver::new(&set);
        let jane = IdentityContext::new("jane");

        let explanation = resolver.explain(&jane, "dns", "delete", Some("router1"));
        let decision = resolver.authorize(&jane, "dns", "delete", Some("router1"));
        assert_eq!(explanation.decision(), &decision);
        assert_eq!(explanation.into_decision().exit_status(), ExitStatus::Success);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_group_does_not_warn_on_every_request() {
        let set = config(vec![user("jane", vec![clause(&["ghost"], None)])]);
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let resolver = PermissionResolver::new(&set);
            let jane = IdentityContext::new("jane");
            for _ in 0..3 {
                let decision = resolver.authorize(&jane, "dns", "list", None);
                assert_eq!(decision.reason(), Some(DenialKind::NoMatchingGrant));
            }
        });

        let output = logs.text();
        assert!(!output.contains("WARN"), "unexpected warnings: {output}");
    }

    fn grant_pool() -> Vec<UserPermissionEntry> {
        vec![
            clause(&["dns-admin"], None),
            clause(&["dns-admin:read-only"], None),
            clause(&["dns-admin"], Some(&["router1"])),
            clause(&["monitor"], Some(&["main-router", "router9"])),
            clause(&["dns-viewer"], None),
            clause(&["ghost"], None),
            clause(&[], None),
        ]
    }

    fn rank(decision: &AuthorizationDecision) -> u8 {
        match decision.access() {
            None => 0,
            Some(AccessLevel::ReadOnly) => 1,
            Some(AccessLevel::Full) => 2,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: adding a clause never moves a decision towards denial.
        #[test]
        fn authorize_is_monotonic_in_clauses(
            base in prop::collection::vec(0usize..7, 0..5),
            extra in 0usize..7,
            operation in prop::sample::select(vec!["list", "search", "add", "delete"]),
            router in prop::sample::select(vec!["main-router", "router1"]),
        ) {
            let pool = grant_pool();
            let before: Vec<_> = base.iter().map(|&i| pool[i].clone()).collect();
            let mut after = before.clone();
            after.push(pool[extra].clone());

            let set_before = config(vec![user("u", before)]);
            let set_after = config(vec![user("u", after)]);
            let identity = IdentityContext::new("u");

            let d_before = PermissionResolver::new(&set_before).authorize(&identity, "dns", operation, Some(router));
            let d_after = PermissionResolver::new(&set_after).authorize(&identity, "dns", operation, Some(router));

            prop_assert!(rank(&d_after) >= rank(&d_before));
        }
    }
}
