use tracing::{debug, warn};

use super::domain::{ActorContext, OrganizationScope};
use super::repository::ScopeDirectory;

pub const DEFAULT_ORGANIZATION: &str = "CORE";

/// Resolves the tenant for a session.
///
/// The actor's own organization wins; otherwise the actor's directory entry is consulted. When
/// neither yields an organization the configured default tenant is used and a warning is logged.
pub fn resolve_scope<D>(
    actor: &ActorContext,
    directory: &D,
    default_organization: &str,
) -> OrganizationScope
where
    D: ScopeDirectory + ?Sized,
{
    if let Some(organization) = non_blank(actor.organization_id.as_deref()) {
        return OrganizationScope::new(organization);
    }

    let Some(actor_id) = actor.actor_id.as_ref() else {
        warn!(
            default = default_organization,
            "actor has no organization or id; using default organization"
        );
        return OrganizationScope::new(default_organization);
    };

    match directory.organization_of(actor_id) {
        Ok(found) => match non_blank(found.as_deref()) {
            Some(organization) => {
                debug!(%actor_id, organization, "organization resolved from directory");
                OrganizationScope::new(organization)
            }
            None => {
                warn!(
                    %actor_id,
                    default = default_organization,
                    "actor record has no organization; using default organization"
                );
                OrganizationScope::new(default_organization)
            }
        },
        Err(error) => {
            warn!(
                %actor_id,
                %error,
                default = default_organization,
                "organization lookup failed; using default organization"
            );
            OrganizationScope::new(default_organization)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::domain::{ParticipantId, Role};
    use crate::leaderboard::repository::ScopeLookupError;

    struct FixedDirectory(Result<Option<String>, ScopeLookupError>);

    impl ScopeDirectory for FixedDirectory {
        fn organization_of(
            &self,
            _actor_id: &ParticipantId,
        ) -> Result<Option<String>, ScopeLookupError> {
            self.0.clone()
        }
    }

    fn actor(organization: Option<&str>) -> ActorContext {
        ActorContext::new(Role::Employee, organization.map(str::to_string))
            .with_actor_id(ParticipantId("u-1".to_string()))
    }

    #[test]
    fn actor_organization_takes_precedence() {
        let directory = FixedDirectory(Ok(Some("other".to_string())));

        let scope = resolve_scope(&actor(Some(" acme ")), &directory, DEFAULT_ORGANIZATION);

        assert_eq!(scope.as_str(), "acme");
    }

    #[test]
    fn falls_back_to_directory_record() {
        let directory = FixedDirectory(Ok(Some("globex".to_string())));

        let scope = resolve_scope(&actor(None), &directory, DEFAULT_ORGANIZATION);

        assert_eq!(scope.as_str(), "globex");
    }

    #[test]
    fn lookup_failure_uses_default_tenant() {
        let directory = FixedDirectory(Err(ScopeLookupError::Unavailable("offline".to_string())));

        let scope = resolve_scope(&actor(None), &directory, DEFAULT_ORGANIZATION);

        assert_eq!(scope.as_str(), DEFAULT_ORGANIZATION);
    }

    #[test]
    fn missing_actor_id_uses_default_tenant() {
        let directory = FixedDirectory(Ok(Some("globex".to_string())));
        let anonymous = ActorContext::new(Role::Employee, Some("   ".to_string()));

        let scope = resolve_scope(&anonymous, &directory, "fallback-org");

        assert_eq!(scope.as_str(), "fallback-org");
    }
}
