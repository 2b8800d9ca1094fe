//! Group- and privilege-based access checks.

use tollgate_core::error::{TollgateError, TollgateResult};
use tollgate_core::models::user::User;
use tollgate_core::repository::GroupRepository;

/// What a protected operation asks of the caller. The caller passes when
/// any single condition holds.
#[derive(Debug, Clone, Default)]
pub struct AccessRequirement {
    /// Group names.
    pub groups: Vec<String>,
    pub privileges: Vec<String>,
}

impl AccessRequirement {
    pub fn groups<I, T>(names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            groups: names.into_iter().map(Into::into).collect(),
            privileges: Vec::new(),
        }
    }

    pub fn privileges<I, T>(privileges: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            groups: Vec::new(),
            privileges: privileges.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.privileges.is_empty()
    }
}

pub struct AccessPolicy<G: GroupRepository> {
    group_repo: G,
}

impl<G: GroupRepository> AccessPolicy<G> {
    pub fn new(group_repo: G) -> Self {
        Self { group_repo }
    }

    /// Grants when one of the user's group snapshots names a required
    /// group, a direct privilege matches, or a privilege held by one of
    /// the user's groups matches. Group privileges are read from the
    /// directory, not the snapshot.
    pub async fn authorize(&self, user: &User, req: &AccessRequirement) -> TollgateResult<()> {
        if req.is_empty() {
            return Ok(());
        }

        if user
            .group_refs
            .iter()
            .any(|r| req.groups.contains(&r.group_name))
        {
            return Ok(());
        }
        if user.privileges.iter().any(|p| req.privileges.contains(p)) {
            return Ok(());
        }

        if !req.privileges.is_empty() && !user.group_refs.is_empty() {
            let ids: Vec<String> = user.group_refs.iter().map(|r| r.group_id.to_hex()).collect();
            let groups = match self.group_repo.find_many(&ids).await {
                Ok(groups) => groups,
                Err(TollgateError::NoResult) => Vec::new(),
                Err(e) => return Err(e),
            };
            if groups
                .iter()
                .flat_map(|g| g.privileges.iter())
                .any(|p| req.privileges.contains(p))
            {
                return Ok(());
            }
        }

        Err(TollgateError::AccessDenied {
            reason: format!("user {} lacks required group or privilege", user.id),
        })
    }
}
