//! IAM operations: users, roles, managed and inline policies, access keys.
//!
//! Thin typed wrappers over the SDK client. Errors are classified through
//! [`aws_err`](super::aws_err) so workflows can branch on NotFound /
//! AlreadyExists for their idempotency rules; no swallowing happens here.

use super::{aws_err, AwsClients};
use crate::{PaveError, Result};
use aws_sdk_iam::types::{PolicyScopeType, StatusType, Tag};

#[derive(Debug, Clone)]
pub struct UserSummary {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone)]
pub struct RoleSummary {
    pub name: String,
    pub arn: String,
    /// URL-encoded JSON document, as IAM returns it.
    pub assume_role_policy: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PolicySummary {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone)]
pub struct AccessKeyInfo {
    pub id: String,
    pub status: String,
    pub created: Option<String>,
}

impl AccessKeyInfo {
    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }
}

/// A freshly created key pair. The secret half exists only in this value;
/// IAM never returns it again.
#[derive(Clone)]
pub struct AccessKeyPair {
    pub id: String,
    pub secret: String,
}

impl std::fmt::Debug for AccessKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyPair")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicyEntities {
    pub users: Vec<String>,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
}

impl PolicyEntities {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty() && self.groups.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PolicyVersionInfo {
    pub id: String,
    pub is_default: bool,
}

fn iam_tag(key: &str, value: &str) -> Result<Tag> {
    Tag::builder()
        .key(key)
        .value(value)
        .build()
        .map_err(|e| PaveError::Other(anyhow::anyhow!("invalid tag {key}: {e}")))
}

impl AwsClients {
    pub async fn get_user(&self, name: &str) -> Result<UserSummary> {
        let out = self
            .iam
            .get_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| aws_err("iam", "get-user", name, &e))?;

        let user = out
            .user()
            .ok_or_else(|| PaveError::NotFound(name.to_string()))?;
        Ok(UserSummary {
            name: user.user_name().to_string(),
            arn: user.arn().to_string(),
        })
    }

    pub async fn user_exists(&self, name: &str) -> Result<bool> {
        match self.get_user(name).await {
            Ok(_) => Ok(true),
            Err(PaveError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_user(&self, name: &str, tags: &[(&str, &str)]) -> Result<UserSummary> {
        let mut req = self.iam.create_user().user_name(name);
        for (key, value) in tags {
            req = req.tags(iam_tag(key, value)?);
        }
        let out = req
            .send()
            .await
            .map_err(|e| aws_err("iam", "create-user", name, &e))?;

        let user = out
            .user()
            .ok_or_else(|| PaveError::Other(anyhow::anyhow!("create-user returned no user")))?;
        Ok(UserSummary {
            name: user.user_name().to_string(),
            arn: user.arn().to_string(),
        })
    }

    pub async fn delete_user(&self, name: &str) -> Result<()> {
        self.iam
            .delete_user()
            .user_name(name)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-user", name, &e))?;
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let mut users = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut req = self.iam.list_users();
            if let Some(m) = &marker {
                req = req.marker(m);
            }
            let out = req
                .send()
                .await
                .map_err(|e| aws_err("iam", "list-users", "-", &e))?;

            users.extend(out.users().iter().map(|u| UserSummary {
                name: u.user_name().to_string(),
                arn: u.arn().to_string(),
            }));

            marker = out.marker().map(str::to_string);
            if !out.is_truncated() || marker.is_none() {
                break;
            }
        }

        Ok(users)
    }

    /// Minimal ListUsers call used as a permission probe.
    pub async fn probe_list_users(&self) -> Result<()> {
        self.iam
            .list_users()
            .max_items(1)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-users", "-", &e))?;
        Ok(())
    }

    pub async fn list_groups_for_user(&self, user: &str) -> Result<Vec<String>> {
        let out = self
            .iam
            .list_groups_for_user()
            .user_name(user)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-groups-for-user", user, &e))?;
        Ok(out
            .groups()
            .iter()
            .map(|g| g.group_name().to_string())
            .collect())
    }

    pub async fn list_access_keys(&self, user: &str) -> Result<Vec<AccessKeyInfo>> {
        let out = self
            .iam
            .list_access_keys()
            .user_name(user)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-access-keys", user, &e))?;

        Ok(out
            .access_key_metadata()
            .iter()
            .map(|k| AccessKeyInfo {
                id: k.access_key_id().unwrap_or_default().to_string(),
                status: k
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                created: k.create_date().map(|d| d.to_string()),
            })
            .collect())
    }

    pub async fn create_access_key(&self, user: &str) -> Result<AccessKeyPair> {
        let out = self
            .iam
            .create_access_key()
            .user_name(user)
            .send()
            .await
            .map_err(|e| aws_err("iam", "create-access-key", user, &e))?;

        let key = out.access_key().ok_or_else(|| {
            PaveError::Other(anyhow::anyhow!("create-access-key returned no key"))
        })?;
        Ok(AccessKeyPair {
            id: key.access_key_id().to_string(),
            secret: key.secret_access_key().to_string(),
        })
    }

    pub async fn delete_access_key(&self, user: &str, key_id: &str) -> Result<()> {
        self.iam
            .delete_access_key()
            .user_name(user)
            .access_key_id(key_id)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-access-key", key_id, &e))?;
        Ok(())
    }

    /// Flips a key between Active and Inactive. Rotation deactivates the
    /// compromised key rather than deleting it, so it can still be audited.
    pub async fn set_access_key_active(&self, user: &str, key_id: &str, active: bool) -> Result<()> {
        let status = if active {
            StatusType::Active
        } else {
            StatusType::Inactive
        };
        self.iam
            .update_access_key()
            .user_name(user)
            .access_key_id(key_id)
            .status(status)
            .send()
            .await
            .map_err(|e| aws_err("iam", "update-access-key", key_id, &e))?;
        Ok(())
    }

    pub async fn attach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_user_policy()
            .user_name(user)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "attach-user-policy", user, &e))?;
        Ok(())
    }

    pub async fn detach_user_policy(&self, user: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .detach_user_policy()
            .user_name(user)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "detach-user-policy", user, &e))?;
        Ok(())
    }

    pub async fn list_attached_user_policies(&self, user: &str) -> Result<Vec<PolicySummary>> {
        let out = self
            .iam
            .list_attached_user_policies()
            .user_name(user)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-attached-user-policies", user, &e))?;

        Ok(out
            .attached_policies()
            .iter()
            .filter_map(|p| {
                Some(PolicySummary {
                    name: p.policy_name()?.to_string(),
                    arn: p.policy_arn()?.to_string(),
                })
            })
            .collect())
    }

    pub async fn list_user_policies(&self, user: &str) -> Result<Vec<String>> {
        let out = self
            .iam
            .list_user_policies()
            .user_name(user)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-user-policies", user, &e))?;
        Ok(out.policy_names().to_vec())
    }

    pub async fn delete_user_policy(&self, user: &str, policy_name: &str) -> Result<()> {
        self.iam
            .delete_user_policy()
            .user_name(user)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-user-policy", policy_name, &e))?;
        Ok(())
    }

    pub async fn get_role(&self, name: &str) -> Result<RoleSummary> {
        let out = self
            .iam
            .get_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| aws_err("iam", "get-role", name, &e))?;

        let role = out
            .role()
            .ok_or_else(|| PaveError::NotFound(name.to_string()))?;
        Ok(RoleSummary {
            name: role.role_name().to_string(),
            arn: role.arn().to_string(),
            assume_role_policy: role.assume_role_policy_document().map(str::to_string),
        })
    }

    pub async fn role_exists(&self, name: &str) -> Result<bool> {
        match self.get_role(name).await {
            Ok(_) => Ok(true),
            Err(PaveError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create_role(
        &self,
        name: &str,
        trust_policy: &str,
        description: &str,
        tags: &[(&str, &str)],
    ) -> Result<RoleSummary> {
        let mut req = self
            .iam
            .create_role()
            .role_name(name)
            .assume_role_policy_document(trust_policy)
            .description(description);
        for (key, value) in tags {
            req = req.tags(iam_tag(key, value)?);
        }
        let out = req
            .send()
            .await
            .map_err(|e| aws_err("iam", "create-role", name, &e))?;

        let role = out
            .role()
            .ok_or_else(|| PaveError::Other(anyhow::anyhow!("create-role returned no role")))?;
        Ok(RoleSummary {
            name: role.role_name().to_string(),
            arn: role.arn().to_string(),
            assume_role_policy: role.assume_role_policy_document().map(str::to_string),
        })
    }

    pub async fn delete_role(&self, name: &str) -> Result<()> {
        self.iam
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-role", name, &e))?;
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleSummary>> {
        let mut roles = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut req = self.iam.list_roles();
            if let Some(m) = &marker {
                req = req.marker(m);
            }
            let out = req
                .send()
                .await
                .map_err(|e| aws_err("iam", "list-roles", "-", &e))?;

            roles.extend(out.roles().iter().map(|r| RoleSummary {
                name: r.role_name().to_string(),
                arn: r.arn().to_string(),
                assume_role_policy: r.assume_role_policy_document().map(str::to_string),
            }));

            marker = out.marker().map(str::to_string);
            if !out.is_truncated() || marker.is_none() {
                break;
            }
        }

        Ok(roles)
    }

    pub async fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "attach-role-policy", role, &e))?;
        Ok(())
    }

    pub async fn detach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .detach_role_policy()
            .role_name(role)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "detach-role-policy", role, &e))?;
        Ok(())
    }

    pub async fn detach_group_policy(&self, group: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .detach_group_policy()
            .group_name(group)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "detach-group-policy", group, &e))?;
        Ok(())
    }

    pub async fn list_attached_role_policies(&self, role: &str) -> Result<Vec<PolicySummary>> {
        let out = self
            .iam
            .list_attached_role_policies()
            .role_name(role)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-attached-role-policies", role, &e))?;

        Ok(out
            .attached_policies()
            .iter()
            .filter_map(|p| {
                Some(PolicySummary {
                    name: p.policy_name()?.to_string(),
                    arn: p.policy_arn()?.to_string(),
                })
            })
            .collect())
    }

    pub async fn list_role_policies(&self, role: &str) -> Result<Vec<String>> {
        let out = self
            .iam
            .list_role_policies()
            .role_name(role)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-role-policies", role, &e))?;
        Ok(out.policy_names().to_vec())
    }

    pub async fn delete_role_policy(&self, role: &str, policy_name: &str) -> Result<()> {
        self.iam
            .delete_role_policy()
            .role_name(role)
            .policy_name(policy_name)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-role-policy", policy_name, &e))?;
        Ok(())
    }

    /// Creates a customer-managed policy and returns its ARN.
    pub async fn create_policy(
        &self,
        name: &str,
        document: &str,
        description: &str,
        tags: &[(&str, &str)],
    ) -> Result<String> {
        let mut req = self
            .iam
            .create_policy()
            .policy_name(name)
            .policy_document(document)
            .description(description);
        for (key, value) in tags {
            req = req.tags(iam_tag(key, value)?);
        }
        let out = req
            .send()
            .await
            .map_err(|e| aws_err("iam", "create-policy", name, &e))?;

        out.policy()
            .and_then(|p| p.arn())
            .map(str::to_string)
            .ok_or_else(|| PaveError::Other(anyhow::anyhow!("create-policy returned no ARN")))
    }

    pub async fn delete_policy(&self, arn: &str) -> Result<()> {
        self.iam
            .delete_policy()
            .policy_arn(arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-policy", arn, &e))?;
        Ok(())
    }

    /// Lists customer-managed (local scope) policies.
    pub async fn list_local_policies(&self) -> Result<Vec<PolicySummary>> {
        let mut policies = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut req = self.iam.list_policies().scope(PolicyScopeType::Local);
            if let Some(m) = &marker {
                req = req.marker(m);
            }
            let out = req
                .send()
                .await
                .map_err(|e| aws_err("iam", "list-policies", "-", &e))?;

            policies.extend(out.policies().iter().filter_map(|p| {
                Some(PolicySummary {
                    name: p.policy_name()?.to_string(),
                    arn: p.arn()?.to_string(),
                })
            }));

            marker = out.marker().map(str::to_string);
            if !out.is_truncated() || marker.is_none() {
                break;
            }
        }

        Ok(policies)
    }

    pub async fn list_entities_for_policy(&self, arn: &str) -> Result<PolicyEntities> {
        let out = self
            .iam
            .list_entities_for_policy()
            .policy_arn(arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-entities-for-policy", arn, &e))?;

        Ok(PolicyEntities {
            users: out
                .policy_users()
                .iter()
                .filter_map(|u| u.user_name().map(str::to_string))
                .collect(),
            roles: out
                .policy_roles()
                .iter()
                .filter_map(|r| r.role_name().map(str::to_string))
                .collect(),
            groups: out
                .policy_groups()
                .iter()
                .filter_map(|g| g.group_name().map(str::to_string))
                .collect(),
        })
    }

    pub async fn list_policy_versions(&self, arn: &str) -> Result<Vec<PolicyVersionInfo>> {
        let out = self
            .iam
            .list_policy_versions()
            .policy_arn(arn)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-policy-versions", arn, &e))?;

        Ok(out
            .versions()
            .iter()
            .filter_map(|v| {
                Some(PolicyVersionInfo {
                    id: v.version_id()?.to_string(),
                    is_default: v.is_default_version(),
                })
            })
            .collect())
    }

    pub async fn delete_policy_version(&self, arn: &str, version_id: &str) -> Result<()> {
        self.iam
            .delete_policy_version()
            .policy_arn(arn)
            .version_id(version_id)
            .send()
            .await
            .map_err(|e| aws_err("iam", "delete-policy-version", arn, &e))?;
        Ok(())
    }

    /// Publishes a new default version of an existing managed policy.
    pub async fn create_policy_version(&self, arn: &str, document: &str) -> Result<String> {
        let out = self
            .iam
            .create_policy_version()
            .policy_arn(arn)
            .policy_document(document)
            .set_as_default(true)
            .send()
            .await
            .map_err(|e| aws_err("iam", "create-policy-version", arn, &e))?;

        Ok(out
            .policy_version()
            .and_then(|v| v.version_id())
            .unwrap_or("unknown")
            .to_string())
    }

    /// Minimal ListRoles call used as a permission probe.
    pub async fn probe_list_roles(&self) -> Result<()> {
        self.iam
            .list_roles()
            .max_items(1)
            .send()
            .await
            .map_err(|e| aws_err("iam", "list-roles", "-", &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_key_active_flag() {
        let active = AccessKeyInfo {
            id: "AKIA123".to_string(),
            status: "Active".to_string(),
            created: None,
        };
        let inactive = AccessKeyInfo {
            id: "AKIA456".to_string(),
            status: "Inactive".to_string(),
            created: None,
        };
        assert!(active.is_active());
        assert!(!inactive.is_active());
    }

    #[test]
    fn test_access_key_pair_debug_redacts_secret() {
        let pair = AccessKeyPair {
            id: "AKIA123".to_string(),
            secret: "supersecret".to_string(),
        };
        let rendered = format!("{pair:?}");
        assert!(rendered.contains("AKIA123"));
        assert!(!rendered.contains("supersecret"));
    }

    #[test]
    fn test_policy_entities_empty() {
        let entities = PolicyEntities::default();
        assert!(entities.is_empty());

        let attached = PolicyEntities {
            users: vec!["bootstrap-user".to_string()],
            ..Default::default()
        };
        assert!(!attached.is_empty());
    }
}
