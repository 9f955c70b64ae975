//! Secrets Manager operations for the bootstrap credential secret.

use super::{aws_err, AwsClients};
use crate::{PaveError, Result};
use aws_sdk_secretsmanager::types::Tag;

/// How the bootstrap secret ended up stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStoreOutcome {
    /// Existing secret updated in place.
    Updated,
    /// Secret did not exist and was created.
    Created,
    /// Secret was pending deletion, restored, then updated.
    Restored,
}

impl AwsClients {
    /// Stores `payload` under `name` and applies `resource_policy`.
    ///
    /// Handles the three states a secret can be in: present (update),
    /// absent (create), and scheduled for deletion (restore, then update).
    pub async fn store_secret_json(
        &self,
        name: &str,
        description: &str,
        payload: &serde_json::Value,
        resource_policy: &serde_json::Value,
        tags: &[(&str, &str)],
    ) -> Result<SecretStoreOutcome> {
        let secret_string = serde_json::to_string(payload)?;

        match self
            .secrets
            .update_secret()
            .secret_id(name)
            .secret_string(&secret_string)
            .send()
            .await
        {
            Ok(_) => {
                self.put_secret_resource_policy(name, resource_policy).await?;
                Ok(SecretStoreOutcome::Updated)
            }
            Err(e) => match aws_err("secretsmanager", "update-secret", name, &e) {
                PaveError::NotFound(_) => {
                    let mut req = self
                        .secrets
                        .create_secret()
                        .name(name)
                        .description(description)
                        .secret_string(&secret_string);
                    for (key, value) in tags {
                        req = req.tags(Tag::builder().key(*key).value(*value).build());
                    }
                    req.send()
                        .await
                        .map_err(|e| aws_err("secretsmanager", "create-secret", name, &e))?;

                    self.put_secret_resource_policy(name, resource_policy).await?;
                    Ok(SecretStoreOutcome::Created)
                }
                err if err.aws_code() == Some("InvalidRequestException") => {
                    // Scheduled for deletion; restore brings it back with
                    // its old value, so update afterwards.
                    self.secrets
                        .restore_secret()
                        .secret_id(name)
                        .send()
                        .await
                        .map_err(|e| aws_err("secretsmanager", "restore-secret", name, &e))?;

                    self.secrets
                        .update_secret()
                        .secret_id(name)
                        .secret_string(&secret_string)
                        .send()
                        .await
                        .map_err(|e| aws_err("secretsmanager", "update-secret", name, &e))?;

                    self.put_secret_resource_policy(name, resource_policy).await?;
                    Ok(SecretStoreOutcome::Restored)
                }
                err => Err(err),
            },
        }
    }

    async fn put_secret_resource_policy(
        &self,
        name: &str,
        policy: &serde_json::Value,
    ) -> Result<()> {
        self.secrets
            .put_resource_policy()
            .secret_id(name)
            .resource_policy(serde_json::to_string(policy)?)
            .send()
            .await
            .map_err(|e| aws_err("secretsmanager", "put-resource-policy", name, &e))?;
        Ok(())
    }

    /// Force-deletes a secret with no recovery window. Returns false when
    /// the secret was already gone.
    pub async fn delete_secret_force(&self, name: &str) -> Result<bool> {
        match self
            .secrets
            .delete_secret()
            .secret_id(name)
            .force_delete_without_recovery(true)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match aws_err("secretsmanager", "delete-secret", name, &e) {
                PaveError::NotFound(_) => Ok(false),
                err => Err(err),
            },
        }
    }

    pub async fn list_secret_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut req = self.secrets.list_secrets();
            if let Some(token) = &next_token {
                req = req.next_token(token);
            }
            let response = req
                .send()
                .await
                .map_err(|e| aws_err("secretsmanager", "list-secrets", "-", &e))?;

            for entry in response.secret_list() {
                if let Some(name) = entry.name() {
                    names.push(name.to_string());
                }
            }

            next_token = response.next_token().map(String::from);
            if next_token.is_none() {
                break;
            }
        }

        Ok(names)
    }
}
