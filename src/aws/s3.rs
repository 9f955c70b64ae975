//! S3 operations for the Terraform state bucket.

use super::{aws_err, AwsClients};
use crate::{PaveError, Result};
use aws_sdk_s3::types::{
    BucketLocationConstraint, BucketVersioningStatus, CreateBucketConfiguration, Delete,
    ObjectIdentifier, PublicAccessBlockConfiguration, ServerSideEncryption,
    ServerSideEncryptionByDefault, ServerSideEncryptionConfiguration, ServerSideEncryptionRule,
    VersioningConfiguration,
};

fn object_id(key: &str, version_id: &str) -> Result<ObjectIdentifier> {
    ObjectIdentifier::builder()
        .key(key)
        .version_id(version_id)
        .build()
        .map_err(|e| PaveError::Other(anyhow::anyhow!("object identifier: {e}")))
}

impl AwsClients {
    /// HeadBucket probe; 404 means "does not exist", anything else is a
    /// real error.
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.s3.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_not_found())
                    .unwrap_or(false);
                if not_found {
                    Ok(false)
                } else {
                    Err(aws_err("s3", "head-bucket", bucket, &e))
                }
            }
        }
    }

    /// Creates the bucket. us-east-1 must not send a LocationConstraint.
    pub async fn create_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let mut req = self.s3.create_bucket().bucket(bucket);
        if region != "us-east-1" {
            let constraint = BucketLocationConstraint::from(region);
            let config = CreateBucketConfiguration::builder()
                .location_constraint(constraint)
                .build();
            req = req.create_bucket_configuration(config);
        }
        req.send()
            .await
            .map_err(|e| aws_err("s3", "create-bucket", bucket, &e))?;
        Ok(())
    }

    pub async fn enable_bucket_versioning(&self, bucket: &str) -> Result<()> {
        let config = VersioningConfiguration::builder()
            .status(BucketVersioningStatus::Enabled)
            .build();
        self.s3
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(config)
            .send()
            .await
            .map_err(|e| aws_err("s3", "put-bucket-versioning", bucket, &e))?;
        Ok(())
    }

    pub async fn enable_bucket_encryption(&self, bucket: &str) -> Result<()> {
        let by_default = ServerSideEncryptionByDefault::builder()
            .sse_algorithm(ServerSideEncryption::Aes256)
            .build()
            .map_err(|e| PaveError::Other(anyhow::anyhow!("encryption config: {e}")))?;
        let rule = ServerSideEncryptionRule::builder()
            .apply_server_side_encryption_by_default(by_default)
            .build();
        let config = ServerSideEncryptionConfiguration::builder()
            .rules(rule)
            .build()
            .map_err(|e| PaveError::Other(anyhow::anyhow!("encryption config: {e}")))?;

        self.s3
            .put_bucket_encryption()
            .bucket(bucket)
            .server_side_encryption_configuration(config)
            .send()
            .await
            .map_err(|e| aws_err("s3", "put-bucket-encryption", bucket, &e))?;
        Ok(())
    }

    pub async fn block_public_access(&self, bucket: &str) -> Result<()> {
        let config = PublicAccessBlockConfiguration::builder()
            .block_public_acls(true)
            .ignore_public_acls(true)
            .block_public_policy(true)
            .restrict_public_buckets(true)
            .build();
        self.s3
            .put_public_access_block()
            .bucket(bucket)
            .public_access_block_configuration(config)
            .send()
            .await
            .map_err(|e| aws_err("s3", "put-public-access-block", bucket, &e))?;
        Ok(())
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>> {
        let out = self
            .s3
            .list_buckets()
            .send()
            .await
            .map_err(|e| aws_err("s3", "list-buckets", "-", &e))?;
        Ok(out
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(str::to_string))
            .collect())
    }

    pub async fn list_objects_with_prefix(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let out = self
            .s3
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| aws_err("s3", "list-objects-v2", bucket, &e))?;
        Ok(out
            .contents()
            .iter()
            .filter_map(|o| o.key().map(str::to_string))
            .collect())
    }

    /// Deletes every object version and delete marker so a versioned
    /// bucket can actually be removed. Returns how many were deleted.
    pub async fn empty_bucket(&self, bucket: &str) -> Result<usize> {
        let mut deleted = 0usize;
        let mut key_marker: Option<String> = None;
        let mut version_marker: Option<String> = None;

        loop {
            let mut req = self.s3.list_object_versions().bucket(bucket);
            if let Some(k) = &key_marker {
                req = req.key_marker(k);
            }
            if let Some(v) = &version_marker {
                req = req.version_id_marker(v);
            }
            let out = req
                .send()
                .await
                .map_err(|e| aws_err("s3", "list-object-versions", bucket, &e))?;

            let mut targets = Vec::new();
            for version in out.versions() {
                if let (Some(key), Some(vid)) = (version.key(), version.version_id()) {
                    targets.push(object_id(key, vid)?);
                }
            }
            for marker in out.delete_markers() {
                if let (Some(key), Some(vid)) = (marker.key(), marker.version_id()) {
                    targets.push(object_id(key, vid)?);
                }
            }

            if !targets.is_empty() {
                deleted += targets.len();
                let delete = Delete::builder()
                    .set_objects(Some(targets))
                    .build()
                    .map_err(|e| PaveError::Other(anyhow::anyhow!("delete request: {e}")))?;
                self.s3
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| aws_err("s3", "delete-objects", bucket, &e))?;
            }

            if out.is_truncated().unwrap_or(false) {
                key_marker = out.next_key_marker().map(str::to_string);
                version_marker = out.next_version_id_marker().map(str::to_string);
                if key_marker.is_none() && version_marker.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        Ok(deleted)
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.s3
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| aws_err("s3", "delete-bucket", bucket, &e))?;
        Ok(())
    }
}
