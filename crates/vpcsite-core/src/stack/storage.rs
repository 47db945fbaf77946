//! Website bucket and its late-bound access policy

use crate::error::{Result, TopologyError};
use crate::model::{BlockPublicAccess, Bucket, BucketPolicy, EndpointId};
use crate::policy::{
    bucket_object_arn, PolicyDocument, PolicyStatement, Principal, S3_GET_OBJECT,
    SOURCE_VPCE_KEY, STRING_EQUALS,
};
use crate::settings::TopologySettings;
use serde_json::json;
use tracing::{debug, info};
use vpcsite_cloud::{reference, RemovalPolicy, ResourceConfig, ResourceSet};

pub struct StorageResourceBuilder<'a> {
    settings: &'a TopologySettings,
}

impl<'a> StorageResourceBuilder<'a> {
    pub fn new(settings: &'a TopologySettings) -> Self {
        Self { settings }
    }

    /// Bucket with static hosting enabled and public ACL grants blocked.
    /// Policy-level blocking stays off so a scoped policy can be attached.
    pub fn create_bucket(&self, name: &str) -> StorageStack {
        let bucket = Bucket {
            logical_id: "WebsiteBucket".to_string(),
            name: name.to_string(),
            block_public_access: BlockPublicAccess::acls_only(),
            website_index_document: self.settings.index_document.clone(),
            auto_delete_objects: true,
            removal_policy: RemovalPolicy::Destroy,
        };
        debug!(bucket = %bucket.name, "Declared bucket");

        StorageStack {
            name: self.settings.storage_stack_name.clone(),
            bucket,
            policy: None,
        }
    }
}

/// Declared storage topology
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStack {
    pub name: String,
    pub bucket: Bucket,
    policy: Option<BucketPolicy>,
}

impl StorageStack {
    /// Grant `s3:GetObject` on the bucket's objects to any principal whose
    /// request arrives through `endpoint`.
    ///
    /// Attaching the same endpoint again is a no-op. A different endpoint is
    /// rejected with [`TopologyError::PolicyAlreadyAttached`], so the policy
    /// never admits two endpoints at once.
    pub fn attach_access_policy(&mut self, endpoint: &EndpointId) -> Result<()> {
        if let Some(existing) = &self.policy {
            if &existing.endpoint == endpoint {
                debug!(endpoint = %endpoint, "Access policy already attached");
                return Ok(());
            }
            return Err(TopologyError::PolicyAlreadyAttached {
                existing: existing.endpoint.to_string(),
                requested: endpoint.to_string(),
            });
        }

        let document = PolicyDocument::new().with_statement(
            PolicyStatement::allow()
                .with_principal(Principal::Any)
                .with_action(S3_GET_OBJECT)
                .with_resource(bucket_object_arn(&self.bucket.name))
                .with_condition(STRING_EQUALS, SOURCE_VPCE_KEY, endpoint.as_str()),
        );

        self.policy = Some(BucketPolicy {
            logical_id: format!("{}Policy", self.bucket.logical_id),
            endpoint: endpoint.clone(),
            document,
            removal_policy: RemovalPolicy::Destroy,
        });
        info!(bucket = %self.bucket.name, endpoint = %endpoint, "Attached bucket access policy");
        Ok(())
    }

    pub fn policy(&self) -> Option<&BucketPolicy> {
        self.policy.as_ref()
    }

    pub fn to_resource_set(&self) -> ResourceSet {
        let mut set = ResourceSet::new(&self.name);
        let bucket = &self.bucket;
        let access = &bucket.block_public_access;

        set.add(
            ResourceConfig::new(
                "AWS::S3::Bucket",
                &bucket.logical_id,
                json!({
                    "BucketName": bucket.name,
                    "PublicAccessBlockConfiguration": {
                        "BlockPublicAcls": access.block_public_acls,
                        "IgnorePublicAcls": access.ignore_public_acls,
                        "BlockPublicPolicy": access.block_public_policy,
                        "RestrictPublicBuckets": access.restrict_public_buckets,
                    },
                    "WebsiteConfiguration": { "IndexDocument": bucket.website_index_document },
                    "AutoDeleteObjects": bucket.auto_delete_objects,
                }),
            )
            .with_removal_policy(bucket.removal_policy),
        );

        if let Some(policy) = &self.policy {
            set.add(
                ResourceConfig::new(
                    "AWS::S3::BucketPolicy",
                    &policy.logical_id,
                    json!({
                        "Bucket": reference(&bucket.logical_id),
                        "PolicyDocument": policy.document.to_json(),
                    }),
                )
                .with_removal_policy(policy.removal_policy),
            );
        }

        set
    }
}
