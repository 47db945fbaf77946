use crate::model::EndpointId;
use crate::policy::PolicyDocument;
use vpcsite_cloud::RemovalPolicy;

/// Public access block settings of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPublicAccess {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl BlockPublicAccess {
    /// ACL grants blocked; bucket policy left as the access-control surface
    pub fn acls_only() -> Self {
        Self {
            block_public_acls: true,
            ignore_public_acls: true,
            block_public_policy: false,
            restrict_public_buckets: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub logical_id: String,
    pub name: String,
    pub block_public_access: BlockPublicAccess,
    pub website_index_document: String,
    /// Empty the bucket before deleting it on teardown
    pub auto_delete_objects: bool,
    pub removal_policy: RemovalPolicy,
}

/// Resource policy attached to a bucket, tied to the endpoint it admits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketPolicy {
    pub logical_id: String,
    pub endpoint: EndpointId,
    pub document: PolicyDocument,
    pub removal_policy: RemovalPolicy,
}
