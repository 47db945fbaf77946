use crate::policy::{PolicyDocument, PolicyStatement, Principal, STS_ASSUME_ROLE};
use vpcsite_cloud::RemovalPolicy;

pub const EC2_SERVICE_PRINCIPAL: &str = "ec2.amazonaws.com";

/// Execution identity of one compute instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRole {
    pub logical_id: String,
    pub assumed_by: String,
    pub managed_policy_arns: Vec<String>,
    pub removal_policy: RemovalPolicy,
}

impl InstanceRole {
    pub fn instance_profile_id(&self) -> String {
        format!("{}InstanceProfile", self.logical_id)
    }

    pub fn trust_policy(&self) -> PolicyDocument {
        PolicyDocument::new().with_statement(
            PolicyStatement::allow()
                .with_principal(Principal::Service(self.assumed_by.clone()))
                .with_action(STS_ASSUME_ROLE),
        )
    }
}
