//! IAM-style policy documents

use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

pub const POLICY_VERSION: &str = "2012-10-17";
pub const S3_GET_OBJECT: &str = "s3:GetObject";
pub const STS_ASSUME_ROLE: &str = "sts:AssumeRole";
pub const STRING_EQUALS: &str = "StringEquals";
pub const SOURCE_VPCE_KEY: &str = "aws:SourceVpce";

/// ARN matching every object in a bucket
pub fn bucket_object_arn(bucket_name: &str) -> String {
    format!("arn:aws:s3:::{}/*", bucket_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Effect::Allow => "Allow",
            Effect::Deny => "Deny",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Any principal (`{"AWS": "*"}`)
    Any,
    /// A service principal such as `ec2.amazonaws.com`
    Service(String),
}

impl Principal {
    fn to_json(&self) -> Value {
        match self {
            Principal::Any => json!({ "AWS": "*" }),
            Principal::Service(service) => json!({ "Service": service }),
        }
    }
}

/// One statement of a policy document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyStatement {
    pub sid: Option<String>,
    pub effect: Effect,
    pub principal: Option<Principal>,
    pub actions: BTreeSet<String>,
    pub resources: Vec<String>,
    /// operator -> (context key -> value)
    pub conditions: BTreeMap<String, BTreeMap<String, String>>,
}

impl PolicyStatement {
    pub fn allow() -> Self {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            actions: BTreeSet::new(),
            resources: Vec::new(),
            conditions: BTreeMap::new(),
        }
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.insert(action.into());
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resources.push(resource.into());
        self
    }

    pub fn with_condition(
        mut self,
        operator: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.conditions
            .entry(operator.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Value of a condition key under an operator
    pub fn condition(&self, operator: &str, key: &str) -> Option<&str> {
        self.conditions.get(operator)?.get(key).map(String::as_str)
    }

    /// Whether the action set is exactly `actions`
    pub fn has_exact_actions(&self, actions: &[&str]) -> bool {
        self.actions.len() == actions.len() && actions.iter().all(|a| self.actions.contains(*a))
    }

    pub fn to_json(&self) -> Value {
        let mut statement = json!({
            "Effect": self.effect.as_str(),
            "Action": self.actions.iter().collect::<Vec<_>>(),
        });
        if let Some(sid) = &self.sid {
            statement["Sid"] = json!(sid);
        }
        if let Some(principal) = &self.principal {
            statement["Principal"] = principal.to_json();
        }
        if !self.resources.is_empty() {
            statement["Resource"] = json!(self.resources);
        }
        if !self.conditions.is_empty() {
            statement["Condition"] = json!(self.conditions);
        }
        statement
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDocument {
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statement(mut self, statement: PolicyStatement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn to_json(&self) -> Value {
        json!({
            "Version": POLICY_VERSION,
            "Statement": self.statements.iter().map(PolicyStatement::to_json).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditional_read_statement_json() {
        let statement = PolicyStatement::allow()
            .with_principal(Principal::Any)
            .with_action(S3_GET_OBJECT)
            .with_resource(bucket_object_arn("site"))
            .with_condition(STRING_EQUALS, SOURCE_VPCE_KEY, "vpce-0123456789abcdef0");

        let doc = PolicyDocument::new().with_statement(statement).to_json();
        assert_eq!(
            doc,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": { "AWS": "*" },
                    "Action": ["s3:GetObject"],
                    "Resource": ["arn:aws:s3:::site/*"],
                    "Condition": { "StringEquals": { "aws:SourceVpce": "vpce-0123456789abcdef0" } },
                }],
            })
        );
    }

    #[test]
    fn test_service_principal_json() {
        let statement = PolicyStatement::allow()
            .with_principal(Principal::Service("ec2.amazonaws.com".to_string()))
            .with_action(STS_ASSUME_ROLE);
        assert_eq!(
            statement.to_json()["Principal"],
            json!({ "Service": "ec2.amazonaws.com" })
        );
        assert!(statement.to_json().get("Resource").is_none());
    }

    #[test]
    fn test_exact_actions() {
        let statement = PolicyStatement::allow()
            .with_action(S3_GET_OBJECT)
            .with_action("s3:ListBucket");
        assert!(!statement.has_exact_actions(&[S3_GET_OBJECT]));
        assert!(statement.has_exact_actions(&["s3:ListBucket", S3_GET_OBJECT]));
    }
}
