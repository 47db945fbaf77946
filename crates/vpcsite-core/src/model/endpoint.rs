use crate::error::{Result, TopologyError};
use crate::policy::PolicyDocument;
use vpcsite_cloud::RemovalPolicy;

const ENDPOINT_PREFIX: &str = "vpce-";

/// Identifier of a provisioned gateway endpoint (`vpce-` + 8 to 17 hex digits)
///
/// Only exists once the endpoint has been created; there is no way to build
/// one from an empty string or an unresolved placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TopologyError::UnresolvedEndpoint(
                "エンドポイントIDが空です".to_string(),
            ));
        }

        let hex = raw.strip_prefix(ENDPOINT_PREFIX).ok_or_else(|| {
            TopologyError::UnresolvedEndpoint(format!("'{}' はゲートウェイエンドポイントIDではありません", raw))
        })?;
        let well_formed = (8..=17).contains(&hex.len())
            && hex.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !well_formed {
            return Err(TopologyError::UnresolvedEndpoint(format!(
                "'{}' はゲートウェイエンドポイントIDではありません",
                raw
            )));
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EndpointId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Private path from subnets to the storage service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub logical_id: String,
    pub vpc_id: String,
    pub service_name: String,
    /// Logical IDs of the subnets whose route tables get the endpoint route
    pub subnets: Vec<String>,
    pub policy: PolicyDocument,
    pub removal_policy: RemovalPolicy,
}

/// Gateway service name of S3 in a region
pub fn s3_service_name(region: &str) -> String {
    format!("com.amazonaws.{}.s3", region)
}
