//! AWS lookup error types

use thiserror::Error;
use vpcsite_core::TopologyError;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("EC2 API call {operation} failed: {message}")]
    Api { operation: String, message: String },

    #[error("No default VPC in region {0}")]
    DefaultVpcNotFound(String),

    #[error("Default VPC in region {region} has no ID")]
    MissingVpcId { region: String },

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),
}

impl From<AwsError> for TopologyError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Topology(inner) => inner,
            other => TopologyError::NetworkNotFound(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
