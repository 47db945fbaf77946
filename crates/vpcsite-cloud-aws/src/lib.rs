//! AWS integration for vpcsite
//!
//! Provides [`Ec2NetworkLookup`], which finds the account's default VPC and
//! its availability zones through the EC2 API.

pub mod error;
pub mod lookup;

pub use error::{AwsError, Result};
pub use lookup::{partition_from, Ec2NetworkLookup};
