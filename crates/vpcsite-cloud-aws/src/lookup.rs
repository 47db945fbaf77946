//! Default VPC lookup through the EC2 API

use crate::error::{AwsError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{AvailabilityZone, Filter, Vpc};
use aws_sdk_ec2::Client;
use tracing::{debug, info};
use vpcsite_core::cidr::parse_cidr;
use vpcsite_core::{NetworkLookup, NetworkPartition};

/// Looks up the account's default VPC in one region. Never creates one.
pub struct Ec2NetworkLookup {
    client: Client,
    region: String,
}

impl Ec2NetworkLookup {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    /// Build a client from the default credential chain for `region`
    pub async fn from_env(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config), region)
    }

    async fn default_vpcs(&self) -> Result<Vec<Vpc>> {
        let response = self
            .client
            .describe_vpcs()
            .filters(Filter::builder().name("isDefault").values("true").build())
            .send()
            .await
            .map_err(|e| AwsError::Api {
                operation: "DescribeVpcs".to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(response.vpcs().to_vec())
    }

    async fn availability_zones(&self) -> Result<Vec<AvailabilityZone>> {
        let response = self
            .client
            .describe_availability_zones()
            .filters(Filter::builder().name("state").values("available").build())
            .filters(
                Filter::builder()
                    .name("zone-type")
                    .values("availability-zone")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| AwsError::Api {
                operation: "DescribeAvailabilityZones".to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(response.availability_zones().to_vec())
    }

    /// Default VPC and its zones, or an error when the region has none
    pub async fn lookup(&self) -> Result<NetworkPartition> {
        let vpcs = self.default_vpcs().await?;
        debug!(region = %self.region, count = vpcs.len(), "Described default VPCs");
        let zones = self.availability_zones().await?;
        let partition = partition_from(&self.region, &vpcs, &zones)?;
        info!(
            vpc_id = %partition.vpc_id,
            zones = partition.availability_zones.len(),
            "Found default VPC"
        );
        Ok(partition)
    }
}

#[async_trait]
impl NetworkLookup for Ec2NetworkLookup {
    async fn default_network(&self) -> vpcsite_core::Result<NetworkPartition> {
        Ok(self.lookup().await?)
    }
}

/// Map EC2 responses to a network partition. Zones are sorted by name so the
/// first zone is stable across calls.
pub fn partition_from(
    region: &str,
    vpcs: &[Vpc],
    zones: &[AvailabilityZone],
) -> Result<NetworkPartition> {
    let vpc = vpcs
        .iter()
        .find(|v| v.is_default().unwrap_or(true))
        .ok_or_else(|| AwsError::DefaultVpcNotFound(region.to_string()))?;
    let vpc_id = vpc
        .vpc_id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AwsError::MissingVpcId {
            region: region.to_string(),
        })?;

    let mut zone_names: Vec<String> = zones
        .iter()
        .filter_map(|z| z.zone_name())
        .map(str::to_string)
        .collect();
    zone_names.sort();

    let mut partition = NetworkPartition::new(vpc_id, zone_names);
    if let Some(cidr) = vpc.cidr_block() {
        partition = partition.with_cidr(parse_cidr(cidr)?);
    }
    Ok(partition)
}
