//! Inputs shared by the topology builders

use crate::cidr;
use crate::error::Result;
use ipnetwork::Ipv4Network;

pub const NETWORK_STACK_NAME: &str = "StaticWebsiteVpcStack";
pub const STORAGE_STACK_NAME: &str = "StaticWebsiteS3Stack";
pub const DEFAULT_BUCKET_NAME: &str = "static-website-vpce-bucket";
pub const DEFAULT_KEY_PAIR_NAME: &str = "static-website-key-pair";
pub const DEFAULT_PRIVATE_SUBNET_CIDR: &str = "172.31.48.0/20";
pub const DEFAULT_PUBLIC_SUBNET_CIDR: &str = "172.31.64.0/20";
pub const DEFAULT_INSTANCE_TYPE: &str = "t2.micro";
pub const DEFAULT_INDEX_DOCUMENT: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologySettings {
    pub account: String,
    pub region: String,
    pub network_stack_name: String,
    pub storage_stack_name: String,
    pub bucket_name: String,
    pub key_pair_name: String,
    pub private_subnet_cidr: Ipv4Network,
    pub public_subnet_cidr: Ipv4Network,
    pub instance_type: String,
    pub index_document: String,
    /// Existing internet gateway for the public subnet's default route
    pub internet_gateway_id: Option<String>,
}

impl TopologySettings {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Result<Self> {
        Ok(Self {
            account: account.into(),
            region: region.into(),
            network_stack_name: NETWORK_STACK_NAME.to_string(),
            storage_stack_name: STORAGE_STACK_NAME.to_string(),
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            key_pair_name: DEFAULT_KEY_PAIR_NAME.to_string(),
            private_subnet_cidr: cidr::parse_cidr(DEFAULT_PRIVATE_SUBNET_CIDR)?,
            public_subnet_cidr: cidr::parse_cidr(DEFAULT_PUBLIC_SUBNET_CIDR)?,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            index_document: DEFAULT_INDEX_DOCUMENT.to_string(),
            internet_gateway_id: None,
        })
    }

    pub fn with_internet_gateway(mut self, gateway_id: impl Into<String>) -> Self {
        self.internet_gateway_id = Some(gateway_id.into());
        self
    }

    pub fn with_bucket_name(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = bucket_name.into();
        self
    }

    pub fn with_subnet_cidrs(mut self, private: Ipv4Network, public: Ipv4Network) -> Self {
        self.private_subnet_cidr = private;
        self.public_subnet_cidr = public;
        self
    }
}
