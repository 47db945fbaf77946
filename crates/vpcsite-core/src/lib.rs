//! vpcsite core
//!
//! Declares a static-website topology inside an existing network: a private
//! and a public subnet with one instance each, a gateway endpoint to S3 on
//! the private subnet, and a bucket readable only through that endpoint.
//!
//! [`TopologyComposer`] is the entry point. It provisions the network stack
//! first and binds the bucket policy to the endpoint ID that run produced.

pub mod cidr;
pub mod composer;
pub mod error;
pub mod lookup;
pub mod model;
pub mod policy;
pub mod settings;
pub mod stack;
pub mod validate;

pub use composer::{
    DeployedTopology, SynthesizedTopology, TeardownReport, TopologyComposer, TopologyPlan,
    TopologyStatus,
};
pub use error::{Result, TopologyError};
pub use lookup::{NetworkLookup, StaticNetworkLookup};
pub use model::*;
pub use settings::TopologySettings;
pub use stack::{
    InstanceBindings, NetworkStack, NetworkTopologyBuilder, ProvisionedNetwork,
    StorageResourceBuilder, StorageStack, ENDPOINT_OUTPUT,
};
pub use validate::{check_removal_policies, validate_network, validate_storage};
