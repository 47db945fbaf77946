//! Resource model of the network and storage topology

mod compute;
mod endpoint;
mod identity;
mod network;
mod security;
mod storage;

pub use compute::{Instance, MachineImage};
pub use endpoint::{s3_service_name, EndpointId, GatewayEndpoint};
pub use identity::{InstanceRole, EC2_SERVICE_PRINCIPAL};
pub use network::{NetworkPartition, Route, RouteTarget, Subnet, SubnetKind};
pub use security::{IngressRule, Peer, Protocol, SecurityGroup};
pub use storage::{BlockPublicAccess, Bucket, BucketPolicy};
