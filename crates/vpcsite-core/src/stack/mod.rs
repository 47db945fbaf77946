//! Stack builders

mod network;
mod storage;

pub use network::{
    InstanceBindings, NetworkStack, NetworkTopologyBuilder, ProvisionedNetwork, ENDPOINT_OUTPUT,
};
pub use storage::{StorageResourceBuilder, StorageStack};
