use std::path::PathBuf;
use tempfile::TempDir;
use vpcsite_cloud::LocalEngine;
use vpcsite_core::cidr::parse_cidr;
use vpcsite_core::{NetworkPartition, StaticNetworkLookup, TopologySettings};

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "ap-northeast-1";
pub const GATEWAY: &str = "igw-0a1b2c3d4e5f67890";

pub struct TestTopology {
    pub root: TempDir,
    pub engine: LocalEngine,
    pub lookup: StaticNetworkLookup,
    pub settings: TopologySettings,
}

impl TestTopology {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let engine = LocalEngine::new(root.path(), ACCOUNT, REGION);
        let network = NetworkPartition::new(
            "vpc-0a1b2c3d",
            vec![format!("{}a", REGION), format!("{}c", REGION)],
        )
        .with_cidr(parse_cidr("172.31.0.0/16").unwrap());
        let settings = TopologySettings::new(ACCOUNT, REGION)
            .unwrap()
            .with_internet_gateway(GATEWAY);

        Self {
            root,
            engine,
            lookup: StaticNetworkLookup::new(Some(network)),
            settings,
        }
    }

    #[allow(dead_code)]
    pub fn without_gateway(mut self) -> Self {
        self.settings.internet_gateway_id = None;
        self
    }

    #[allow(dead_code)]
    pub fn state_path(&self) -> PathBuf {
        self.engine.state_manager().state_path()
    }
}
