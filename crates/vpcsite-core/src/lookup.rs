//! Discovery of the pre-existing network partition

use crate::error::{Result, TopologyError};
use crate::model::NetworkPartition;
use async_trait::async_trait;

/// Finds the account's default network. Implementations fail closed: an
/// absent network is an error, never a reason to create one.
#[async_trait]
pub trait NetworkLookup: Send + Sync {
    async fn default_network(&self) -> Result<NetworkPartition>;
}

/// Lookup answered from configuration (a cached earlier lookup)
#[derive(Debug, Clone, Default)]
pub struct StaticNetworkLookup {
    partition: Option<NetworkPartition>,
}

impl StaticNetworkLookup {
    pub fn new(partition: Option<NetworkPartition>) -> Self {
        Self { partition }
    }
}

#[async_trait]
impl NetworkLookup for StaticNetworkLookup {
    async fn default_network(&self) -> Result<NetworkPartition> {
        let partition = self.partition.clone().ok_or_else(|| {
            TopologyError::NetworkNotFound("オフライン用のネットワークが設定されていません".to_string())
        })?;
        if partition.vpc_id.trim().is_empty() {
            return Err(TopologyError::NetworkNotFound(
                "設定されたネットワークのVPC IDが空です".to_string(),
            ));
        }
        if partition.availability_zones.is_empty() {
            return Err(TopologyError::NoAvailabilityZone(partition.vpc_id));
        }
        Ok(partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_network_fails_closed() {
        let lookup = StaticNetworkLookup::new(None);
        assert!(matches!(
            lookup.default_network().await,
            Err(TopologyError::NetworkNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_network_without_zones_is_rejected() {
        let lookup = StaticNetworkLookup::new(Some(NetworkPartition::new("vpc-0abc", vec![])));
        assert!(matches!(
            lookup.default_network().await,
            Err(TopologyError::NoAvailabilityZone(_))
        ));
    }

    #[tokio::test]
    async fn test_configured_network_is_returned() {
        let partition = NetworkPartition::new("vpc-0abc", vec!["ap-northeast-1a".to_string()]);
        let lookup = StaticNetworkLookup::new(Some(partition.clone()));
        assert_eq!(lookup.default_network().await.unwrap(), partition);
    }
}
