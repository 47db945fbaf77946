//! Sequencing of the network and storage stacks
//!
//! The storage stack's bucket policy is conditioned on the gateway endpoint
//! ID, which only exists once the network stack has been applied. The
//! composer therefore always runs two ordered steps:
//!
//! 1. apply the network stack and confirm it ([`ProvisionedNetwork`])
//! 2. attach the confirmed endpoint ID to the bucket policy and apply the
//!    storage stack
//!
//! Teardown runs in the opposite order.

use crate::error::{Result, TopologyError};
use crate::lookup::NetworkLookup;
use crate::model::{EndpointId, NetworkPartition};
use crate::settings::TopologySettings;
use crate::stack::{
    NetworkStack, NetworkTopologyBuilder, ProvisionedNetwork, StorageResourceBuilder,
    StorageStack,
};
use crate::validate::{validate_network, validate_storage};
use tracing::{info, warn};
use vpcsite_cloud::{ApplyResult, Plan, ProviderState, ProvisioningEngine};

/// Declared stacks before anything is provisioned
#[derive(Debug, Clone)]
pub struct SynthesizedTopology {
    pub network: NetworkStack,
    /// Storage stack without its access policy
    pub storage: StorageStack,
}

impl SynthesizedTopology {
    /// Stack name and template of each stack, in deployment order
    pub fn templates(&self) -> Result<Vec<(String, serde_json::Value)>> {
        Ok(vec![
            (
                self.network.name.clone(),
                self.network.to_resource_set()?.to_template(),
            ),
            (
                self.storage.name.clone(),
                self.storage.to_resource_set().to_template(),
            ),
        ])
    }
}

#[derive(Debug, Clone)]
pub struct TopologyPlan {
    pub network: Plan,
    pub storage: Plan,
    /// Endpoint the storage plan's policy is bound to; `None` while the
    /// network stack has not been provisioned
    pub endpoint_id: Option<EndpointId>,
}

impl TopologyPlan {
    pub fn has_changes(&self) -> bool {
        self.network.has_changes || self.storage.has_changes
    }
}

/// Result of a successful deployment
#[derive(Debug, Clone)]
pub struct DeployedTopology {
    pub network: ProvisionedNetwork,
    pub network_result: ApplyResult,
    pub storage: StorageStack,
    pub storage_result: ApplyResult,
}

impl DeployedTopology {
    pub fn endpoint_id(&self) -> &EndpointId {
        self.network.endpoint_id()
    }
}

#[derive(Debug, Clone)]
pub struct TeardownReport {
    pub storage: ApplyResult,
    pub network: ApplyResult,
}

impl TeardownReport {
    /// Logical IDs left behind because of their removal policy
    pub fn retained(&self) -> Vec<String> {
        self.storage
            .retained
            .iter()
            .chain(&self.network.retained)
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.storage.is_success() && self.network.is_success() && self.retained().is_empty()
    }
}

/// Provisioned resources of both stacks
#[derive(Debug, Clone)]
pub struct TopologyStatus {
    pub network: ProviderState,
    pub storage: ProviderState,
}

pub struct TopologyComposer<'a, E: ProvisioningEngine + ?Sized> {
    engine: &'a E,
    lookup: &'a dyn NetworkLookup,
    settings: &'a TopologySettings,
}

impl<'a, E: ProvisioningEngine + ?Sized> TopologyComposer<'a, E> {
    pub fn new(
        engine: &'a E,
        lookup: &'a dyn NetworkLookup,
        settings: &'a TopologySettings,
    ) -> Self {
        Self {
            engine,
            lookup,
            settings,
        }
    }

    /// Look up the network and declare the network stack
    async fn declare_network(&self) -> Result<NetworkStack> {
        // Before any lookup, so a missing gateway fails without network calls
        let gateway_set = self
            .settings
            .internet_gateway_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if !gateway_set {
            return Err(TopologyError::MissingInternetGateway);
        }

        let network: NetworkPartition = self.lookup.default_network().await?;
        info!(vpc_id = %network.vpc_id, "Found default network");

        let stack = NetworkTopologyBuilder::new(&network, self.settings).build()?;
        validate_network(&stack)?;
        Ok(stack)
    }

    fn declare_storage(&self) -> StorageStack {
        StorageResourceBuilder::new(self.settings).create_bucket(&self.settings.bucket_name)
    }

    /// Declare both stacks without provisioning anything
    pub async fn synth(&self) -> Result<SynthesizedTopology> {
        Ok(SynthesizedTopology {
            network: self.declare_network().await?,
            storage: self.declare_storage(),
        })
    }

    /// Plan both stacks against the engine's current state. The storage
    /// plan includes the access policy only when the network stack is
    /// already provisioned. A recorded endpoint whose ID is malformed is an
    /// error, not an unprovisioned network.
    pub async fn plan(&self) -> Result<TopologyPlan> {
        let network = self.declare_network().await?;
        let network_plan = self.engine.plan(&network.to_resource_set()?).await?;

        let current = self.engine.get_state(&network.name).await?;
        let endpoint_id = current
            .physical_id(&network.endpoint.logical_id)
            .map(EndpointId::parse)
            .transpose()
            .map_err(|e| {
                warn!(error = %e, stack = %network.name, "Recorded endpoint ID is malformed");
                e
            })?;

        let mut storage = self.declare_storage();
        if let Some(endpoint) = &endpoint_id {
            storage.attach_access_policy(endpoint)?;
        }
        let storage_plan = self.engine.plan(&storage.to_resource_set()).await?;

        Ok(TopologyPlan {
            network: network_plan,
            storage: storage_plan,
            endpoint_id,
        })
    }

    /// Provision the network stack, then the storage stack bound to the
    /// endpoint it produced
    #[tracing::instrument(skip(self), fields(engine = %self.engine.name()))]
    pub async fn deploy(&self) -> Result<DeployedTopology> {
        let network = self.declare_network().await?;
        let network_set = network.to_resource_set()?;
        let fresh_network = self.engine.get_state(&network.name).await?.is_empty();

        let plan = self.engine.plan(&network_set).await?;
        let network_result = self.engine.apply(&plan, &network_set).await?;
        if !network_result.is_success() {
            return Err(TopologyError::ProvisioningFailed {
                stack: network.name.clone(),
                reason: network_result.first_error().unwrap_or("適用に失敗しました").to_string(),
            });
        }

        match self.bind_storage(&network, &network_result).await {
            Ok((provisioned, storage, storage_result)) => Ok(DeployedTopology {
                network: provisioned,
                network_result,
                storage,
                storage_result,
            }),
            Err(e) => {
                if fresh_network {
                    warn!(error = %e, "Removing network stack created in this run");
                    self.remove_fresh_network(&network.name).await;
                }
                Err(e)
            }
        }
    }

    /// Best-effort cleanup after a failed run. Its outcome is only logged so
    /// the caller always sees the error that caused it.
    async fn remove_fresh_network(&self, stack: &str) {
        match self.engine.destroy_all(stack).await {
            Ok(result) if result.is_success() && result.retained.is_empty() => {
                info!(stack, removed = result.succeeded.len(), "Network stack removed");
            }
            Ok(result) => warn!(
                stack,
                error = result.first_error().unwrap_or_default(),
                retained = ?result.retained,
                "Network stack was not fully removed"
            ),
            Err(cleanup) => warn!(stack, error = %cleanup, "Could not remove network stack"),
        }
    }

    /// Confirm the applied network stack and provision storage against its endpoint
    async fn bind_storage(
        &self,
        network: &NetworkStack,
        network_result: &ApplyResult,
    ) -> Result<(ProvisionedNetwork, StorageStack, ApplyResult)> {
        let state = self.engine.get_state(&network.name).await?;
        let provisioned = ProvisionedNetwork::confirm(network, network_result, &state)?;
        info!(endpoint = %provisioned.endpoint_id(), "Network stack provisioned");

        let (storage, result) = self.deploy_storage(provisioned.endpoint_id()).await?;
        Ok((provisioned, storage, result))
    }

    async fn deploy_storage(&self, endpoint: &EndpointId) -> Result<(StorageStack, ApplyResult)> {
        let mut storage = self.declare_storage();
        storage.attach_access_policy(endpoint)?;
        validate_storage(&storage, endpoint)?;

        let storage_set = storage.to_resource_set();
        let plan = self.engine.plan(&storage_set).await?;
        let result = self.engine.apply(&plan, &storage_set).await?;
        if !result.is_success() {
            return Err(TopologyError::ProvisioningFailed {
                stack: storage.name.clone(),
                reason: result.first_error().unwrap_or("適用に失敗しました").to_string(),
            });
        }

        info!(bucket = %storage.bucket.name, "Storage stack provisioned");
        Ok((storage, result))
    }

    /// Destroy the storage stack, then the network stack
    #[tracing::instrument(skip(self), fields(engine = %self.engine.name()))]
    pub async fn teardown(&self) -> Result<TeardownReport> {
        let storage = self
            .engine
            .destroy_all(&self.settings.storage_stack_name)
            .await?;
        let network = self
            .engine
            .destroy_all(&self.settings.network_stack_name)
            .await?;

        let report = TeardownReport { storage, network };
        let retained = report.retained();
        if !retained.is_empty() {
            warn!(?retained, "Resources retained after teardown");
        }
        Ok(report)
    }

    pub async fn status(&self) -> Result<TopologyStatus> {
        Ok(TopologyStatus {
            network: self
                .engine
                .get_state(&self.settings.network_stack_name)
                .await?,
            storage: self
                .engine
                .get_state(&self.settings.storage_stack_name)
                .await?,
        })
    }
}
