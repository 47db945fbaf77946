mod common;

use async_trait::async_trait;
use common::{TestTopology, GATEWAY};
use vpcsite_cloud::{
    ApplyResult, CloudError, Plan, ProviderState, ProvisioningEngine, RemovalPolicy, ResourceSet,
    ResourceStatus,
};
use vpcsite_core::{EndpointId, StaticNetworkLookup, TopologyComposer, TopologyError};

/// Policy condition the storage stack was provisioned with
fn provisioned_source_vpce(storage: &ProviderState) -> Option<String> {
    let properties = &storage.get("WebsiteBucketPolicy")?.properties;
    properties["PolicyDocument"]["Statement"][0]["Condition"]["StringEquals"]["aws:SourceVpce"]
        .as_str()
        .map(str::to_string)
}

#[tokio::test]
async fn test_deploy_binds_policy_to_endpoint_of_same_run() {
    let t = TestTopology::new();
    let composer = TopologyComposer::new(&t.engine, &t.lookup, &t.settings);

    let deployed = composer.deploy().await.unwrap();

    let network = t.engine.get_state(&t.settings.network_stack_name).await.unwrap();
    let storage = t.engine.get_state(&t.settings.storage_stack_name).await.unwrap();
    let endpoint = network.physical_id("S3VPCEndpoint").unwrap();

    assert_eq!(deployed.endpoint_id().as_str(), endpoint);
    assert_eq!(provisioned_source_vpce(&storage).as_deref(), Some(endpoint));

    let policy = &storage.get("WebsiteBucketPolicy").unwrap().properties;
    let statements = policy["PolicyDocument"]["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["Action"], serde_json::json!(["s3:GetObject"]));
    assert_eq!(statements[0]["Principal"], serde_json::json!({ "AWS": "*" }));
    assert_eq!(
        statements[0]["Resource"],
        serde_json::json!(["arn:aws:s3:::static-website-vpce-bucket/*"])
    );
    // The policy's bucket reference resolves to the provisioned bucket
    assert_eq!(policy["Bucket"], "static-website-vpce-bucket");
}

#[tokio::test]
async fn test_public_route_targets_supplied_gateway() {
    let t = TestTopology::new();
    let composer = TopologyComposer::new(&t.engine, &t.lookup, &t.settings);
    composer.deploy().await.unwrap();

    let network = t.engine.get_state(&t.settings.network_stack_name).await.unwrap();
    let routes: Vec<_> = network
        .iter()
        .filter(|(_, r)| r.resource_type == "AWS::EC2::Route")
        .collect();
    assert_eq!(routes.len(), 1);

    let (logical_id, route) = routes[0];
    assert_eq!(logical_id, "PublicSubnetDefaultRoute");
    let properties = &route.properties;
    assert_eq!(properties["GatewayId"], GATEWAY);
    assert_eq!(properties["DestinationCidrBlock"], "0.0.0.0/0");
    assert_eq!(
        properties["RouteTableId"].as_str(),
        network.physical_id("PublicSubnetRouteTable")
    );
}

#[tokio::test]
async fn test_redeploy_keeps_endpoint_and_policy() {
    let t = TestTopology::new();
    let composer = TopologyComposer::new(&t.engine, &t.lookup, &t.settings);

    let first = composer.deploy().await.unwrap();
    let second = composer.deploy().await.unwrap();
    assert_eq!(first.endpoint_id(), second.endpoint_id());
    assert!(second.network_result.succeeded.is_empty());
    assert!(second.storage_result.succeeded.is_empty());

    let plan = composer.plan().await.unwrap();
    assert!(!plan.has_changes());
    assert_eq!(plan.endpoint_id.as_ref(), Some(first.endpoint_id()));
}

#[tokio::test]
async fn test_plan_before_deploy_leaves_policy_pending() {
    let t = TestTopology::new();
    let composer = TopologyComposer::new(&t.engine, &t.lookup, &t.settings);

    let plan = composer.plan().await.unwrap();
    assert!(plan.endpoint_id.is_none());
    assert_eq!(plan.storage.summary().create, 1);
    assert!(plan.network.summary().create > 0);
    assert!(!t.state_path().exists());
}

#[tokio::test]
async fn test_teardown_removes_everything() {
    let t = TestTopology::new();
    let composer = TopologyComposer::new(&t.engine, &t.lookup, &t.settings);
    composer.deploy().await.unwrap();

    let status = composer.status().await.unwrap();
    let provisioned = status.network.len() + status.storage.len();
    assert!(status
        .network
        .iter()
        .chain(status.storage.iter())
        .all(|(_, r)| r.status == ResourceStatus::Running && r.removal_policy == RemovalPolicy::Destroy));

    let report = composer.teardown().await.unwrap();
    assert!(report.is_complete());
    assert!(report.retained().is_empty());
    assert_eq!(
        report.network.succeeded.len() + report.storage.succeeded.len(),
        provisioned
    );

    let status = composer.status().await.unwrap();
    assert!(status.network.is_empty());
    assert!(status.storage.is_empty());
}

#[tokio::test]
async fn test_missing_gateway_fails_before_provisioning() {
    let t = TestTopology::new().without_gateway();
    let composer = TopologyComposer::new(&t.engine, &t.lookup, &t.settings);

    assert!(matches!(
        composer.deploy().await,
        Err(TopologyError::MissingInternetGateway)
    ));
    assert!(!t.state_path().exists());
}

#[tokio::test]
async fn test_absent_network_fails_closed() {
    let t = TestTopology::new();
    let lookup = StaticNetworkLookup::new(None);
    let composer = TopologyComposer::new(&t.engine, &lookup, &t.settings);

    assert!(matches!(
        composer.deploy().await,
        Err(TopologyError::NetworkNotFound(_))
    ));
    assert!(!t.state_path().exists());
}

/// Wraps the local engine and interferes with one stack
struct FaultyEngine<'a> {
    inner: &'a dyn ProvisioningEngine,
    stack: String,
    fault: Fault,
}

enum Fault {
    /// Report the apply as failed
    FailApply,
    /// Apply normally but export no outputs
    DropOutputs,
    /// Report the apply as failed and refuse every destroy
    FailApplyAndDestroy,
    /// Report a malformed physical ID for the gateway endpoint
    CorruptEndpoint,
}

#[async_trait]
impl ProvisioningEngine for FaultyEngine<'_> {
    fn name(&self) -> &str {
        "faulty"
    }

    async fn get_state(&self, stack: &str) -> vpcsite_cloud::Result<ProviderState> {
        let mut state = self.inner.get_state(stack).await?;
        if matches!(self.fault, Fault::CorruptEndpoint) && stack == self.stack {
            if let Some(endpoint) = state.get("S3VPCEndpoint") {
                let mut endpoint = endpoint.clone();
                endpoint.id = "not-an-endpoint".to_string();
                state.add("S3VPCEndpoint".to_string(), endpoint);
            }
        }
        Ok(state)
    }

    async fn plan(&self, desired: &ResourceSet) -> vpcsite_cloud::Result<Plan> {
        self.inner.plan(desired).await
    }

    async fn apply(&self, plan: &Plan, desired: &ResourceSet) -> vpcsite_cloud::Result<ApplyResult> {
        if desired.stack != self.stack {
            return self.inner.apply(plan, desired).await;
        }
        match self.fault {
            Fault::FailApply | Fault::FailApplyAndDestroy => {
                let mut result = ApplyResult::new();
                result.add_failure("create-injected".to_string(), "injected failure".to_string());
                Ok(result)
            }
            Fault::DropOutputs => {
                let mut result = self.inner.apply(plan, desired).await?;
                result.outputs.clear();
                Ok(result)
            }
            Fault::CorruptEndpoint => self.inner.apply(plan, desired).await,
        }
    }

    async fn destroy_all(&self, stack: &str) -> vpcsite_cloud::Result<ApplyResult> {
        if matches!(self.fault, Fault::FailApplyAndDestroy) {
            return Err(CloudError::LockError("held by another run".to_string()));
        }
        self.inner.destroy_all(stack).await
    }
}

#[tokio::test]
async fn test_storage_failure_removes_fresh_network() {
    let t = TestTopology::new();
    let engine = FaultyEngine {
        inner: &t.engine,
        stack: t.settings.storage_stack_name.clone(),
        fault: Fault::FailApply,
    };
    let composer = TopologyComposer::new(&engine, &t.lookup, &t.settings);

    let err = composer.deploy().await.unwrap_err();
    assert!(matches!(
        err,
        TopologyError::ProvisioningFailed { ref stack, .. } if stack == "StaticWebsiteS3Stack"
    ));

    let status = composer.status().await.unwrap();
    assert!(status.network.is_empty());
    assert!(status.storage.is_empty());
}

#[tokio::test]
async fn test_failed_cleanup_keeps_storage_error() {
    let t = TestTopology::new();
    let engine = FaultyEngine {
        inner: &t.engine,
        stack: t.settings.storage_stack_name.clone(),
        fault: Fault::FailApplyAndDestroy,
    };
    let composer = TopologyComposer::new(&engine, &t.lookup, &t.settings);

    let err = composer.deploy().await.unwrap_err();
    assert!(matches!(
        err,
        TopologyError::ProvisioningFailed { ref stack, ref reason }
            if stack == "StaticWebsiteS3Stack" && reason == "injected failure"
    ));

    // Cleanup was refused, so the network stack is still recorded
    let status = composer.status().await.unwrap();
    assert!(status.network.physical_id("S3VPCEndpoint").is_some());
    assert!(status.storage.is_empty());
}

#[tokio::test]
async fn test_storage_failure_keeps_existing_network() {
    let t = TestTopology::new();
    TopologyComposer::new(&t.engine, &t.lookup, &t.settings)
        .deploy()
        .await
        .unwrap();

    let engine = FaultyEngine {
        inner: &t.engine,
        stack: t.settings.storage_stack_name.clone(),
        fault: Fault::FailApply,
    };
    let composer = TopologyComposer::new(&engine, &t.lookup, &t.settings);
    assert!(composer.deploy().await.is_err());

    let status = composer.status().await.unwrap();
    assert!(status.network.physical_id("S3VPCEndpoint").is_some());
}

#[tokio::test]
async fn test_storage_is_not_applied_without_endpoint_output() {
    let t = TestTopology::new();
    let engine = FaultyEngine {
        inner: &t.engine,
        stack: t.settings.network_stack_name.clone(),
        fault: Fault::DropOutputs,
    };
    let composer = TopologyComposer::new(&engine, &t.lookup, &t.settings);

    assert!(matches!(
        composer.deploy().await,
        Err(TopologyError::UnresolvedEndpoint(_))
    ));
    let storage = t.engine.get_state(&t.settings.storage_stack_name).await.unwrap();
    assert!(storage.is_empty());
    let network = t.engine.get_state(&t.settings.network_stack_name).await.unwrap();
    assert!(network.is_empty());
}

#[tokio::test]
async fn test_plan_rejects_malformed_recorded_endpoint() {
    let t = TestTopology::new();
    TopologyComposer::new(&t.engine, &t.lookup, &t.settings)
        .deploy()
        .await
        .unwrap();

    let engine = FaultyEngine {
        inner: &t.engine,
        stack: t.settings.network_stack_name.clone(),
        fault: Fault::CorruptEndpoint,
    };
    let composer = TopologyComposer::new(&engine, &t.lookup, &t.settings);

    assert!(matches!(
        composer.plan().await,
        Err(TopologyError::UnresolvedEndpoint(ref raw)) if raw.contains("not-an-endpoint")
    ));
}

#[test]
fn test_policy_rejects_unresolved_endpoint() {
    for raw in ["", "${Token[TOKEN.42]}", "vpce-"] {
        assert!(matches!(
            EndpointId::parse(raw),
            Err(TopologyError::UnresolvedEndpoint(_))
        ));
    }
}
