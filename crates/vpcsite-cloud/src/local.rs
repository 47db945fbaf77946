//! Local, state-file backed provisioning engine
//!
//! Walks the declared dependency graph, assigns physical IDs the way the
//! cloud would (they cannot be predicted before creation), resolves `Ref`s
//! against already provisioned resources and records everything in
//! `.vpcsite/state.json`.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::engine::ProvisioningEngine;
use crate::error::{CloudError, Result};
use crate::resource::{as_reference, RemovalPolicy, ResourceConfig, ResourceSet};
use crate::state::{GlobalState, ProviderState, ResourceState, ResourceStatus, StateManager};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// Provisioning engine persisting to a local state file
pub struct LocalEngine {
    state: StateManager,
    account: String,
    region: String,
}

impl LocalEngine {
    pub fn new(
        project_root: impl AsRef<Path>,
        account: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            state: StateManager::new(project_root),
            account: account.into(),
            region: region.into(),
        }
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state
    }

    fn mint_physical_id(&self, stack: &str, resource: &ResourceConfig) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let short = &suffix[..17];
        match resource.resource_type.as_str() {
            "AWS::EC2::Subnet" => format!("subnet-{}", short),
            "AWS::EC2::SecurityGroup" => format!("sg-{}", short),
            "AWS::EC2::RouteTable" => format!("rtb-{}", short),
            "AWS::EC2::SubnetRouteTableAssociation" => format!("rtbassoc-{}", short),
            "AWS::EC2::Route" => format!("r-{}", short),
            "AWS::EC2::Instance" => format!("i-{}", short),
            "AWS::EC2::VPCEndpoint" => format!("vpce-{}", short),
            "AWS::S3::Bucket" => resource
                .get_property::<String>("BucketName")
                .unwrap_or_else(|| format!("{}-{}", stack, short).to_lowercase()),
            _ => format!("{}-{}-{}", stack, resource.id, &suffix[..12]),
        }
    }

    fn arn_for(&self, resource: &ResourceConfig, physical_id: &str) -> Option<String> {
        match resource.resource_type.as_str() {
            "AWS::IAM::Role" => Some(format!("arn:aws:iam::{}:role/{}", self.account, physical_id)),
            "AWS::IAM::InstanceProfile" => Some(format!(
                "arn:aws:iam::{}:instance-profile/{}",
                self.account, physical_id
            )),
            "AWS::S3::Bucket" => Some(format!("arn:aws:s3:::{}", physical_id)),
            "AWS::EC2::Instance" => Some(format!(
                "arn:aws:ec2:{}:{}:instance/{}",
                self.region, self.account, physical_id
            )),
            _ => None,
        }
    }

    fn create(&self, global: &mut GlobalState, stack: &str, resource: &ResourceConfig) -> Result<String> {
        if global.get(stack, &resource.id).is_some() {
            return Err(CloudError::ResourceAlreadyExists(format!("{}/{}", stack, resource.id)));
        }

        let provisioned = global.stack(stack);
        for dependency in resource.dependencies() {
            if provisioned.physical_id(&dependency).is_none() {
                return Err(CloudError::DependencyNotProvisioned {
                    resource: resource.id.clone(),
                    dependency,
                });
            }
        }

        let resolved = resolve_refs(&resource.properties, &provisioned, &resource.id)?;
        let physical_id = self.mint_physical_id(stack, resource);

        let state = ResourceState::new(&physical_id, &resource.resource_type)
            .with_status(ResourceStatus::Running)
            .with_removal_policy(resource.removal_policy)
            .with_properties(resolved, resource.properties.clone())
            .with_depends_on(resource.depends_on.clone())
            .with_arn(self.arn_for(resource, &physical_id));

        debug!(stack, logical_id = %resource.id, physical_id = %physical_id, "Created resource");
        global.upsert(stack, &resource.id, state);
        Ok(physical_id)
    }

    fn update(&self, global: &mut GlobalState, stack: &str, resource: &ResourceConfig) -> Result<String> {
        let provisioned = global.stack(stack);
        let resolved = resolve_refs(&resource.properties, &provisioned, &resource.id)?;

        let mut state = global
            .get(stack, &resource.id)
            .cloned()
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{}/{}", stack, resource.id)))?
            .with_removal_policy(resource.removal_policy)
            .with_properties(resolved, resource.properties.clone())
            .with_depends_on(resource.depends_on.clone());
        state.updated_at = chrono::Utc::now();

        let physical_id = state.id.clone();
        debug!(stack, logical_id = %resource.id, physical_id = %physical_id, "Updated resource");
        global.upsert(stack, &resource.id, state);
        Ok(physical_id)
    }

    fn delete(&self, global: &mut GlobalState, stack: &str, logical_id: &str) -> Result<String> {
        let removed = global
            .remove(stack, logical_id)
            .ok_or_else(|| CloudError::ResourceNotFound(format!("{}/{}", stack, logical_id)))?;
        debug!(stack, logical_id, physical_id = %removed.id, "Deleted resource");
        Ok(removed.id)
    }
}

#[async_trait]
impl ProvisioningEngine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn get_state(&self, stack: &str) -> Result<ProviderState> {
        Ok(self.state.load().await?.stack(stack))
    }

    async fn plan(&self, desired: &ResourceSet) -> Result<Plan> {
        let current = self.get_state(&desired.stack).await?;
        let mut actions = Vec::new();

        for resource in desired.creation_order()? {
            let action_type = match current.get(&resource.id) {
                None => ActionType::Create,
                Some(existing)
                    if existing.declared != resource.properties
                        || existing.depends_on != resource.depends_on
                        || existing.removal_policy != resource.removal_policy =>
                {
                    ActionType::Update
                }
                Some(_) => ActionType::NoOp,
            };
            actions.push(
                Action::new(action_type, &resource.resource_type, &resource.id)
                    .with_detail("stack", serde_json::json!(desired.stack)),
            );
        }

        // Newest first, so dependents go before their dependencies
        let mut stale: Vec<(&String, &ResourceState)> = current
            .iter()
            .filter(|(id, _)| desired.get(id).is_none())
            .collect();
        stale.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        for (id, resource) in stale {
            actions.push(
                Action::new(ActionType::Delete, &resource.resource_type, id.as_str())
                    .with_detail("physical_id", serde_json::json!(resource.id)),
            );
        }

        Ok(Plan::new(&desired.stack, actions))
    }

    #[tracing::instrument(skip_all, fields(stack = %desired.stack))]
    async fn apply(&self, plan: &Plan, desired: &ResourceSet) -> Result<ApplyResult> {
        if plan.stack != desired.stack {
            return Err(CloudError::PlanMismatch(format!(
                "plan targets stack {} but resources belong to {}",
                plan.stack, desired.stack
            )));
        }

        let lock = self.state.acquire_lock().await?;
        let start = std::time::Instant::now();
        let mut global = self.state.load().await?;
        let snapshot = global.clone();
        let mut result = ApplyResult::new();
        let mut created = Vec::new();

        for action in &plan.actions {
            let outcome = match action.action_type {
                ActionType::NoOp => continue,
                ActionType::Delete => self.delete(&mut global, &desired.stack, &action.resource_id),
                ActionType::Create | ActionType::Update => {
                    match desired.get(&action.resource_id) {
                        None => Err(CloudError::ResourceNotFound(action.resource_id.clone())),
                        Some(resource) if action.action_type == ActionType::Create => {
                            self.create(&mut global, &desired.stack, resource)
                        }
                        Some(resource) => self.update(&mut global, &desired.stack, resource),
                    }
                }
            };

            match outcome {
                Ok(physical_id) => {
                    if action.action_type == ActionType::Create {
                        created.push(action.resource_id.clone());
                    }
                    result.add_success(
                        action.id.clone(),
                        format!("{} {} ({})", action.action_type, action.resource_id, physical_id),
                    );
                }
                Err(e) => {
                    warn!(action = %action.id, error = %e, "Action failed");
                    result.add_failure(action.id.clone(), e.to_string());
                    break;
                }
            }
        }

        if result.is_success() {
            let provisioned = global.stack(&desired.stack);
            for (name, logical_id) in &desired.outputs {
                match provisioned.physical_id(logical_id) {
                    Some(physical_id) => {
                        result.outputs.insert(name.clone(), physical_id.to_string());
                    }
                    None => result.add_failure(
                        format!("output-{}", name),
                        CloudError::ResourceNotFound(logical_id.clone()).to_string(),
                    ),
                }
            }
        }

        if !result.is_success() {
            warn!(count = created.len(), "Rolling back resources created during apply");
            global = snapshot;
            created.reverse();
            result.rolled_back = created;
            result.outputs.clear();
        }

        self.state.save(&global).await?;
        lock.release().await?;

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Apply finished"
        );
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    async fn destroy_all(&self, stack: &str) -> Result<ApplyResult> {
        let lock = self.state.acquire_lock().await?;
        let start = std::time::Instant::now();
        let mut global = self.state.load().await?;
        let current = global.stack(stack);

        let recorded = recorded_resource_set(stack, &current);
        let mut result = ApplyResult::new();

        for resource in recorded.teardown_order()? {
            let action_id = format!("{}-{}", ActionType::Delete, resource.id);
            if let Some(removed) = global.remove(stack, &resource.id) {
                if resource.removal_policy == RemovalPolicy::Retain {
                    warn!(logical_id = %resource.id, physical_id = %removed.id, "Resource retained");
                    result.retained.push(resource.id.clone());
                    result.add_success(action_id, format!("retained {} ({})", resource.id, removed.id));
                } else {
                    result.add_success(action_id, format!("destroyed {} ({})", resource.id, removed.id));
                }
            }
        }

        self.state.save(&global).await?;
        lock.release().await?;

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(stack, destroyed = result.succeeded.len(), "Destroy finished");
        Ok(result)
    }
}

/// Rebuild the declared graph of a stack from what the state file recorded
fn recorded_resource_set(stack: &str, current: &ProviderState) -> ResourceSet {
    let mut set = ResourceSet::new(stack);
    for (id, state) in current.iter() {
        let mut resource =
            ResourceConfig::new(&state.resource_type, id.as_str(), state.declared.clone())
                .with_removal_policy(state.removal_policy);
        // Dependencies on resources no longer tracked do not constrain teardown
        resource.depends_on = state
            .depends_on
            .iter()
            .cloned()
            .filter(|d| current.get(d).is_some())
            .collect();
        set.add(resource);
    }
    // Refs to resources that are gone would make the graph invalid
    let known: Vec<String> = set.resources.keys().cloned().collect();
    for resource in set.resources.values_mut() {
        strip_unknown_refs(&mut resource.properties, &known);
    }
    set
}

fn strip_unknown_refs(value: &mut Value, known: &[String]) {
    if let Some(target) = as_reference(value) {
        if !known.iter().any(|k| k == target) {
            *value = Value::Null;
        }
        return;
    }
    match value {
        Value::Object(map) => map.values_mut().for_each(|v| strip_unknown_refs(v, known)),
        Value::Array(items) => items.iter_mut().for_each(|v| strip_unknown_refs(v, known)),
        _ => {}
    }
}

fn resolve_refs(value: &Value, provisioned: &ProviderState, resource_id: &str) -> Result<Value> {
    if let Some(target) = as_reference(value) {
        return provisioned
            .physical_id(target)
            .map(|id| Value::String(id.to_string()))
            .ok_or_else(|| CloudError::UnresolvedReference {
                resource: resource_id.to_string(),
                reference: target.to_string(),
            });
    }
    Ok(match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), resolve_refs(v, provisioned, resource_id)?)))
                .collect::<Result<serde_json::Map<String, Value>>>()?,
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| resolve_refs(v, provisioned, resource_id))
                .collect::<Result<Vec<Value>>>()?,
        ),
        other => other.clone(),
    })
}
